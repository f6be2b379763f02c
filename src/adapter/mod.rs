//! Query result adapter
//!
//! Normalizes whatever the query layer hands back into uniform node and
//! edge rows:
//! - per-edge association records (`source`, `target`, `score`)
//! - tabular term-overlap exports (see [`overlap`])
//!
//! Property keys are normalized (`externalId`, `EXTERNAL_ID` and `id` all
//! become `external_id`) so later stages never see source-specific shapes.
//! Malformed rows are dropped and counted, never silently absorbed.

pub mod overlap;

pub use overlap::{adapt_overlap_export, ScratchExport};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::models::{EdgeRow, Node};

/// Errors that abort adaptation as a whole (row-level problems are counted
/// in [`AdaptedRows::skipped`] instead).
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Export is missing required column '{0}'")]
    MissingColumn(String),

    #[error("Failed to read export: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One association as returned by the query layer: two node property bags
/// and the raw relationship score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationRecord {
    pub source: Value,
    pub target: Value,
    pub score: Value,
}

impl AssociationRecord {
    pub fn new(source: Value, target: Value, score: impl Into<Value>) -> Self {
        Self {
            source,
            target,
            score: score.into(),
        }
    }
}

/// Node and edge rows in the shape the assembler expects.
#[derive(Debug, Clone, Default)]
pub struct AdaptedRows {
    /// Node rows, duplicates included (two per accepted record).
    pub nodes: Vec<Node>,
    pub edges: Vec<EdgeRow>,
    /// Rows dropped because a required field was missing or unreadable
    pub skipped: usize,
}

impl AdaptedRows {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Accept one source/target/score triple, or count it as skipped.
    pub(crate) fn push_association(
        &mut self,
        source: &Value,
        target: &Value,
        score: &Value,
        default_category: &str,
    ) {
        let source = node_from_properties(source, default_category);
        let target = node_from_properties(target, default_category);
        let score = score_value(score);

        match (source, target, score) {
            (Some(source), Some(target), Some(score)) => {
                self.edges.push(EdgeRow::new(&source.id, &target.id, score));
                self.nodes.push(source);
                self.nodes.push(target);
            }
            _ => {
                self.skipped += 1;
            }
        }
    }
}

/// Adapt per-edge association records.
///
/// `default_category` is used for nodes whose properties carry none
/// (protein nodes in the association store have no category).
pub fn adapt_records<I>(records: I, default_category: &str) -> AdaptedRows
where
    I: IntoIterator<Item = AssociationRecord>,
{
    let mut rows = AdaptedRows::default();
    for (index, record) in records.into_iter().enumerate() {
        let before = rows.skipped;
        rows.push_association(&record.source, &record.target, &record.score, default_category);
        if rows.skipped > before {
            debug!("Skipping malformed association record #{}", index);
        }
    }
    rows
}

/// Canonical snake_case form of a property key, with known aliases folded.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.trim().chars() {
        if ch == ' ' || ch == '-' {
            out.push('_');
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }

    match out.as_str() {
        "id" | "externalid" | "ensembl_id" => "external_id".to_string(),
        "fdr" | "fdr_value" => "fdr_rate".to_string(),
        "pvalue" | "p_val" => "p_value".to_string(),
        _ => out,
    }
}

/// Flatten a node value into a key-normalized property map.
///
/// Accepts bare property maps as well as graph-store node envelopes of the
/// form `{"id": .., "labels": [..], "properties": {..}}`.
pub fn normalize_properties(value: &Value) -> Option<Map<String, Value>> {
    let object = value.as_object()?;
    let properties = match object.get("properties").and_then(Value::as_object) {
        Some(inner) => inner,
        None => object,
    };

    let mut normalized = Map::with_capacity(properties.len());
    for (key, value) in properties {
        let key = normalize_key(key);
        // First spelling wins when two keys fold onto the same name
        normalized.entry(key).or_insert_with(|| value.clone());
    }
    Some(normalized)
}

fn node_from_properties(value: &Value, default_category: &str) -> Option<Node> {
    let props = normalize_properties(value)?;

    let id = text_value(props.get("external_id")?)?;
    let name = text_value(props.get("name")?)?;
    if id.is_empty() {
        return None;
    }

    let mut node = Node::new(&id, &name);
    node.category = props
        .get("category")
        .and_then(text_value)
        .unwrap_or_else(|| default_category.to_string());
    node.description = props.get("description").and_then(text_value);
    node.p_value = props.get("p_value").and_then(number_value);
    node.fdr_rate = props.get("fdr_rate").and_then(number_value);
    Some(node)
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn score_value(value: &Value) -> Option<f64> {
    number_value(value).filter(|score| score.is_finite())
}
