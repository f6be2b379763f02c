//! Uploaded experiment tables
//!
//! A CSV with a `SYMBOL` column naming genes plus any number of value
//! columns ("D-values"). Symbols double as the protein names to query, and
//! selected columns are copied onto matching nodes of the final document.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::merge::{GraphDocument, ATTR_NAME};

pub const SYMBOL_COLUMN: &str = "SYMBOL";

#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("Experiment table has no '{0}' column")]
    MissingColumn(String),

    #[error("Failed to read experiment table: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A parsed experiment table. Symbols are stored upper-cased.
#[derive(Debug, Clone, Default)]
pub struct ExperimentTable {
    columns: Vec<String>,
    rows: Vec<(String, Vec<String>)>,
}

impl ExperimentTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ExperimentError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let symbol_idx = headers
            .iter()
            .position(|h| h == SYMBOL_COLUMN)
            .ok_or_else(|| ExperimentError::MissingColumn(SYMBOL_COLUMN.to_string()))?;

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let symbol = record.get(symbol_idx).unwrap_or_default().trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            let values = (0..headers.len())
                .map(|i| record.get(i).unwrap_or_default().trim().to_string())
                .collect();
            rows.push((symbol, values));
        }

        debug!("Loaded experiment table: {} rows, {} columns", rows.len(), headers.len());
        Ok(Self { columns: headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, ExperimentError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Upper-cased gene symbols, in table order.
    pub fn symbols(&self) -> Vec<String> {
        self.rows.iter().map(|(symbol, _)| symbol.clone()).collect()
    }

    /// Check that every requested column exists.
    pub fn validate(&self, columns: &[String]) -> Result<(), ExperimentError> {
        for column in columns {
            self.column_index(column)?;
        }
        Ok(())
    }

    fn column_index(&self, column: &str) -> Result<usize, ExperimentError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| ExperimentError::MissingColumn(column.to_string()))
    }

    /// Value of `column` for `symbol`; first matching row wins.
    pub fn value(&self, symbol: &str, column: &str) -> Option<Value> {
        let idx = self.column_index(column).ok()?;
        let symbol = symbol.to_uppercase();
        let (_, values) = self.rows.iter().find(|(s, _)| *s == symbol)?;
        values.get(idx).map(|raw| cell_value(raw))
    }

    /// Copy the selected columns onto nodes whose `Name` matches a symbol
    /// and record them in `dvalues`. Returns how many nodes were annotated.
    pub fn annotate(
        &self,
        document: &mut GraphDocument,
        columns: &[String],
    ) -> Result<usize, ExperimentError> {
        self.validate(columns)?;

        let mut annotated = 0;
        for node in &mut document.nodes {
            let Some(name) = node.attributes.get(ATTR_NAME).and_then(Value::as_str) else {
                continue;
            };
            let name = name.to_string();
            let mut touched = false;
            for column in columns {
                if let Some(value) = self.value(&name, column) {
                    node.attributes.insert(column.clone(), value);
                    touched = true;
                }
            }
            if touched {
                annotated += 1;
            }
        }

        document.dvalues = Some(columns.to_vec());
        Ok(annotated)
    }
}

fn cell_value(raw: &str) -> Value {
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::from(n),
        _ => Value::String(raw.to_string()),
    }
}
