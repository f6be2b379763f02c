//! JSON snapshot of the association store
//!
//! A self-contained dump of proteins, associations, terms and kappa
//! overlaps, answering the same reads as the live store. Used by the CLI
//! and tests.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{QueryError, QuerySession, QuerySource};
use crate::adapter::{normalize_properties, AssociationRecord};

/// Stored association between two proteins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAssociation {
    pub source: String,
    pub target: String,
    /// Combined score in [0, 1000]
    pub combined: i64,
}

/// Stored kappa overlap between two terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOverlap {
    pub source: String,
    pub target: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub proteins: Vec<Map<String, Value>>,
    #[serde(default)]
    pub associations: Vec<StoredAssociation>,
    #[serde(default)]
    pub terms: Vec<Map<String, Value>>,
    #[serde(default)]
    pub overlaps: Vec<StoredOverlap>,
}

impl Snapshot {
    fn find<'a>(nodes: &'a [Map<String, Value>], id: &str) -> Option<&'a Map<String, Value>> {
        nodes.iter().find(|props| external_id(props).as_deref() == Some(id))
    }
}

/// Query source backed by a loaded [`Snapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn open(path: &Path) -> Result<Self, QueryError> {
        let file = File::open(path).map_err(|e| {
            QueryError::Unavailable(format!("cannot open snapshot {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        debug!(
            "Loaded snapshot: {} proteins, {} associations, {} terms, {} overlaps",
            snapshot.proteins.len(),
            snapshot.associations.len(),
            snapshot.terms.len(),
            snapshot.overlaps.len()
        );
        Ok(Self::new(snapshot))
    }
}

impl QuerySource for SnapshotSource {
    fn session(&self) -> Result<Box<dyn QuerySession + '_>, QueryError> {
        debug!("Opened snapshot session");
        Ok(Box::new(SnapshotSession {
            snapshot: &self.snapshot,
        }))
    }
}

struct SnapshotSession<'a> {
    snapshot: &'a Snapshot,
}

impl Drop for SnapshotSession<'_> {
    fn drop(&mut self) {
        debug!("Closed snapshot session");
    }
}

impl SnapshotSession<'_> {
    fn associations<F>(&self, threshold: i64, keep: F) -> Result<Vec<AssociationRecord>, QueryError>
    where
        F: Fn(&StoredAssociation) -> bool,
    {
        let mut records = Vec::new();
        for assoc in &self.snapshot.associations {
            if assoc.combined < threshold || !keep(assoc) {
                continue;
            }
            let source = Snapshot::find(&self.snapshot.proteins, &assoc.source);
            let target = Snapshot::find(&self.snapshot.proteins, &assoc.target);
            match (source, target) {
                (Some(source), Some(target)) => records.push(AssociationRecord::new(
                    Value::Object(source.clone()),
                    Value::Object(target.clone()),
                    assoc.combined,
                )),
                _ => {
                    return Err(QueryError::Failed(format!(
                        "association {} -> {} references a missing protein",
                        assoc.source, assoc.target
                    )))
                }
            }
        }
        Ok(records)
    }
}

impl QuerySession for SnapshotSession<'_> {
    fn protein_ids_for_names(
        &mut self,
        names: &[String],
        species_id: u32,
    ) -> Result<Vec<String>, QueryError> {
        let wanted: HashSet<String> = names.iter().map(|n| n.to_uppercase()).collect();
        let ids = self
            .snapshot
            .proteins
            .iter()
            .filter_map(|props| {
                let props = normalize_properties(&Value::Object(props.clone()))?;
                let species = props.get("species_id").and_then(Value::as_u64)?;
                let name = props.get("name").and_then(Value::as_str)?;
                if species == u64::from(species_id) && wanted.contains(&name.to_uppercase()) {
                    external_id(&props)
                } else {
                    None
                }
            })
            .collect();
        Ok(ids)
    }

    fn protein_associations(
        &mut self,
        ids: &[String],
        threshold: i64,
    ) -> Result<Vec<AssociationRecord>, QueryError> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.associations(threshold, |a| {
            ids.contains(a.source.as_str()) && ids.contains(a.target.as_str())
        })
    }

    fn protein_neighbours(
        &mut self,
        ids: &[String],
        threshold: i64,
    ) -> Result<Vec<AssociationRecord>, QueryError> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.associations(threshold, |a| {
            ids.contains(a.source.as_str()) || ids.contains(a.target.as_str())
        })
    }

    fn export_term_overlaps(&mut self, term_ids: &[String], dest: &Path) -> Result<(), QueryError> {
        let ids: HashSet<&str> = term_ids.iter().map(String::as_str).collect();
        let mut writer = csv::Writer::from_path(dest)?;
        writer.write_record(["source", "target", "score"])?;

        let mut rows = 0;
        for overlap in &self.snapshot.overlaps {
            if !ids.contains(overlap.source.as_str()) || !ids.contains(overlap.target.as_str()) {
                continue;
            }
            let (Some(source), Some(target)) = (
                Snapshot::find(&self.snapshot.terms, &overlap.source),
                Snapshot::find(&self.snapshot.terms, &overlap.target),
            ) else {
                return Err(QueryError::Failed(format!(
                    "overlap {} -> {} references a missing term",
                    overlap.source, overlap.target
                )));
            };
            let source = json!({"labels": ["Terms"], "properties": source}).to_string();
            let target = json!({"labels": ["Terms"], "properties": target}).to_string();
            writer.write_record([source, target, overlap.score.to_string()])?;
            rows += 1;
        }
        writer.flush()?;
        debug!("Exported {} term overlaps to {}", rows, dest.display());
        Ok(())
    }
}

fn external_id(props: &Map<String, Value>) -> Option<String> {
    let props = normalize_properties(&Value::Object(props.clone()))?;
    match props.get("external_id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
