//! Query layer seam
//!
//! The graph store is a collaborator: the pipeline only needs the handful
//! of reads below. Sessions are acquired per request and released when
//! dropped, on every exit path.

mod snapshot;

pub use snapshot::{Snapshot, SnapshotSource};

use std::path::Path;

use thiserror::Error;

use crate::adapter::AssociationRecord;

/// Errors from the query layer. Fatal to the request; never retried here.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Failed(String),

    #[error("Failed to decode graph store data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to write export: {0}")]
    Export(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads against the association store for one request.
pub trait QuerySession {
    /// Map protein names (case-insensitive) to external ids for a species.
    fn protein_ids_for_names(
        &mut self,
        names: &[String],
        species_id: u32,
    ) -> Result<Vec<String>, QueryError>;

    /// Associations with both endpoints in `ids` and score >= `threshold`.
    fn protein_associations(
        &mut self,
        ids: &[String],
        threshold: i64,
    ) -> Result<Vec<AssociationRecord>, QueryError>;

    /// Associations with either endpoint in `ids` and score >= `threshold`.
    fn protein_neighbours(
        &mut self,
        ids: &[String],
        threshold: i64,
    ) -> Result<Vec<AssociationRecord>, QueryError>;

    /// Export kappa overlaps among `term_ids` as CSV into `dest`.
    fn export_term_overlaps(&mut self, term_ids: &[String], dest: &Path) -> Result<(), QueryError>;
}

/// Hands out sessions.
pub trait QuerySource {
    fn session(&self) -> Result<Box<dyn QuerySession + '_>, QueryError>;
}
