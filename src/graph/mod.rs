//! Association graph assembly
//!
//! Deduplication, score normalization and connectivity analysis over the
//! rows produced by the adapter. Pure Rust on top of petgraph.

pub mod assembler;
pub mod components;

pub use assembler::{assemble, dedup, merge_metadata, Graph};
pub use components::{principal_component, ComponentPolicy, PrincipalComponent};

use thiserror::Error;

/// Errors raised while assembling a graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("Edge {source_id} -> {target_id} references unknown node '{missing}'")]
    UnknownEndpoint {
        source_id: String,
        target_id: String,
        missing: String,
    },
}
