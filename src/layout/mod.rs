//! Layout bridge
//!
//! 2D layout is computed by an external engine reached through a
//! text-in/JSON-out pipe protocol:
//! - stdin: a one-column node table (`external_id`), a blank line, then a
//!   three-column edge table (`source,target,score`)
//! - stdout: `{"nodes": [{id, attributes, ...}], "edges": [{source, target, ...}]}`
//!
//! [`LayoutEngine`] is the capability the pipeline depends on;
//! [`ProcessLayoutEngine`] is the adapter that owns the child process.

pub mod process;
pub mod protocol;

pub use process::ProcessLayoutEngine;
pub use protocol::{decode_output, encode_input};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{Edge, Node};

/// Failures of the external layout engine.
///
/// These indicate broken infrastructure, not missing data, and are never
/// folded into an empty result.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Layout engine '{program}' not found. Check the [layout] program setting.")]
    NotFound { program: String },

    #[error("Failed to start layout engine: {0}")]
    Spawn(std::io::Error),

    #[error("Layout engine I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Layout engine exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("Layout engine timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Layout engine produced no output")]
    EmptyOutput,

    #[error("Layout engine output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl LayoutError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LayoutError::NotFound { .. } | LayoutError::Spawn(_) | LayoutError::Timeout { .. }
        )
    }
}

/// A positioned node as returned by the layout engine.
///
/// Position, size and any other engine fields are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LayoutNode {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

/// An edge as returned by the layout engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LayoutEdge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            ..Default::default()
        }
    }
}

/// The layout engine's scene graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    #[serde(default)]
    pub nodes: Vec<LayoutNode>,
    #[serde(default)]
    pub edges: Vec<LayoutEdge>,
}

impl LayoutResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Computes a 2D layout for a node/edge list.
pub trait LayoutEngine: Send + Sync {
    /// Lay out the graph. An empty node list must yield an empty result
    /// without doing any work.
    fn render(&self, nodes: &[Node], edges: &[Edge]) -> Result<LayoutResult, LayoutError>;
}
