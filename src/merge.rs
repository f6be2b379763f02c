//! Attribute merging and highlighting
//!
//! Re-attaches domain metadata to the layout engine's scene graph and
//! marks everything outside the principal subgraph for dimmed (or hidden)
//! rendering. The result is the document shipped to the front end.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::graph::{Graph, PrincipalComponent};
use crate::layout::{LayoutEdge, LayoutNode, LayoutResult};
use crate::models::{Node, RenderingMode};

/// Highlight color for nodes outside the principal subgraph
pub const DIM_NODE_COLOR: &str = "rgb(255,255,153)";
/// Translucent variant for edges with both endpoints outside it
pub const DIM_EDGE_COLOR: &str = "rgba(255,255,153,0.2)";

// Attribute names the front end reads
pub const ATTR_EXTERNAL_ID: &str = "Ensembl ID";
pub const ATTR_NAME: &str = "Name";
pub const ATTR_DESCRIPTION: &str = "Description";
pub const ATTR_CATEGORY: &str = "Category";
pub const ATTR_FDR: &str = "FDR";
pub const ATTR_P_VALUE: &str = "P Value";

/// The visualization-ready graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    /// Principal-subgraph member ids, for client-side filtering
    #[serde(default)]
    pub subgraph: Vec<String>,
    /// Experiment columns attached to nodes, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dvalues: Option<Vec<String>>,
}

impl GraphDocument {
    /// `{nodes: [], edges: [], subgraph: []}`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Per-request merge settings.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub mode: RenderingMode,
    /// Stamped as a top-level `species` field on matched nodes
    pub species: Option<String>,
}

impl MergeOptions {
    pub fn new(mode: RenderingMode) -> Self {
        Self {
            mode,
            species: None,
        }
    }

    pub fn with_species(mut self, species: impl Into<String>) -> Self {
        self.species = Some(species.into());
        self
    }
}

/// Counters from one merge, mostly for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Layout nodes that found their metadata
    pub matched: usize,
    /// Layout nodes with no metadata (left untouched)
    pub unmatched: usize,
    pub dimmed_nodes: usize,
    pub dimmed_edges: usize,
}

/// Decorate the layout output and produce the final document.
pub fn merge(
    layout: LayoutResult,
    graph: &Graph,
    principal: &PrincipalComponent,
    options: &MergeOptions,
) -> (GraphDocument, MergeStats) {
    let lookup: FxHashMap<&str, &Node> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut stats = MergeStats::default();

    let LayoutResult { mut nodes, mut edges } = layout;

    for layout_node in &mut nodes {
        match lookup.get(layout_node.id.as_str()) {
            Some(node) => {
                attach_metadata(layout_node, node);
                if let Some(species) = &options.species {
                    layout_node
                        .extra
                        .insert("species".to_string(), Value::String(species.clone()));
                }
                stats.matched += 1;
            }
            None => {
                debug!("No metadata for layout node '{}'", layout_node.id);
                stats.unmatched += 1;
            }
        }
    }

    let mut subgraph = Vec::new();
    for layout_node in &mut nodes {
        if principal.contains(&layout_node.id) {
            subgraph.push(layout_node.id.clone());
        } else {
            layout_node.color = Some(DIM_NODE_COLOR.to_string());
            if options.mode == RenderingMode::Hide {
                layout_node.hidden = Some(true);
            }
            stats.dimmed_nodes += 1;
        }
    }

    for edge in &mut edges {
        if !principal.contains(&edge.source) && !principal.contains(&edge.target) {
            edge.color = Some(DIM_EDGE_COLOR.to_string());
            stats.dimmed_edges += 1;
        }
    }

    let document = GraphDocument {
        nodes,
        edges,
        subgraph,
        dvalues: None,
    };
    (document, stats)
}

fn attach_metadata(layout_node: &mut LayoutNode, node: &Node) {
    let attrs = &mut layout_node.attributes;
    attrs.insert(ATTR_EXTERNAL_ID.to_string(), Value::String(node.id.clone()));
    attrs.insert(ATTR_NAME.to_string(), Value::String(node.name.clone()));
    if let Some(description) = &node.description {
        attrs.insert(ATTR_DESCRIPTION.to_string(), Value::String(description.clone()));
    }
    if !node.category.is_empty() {
        attrs.insert(ATTR_CATEGORY.to_string(), Value::String(node.category.clone()));
    }
    if let Some(fdr) = node.fdr_rate {
        attrs.insert(ATTR_FDR.to_string(), Value::from(fdr));
    }
    if let Some(p_value) = node.p_value {
        attrs.insert(ATTR_P_VALUE.to_string(), Value::from(p_value));
    }
    layout_node.label = Some(node.name.clone());
}
