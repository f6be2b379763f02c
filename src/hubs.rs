//! Hub detection
//!
//! A hub is a node whose layout-reported `Degree` reaches
//! `ceil(mean + sample standard deviation)` over all nodes of the document.

use serde_json::Value;

use crate::layout::LayoutNode;
use crate::merge::GraphDocument;

pub const ATTR_DEGREE: &str = "Degree";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HubFilter {
    /// Keep everything below the threshold
    #[default]
    Hide,
    /// Keep only the hubs
    Show,
}

fn degree(node: &LayoutNode) -> Option<i64> {
    match node.attributes.get(ATTR_DEGREE)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Hub threshold, or `None` when no node carries a readable degree.
///
/// With a single degree the deviation is taken as zero.
pub fn hub_threshold(document: &GraphDocument) -> Option<i64> {
    let degrees: Vec<f64> = document.nodes.iter().filter_map(degree).map(|d| d as f64).collect();
    if degrees.is_empty() {
        return None;
    }

    let n = degrees.len() as f64;
    let mean = degrees.iter().sum::<f64>() / n;
    let std_dev = if degrees.len() < 2 {
        0.0
    } else {
        (degrees.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    };
    Some((mean + std_dev).ceil() as i64)
}

/// Nodes selected by `filter`. Nodes without a degree are never selected.
pub fn select(document: &GraphDocument, filter: HubFilter) -> Vec<&LayoutNode> {
    let Some(threshold) = hub_threshold(document) else {
        return Vec::new();
    };
    document
        .nodes
        .iter()
        .filter(|node| match (degree(node), filter) {
            (Some(d), HubFilter::Hide) => d < threshold,
            (Some(d), HubFilter::Show) => d >= threshold,
            (None, _) => false,
        })
        .collect()
}
