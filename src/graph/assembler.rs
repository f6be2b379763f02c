//! Graph assembly
//!
//! Turns adapted rows into a deduplicated [`Graph`]:
//! 1. Normalize raw scores with the source's [`ScorePolicy`]
//! 2. Keep the first node per id and the first edge per unordered pair
//! 3. Reject edges whose endpoints were never seen as nodes
//! 4. Optionally merge enrichment statistics onto term nodes

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AssemblyError;
use crate::models::{Edge, EdgeRow, Node, ScorePolicy, TermMetadata};

/// Deduplicated node and edge sets.
///
/// Invariant: every edge endpoint is the id of a node in `nodes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// The sentinel returned when no associations survive assembly.
    pub fn empty() -> Self {
        Self::default()
    }

    /// An empty graph never reaches the layout engine.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Normalize scores, then deduplicate.
pub fn assemble(
    nodes: Vec<Node>,
    rows: Vec<EdgeRow>,
    policy: ScorePolicy,
) -> Result<Graph, AssemblyError> {
    let edges = rows
        .into_iter()
        .map(|row| Edge {
            score: policy.normalize(row.raw_score),
            source: row.source,
            target: row.target,
        })
        .collect();
    dedup(nodes, edges)
}

/// Deduplicate already-normalized nodes and edges.
///
/// Running this on its own output yields the same graph.
pub fn dedup(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Graph, AssemblyError> {
    let node_count = nodes.len();
    let mut seen_ids: FxHashSet<String> = FxHashSet::default();
    let nodes: Vec<Node> = nodes
        .into_iter()
        .filter(|n| seen_ids.insert(n.id.clone()))
        .collect();

    let edge_count = edges.len();
    let mut seen_pairs: FxHashSet<(String, String)> = FxHashSet::default();
    let mut unique_edges = Vec::with_capacity(edges.len());
    for edge in edges {
        let (a, b) = edge.key();
        if !seen_pairs.insert((a.to_string(), b.to_string())) {
            continue;
        }
        for endpoint in [&edge.source, &edge.target] {
            if !seen_ids.contains(endpoint) {
                return Err(AssemblyError::UnknownEndpoint {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        unique_edges.push(edge);
    }

    debug!(
        "Assembled {} nodes (from {}), {} edges (from {})",
        nodes.len(),
        node_count,
        unique_edges.len(),
        edge_count
    );

    if unique_edges.is_empty() {
        return Ok(Graph::empty());
    }

    Ok(Graph {
        nodes,
        edges: unique_edges,
    })
}

/// Merge enrichment statistics onto the graph's nodes.
///
/// Every node ends up with statistics: matched ones get the metadata
/// values, unmatched ones get zeros. Metadata for ids not in the graph is
/// dropped. Returns the number of nodes that matched.
pub fn merge_metadata(graph: &mut Graph, metadata: &[TermMetadata]) -> usize {
    let by_id: FxHashMap<&str, &TermMetadata> = metadata
        .iter()
        .map(|m| (m.id.as_str(), m))
        .rev() // first entry per id wins
        .collect();

    let mut matched = 0;
    for node in &mut graph.nodes {
        match by_id.get(node.id.as_str()) {
            Some(meta) => {
                node.p_value = Some(meta.p_value);
                node.fdr_rate = Some(meta.fdr_rate);
                matched += 1;
            }
            None => {
                node.p_value = Some(node.p_value.unwrap_or(0.0));
                node.fdr_rate = Some(node.fdr_rate.unwrap_or(0.0));
            }
        }
    }

    let dropped = by_id.len().saturating_sub(matched);
    if dropped > 0 {
        debug!("Dropped {} metadata entries with no matching node", dropped);
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> Vec<Node> {
        ids.iter().map(|id| Node::new(id, &id.to_lowercase())).collect()
    }

    #[test]
    fn test_dedup_nodes_first_wins() {
        let mut input = nodes(&["P1", "P2"]);
        input.push(Node::new("P1", "later duplicate"));
        let graph = assemble(input, vec![EdgeRow::new("P1", "P2", 500.0)], ScorePolicy::Association).unwrap();

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.node("P1").unwrap().name, "p1");
    }

    #[test]
    fn test_dedup_edges_unordered_first_wins() {
        let rows = vec![
            EdgeRow::new("P1", "P2", 500.0),
            EdgeRow::new("P1", "P2", 500.0),
            EdgeRow::new("P2", "P1", 900.0),
            EdgeRow::new("P2", "P3", 400.0),
        ];
        let graph = assemble(nodes(&["P1", "P2", "P3"]), rows, ScorePolicy::Association).unwrap();

        assert_eq!(
            graph.edges,
            vec![Edge::new("P1", "P2", 500), Edge::new("P2", "P3", 400)]
        );
    }

    #[test]
    fn test_kappa_policy_applied() {
        let rows = vec![EdgeRow::new("T1", "T2", 0.8675), EdgeRow::new("T2", "T3", -0.5)];
        let graph = assemble(nodes(&["T1", "T2", "T3"]), rows, ScorePolicy::Kappa).unwrap();
        assert_eq!(graph.edges[0].score, 87);
        assert_eq!(graph.edges[1].score, -50);
    }

    #[test]
    fn test_empty_edges_yield_sentinel() {
        let graph = assemble(nodes(&["P1", "P2"]), vec![], ScorePolicy::Association).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph, Graph::empty());
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_unknown_endpoint_rejected() {
        let rows = vec![EdgeRow::new("P1", "P9", 100.0)];
        let err = assemble(nodes(&["P1"]), rows, ScorePolicy::Association).unwrap_err();
        match err {
            AssemblyError::UnknownEndpoint { missing, .. } => assert_eq!(missing, "P9"),
        }
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let rows = vec![
            EdgeRow::new("A", "B", 1.0),
            EdgeRow::new("B", "A", 2.0),
            EdgeRow::new("B", "C", 3.0),
        ];
        let once = assemble(nodes(&["A", "B", "C", "A"]), rows, ScorePolicy::Association).unwrap();
        let twice = dedup(once.nodes.clone(), once.edges.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_metadata_fills_defaults() {
        let mut graph = assemble(
            nodes(&["T1", "T2"]),
            vec![EdgeRow::new("T1", "T2", 0.4)],
            ScorePolicy::Kappa,
        )
        .unwrap();
        let metadata = vec![
            TermMetadata { id: "T1".into(), p_value: 0.001, fdr_rate: 0.01 },
            TermMetadata { id: "T9".into(), p_value: 0.5, fdr_rate: 0.5 },
        ];

        let matched = merge_metadata(&mut graph, &metadata);
        assert_eq!(matched, 1);
        let t1 = graph.node("T1").unwrap();
        assert_eq!((t1.p_value, t1.fdr_rate), (Some(0.001), Some(0.01)));
        let t2 = graph.node("T2").unwrap();
        assert_eq!((t2.p_value, t2.fdr_rate), (Some(0.0), Some(0.0)));
        assert!(graph.node("T9").is_none());
    }
}
