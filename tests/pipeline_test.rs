//! End-to-end tests for the graph build pipeline
//!
//! The layout engine is replaced by an in-process fake that echoes every
//! node back with a `Degree` attribute, so these tests cover:
//! - assembly and deduplication through to the final document
//! - the empty-graph short-circuit (engine never called)
//! - highlighting under both component policies
//! - both request entry points against a snapshot store

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use protgraph::graph::ComponentPolicy;
use protgraph::layout::{LayoutEdge, LayoutEngine, LayoutError, LayoutNode, LayoutResult};
use protgraph::merge::{ATTR_FDR, ATTR_NAME, DIM_EDGE_COLOR, DIM_NODE_COLOR};
use protgraph::models::{Edge, EdgeRow, Node, RenderingMode, ScorePolicy, TermMetadata};
use protgraph::pipeline::{RecordingObserver, Stage};
use protgraph::adapter::AssociationRecord;
use protgraph::query::{QueryError, QuerySession, QuerySource, Snapshot, SnapshotSource};
use protgraph::service::{self, EnrichedTerm, ProteinGraphRequest};
use protgraph::GraphPipeline;

/// Echoes the graph back, counting invocations and recording edge scores.
#[derive(Default)]
struct FakeEngine {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeEngine {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LayoutEngine for FakeEngine {
    fn render(&self, nodes: &[Node], edges: &[Edge]) -> Result<LayoutResult, LayoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LayoutError::EmptyOutput);
        }

        let nodes = nodes
            .iter()
            .map(|n| {
                let degree = edges.iter().filter(|e| e.source == n.id || e.target == n.id).count();
                let mut node = LayoutNode::new(&n.id);
                node.attributes.insert("Degree".to_string(), json!(degree.to_string()));
                node.extra.insert("x".to_string(), json!(1.0));
                node.extra.insert("y".to_string(), json!(-1.0));
                node
            })
            .collect();
        let edges = edges
            .iter()
            .map(|e| {
                let mut edge = LayoutEdge::new(&e.source, &e.target);
                edge.extra.insert("size".to_string(), json!(e.score));
                edge
            })
            .collect();
        Ok(LayoutResult { nodes, edges })
    }
}

fn node(id: &str) -> Node {
    Node::new(id, id)
}

#[test]
fn test_duplicate_edge_end_to_end() {
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let doc = pipeline
        .build_graph(
            vec![node("P1"), node("P2"), node("P3")],
            vec![EdgeRow::new("P1", "P2", 500.0), EdgeRow::new("P1", "P2", 500.0)],
            None,
            RenderingMode::Hide,
        )
        .unwrap();

    assert_eq!(doc.edges.len(), 1);
    assert_eq!(doc.edges[0].extra["size"], json!(500));
    assert_eq!(doc.subgraph, vec!["P1", "P2"]);

    let p3 = doc.node("P3").unwrap();
    assert_eq!(p3.color.as_deref(), Some(DIM_NODE_COLOR));
    assert_eq!(p3.hidden, Some(true));
    assert!(doc.node("P1").unwrap().color.is_none());
    assert_eq!(pipeline.engine().calls(), 1);
}

#[test]
fn test_empty_edges_skip_layout() {
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = GraphPipeline::new(FakeEngine::default()).with_observer(observer.clone());
    let doc = pipeline
        .build_graph(vec![node("P1"), node("P2")], vec![], None, RenderingMode::Dim)
        .unwrap();

    assert!(doc.is_empty());
    assert!(doc.subgraph.is_empty());
    assert_eq!(
        serde_json::to_value(&doc).unwrap(),
        json!({"nodes": [], "edges": [], "subgraph": []})
    );
    assert_eq!(pipeline.engine().calls(), 0);
    assert_eq!(observer.stages(), vec![Stage::Assemble]);
}

#[test]
fn test_stage_order() {
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = GraphPipeline::new(FakeEngine::default()).with_observer(observer.clone());
    pipeline
        .build_graph(vec![node("A"), node("B")], vec![EdgeRow::new("A", "B", 1.0)], None, RenderingMode::Dim)
        .unwrap();

    assert_eq!(
        observer.stages(),
        vec![Stage::Assemble, Stage::Components, Stage::Layout, Stage::Merge]
    );
    assert_eq!(observer.finished(), 1);
}

fn components_input() -> (Vec<Node>, Vec<EdgeRow>) {
    let nodes = ["A", "B", "C", "D", "E", "F"].iter().map(|id| node(id)).collect();
    let edges = vec![
        EdgeRow::new("A", "B", 10.0),
        EdgeRow::new("C", "D", 10.0),
        EdgeRow::new("D", "E", 10.0),
    ];
    (nodes, edges)
}

#[test]
fn test_all_connected_policy() {
    let (nodes, edges) = components_input();
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let doc = pipeline.build_graph(nodes, edges, None, RenderingMode::Dim).unwrap();

    assert_eq!(doc.subgraph, vec!["A", "B", "C", "D", "E"]);
    let f = doc.node("F").unwrap();
    assert_eq!(f.color.as_deref(), Some(DIM_NODE_COLOR));
    assert!(f.hidden.is_none());
    assert!(doc.edges.iter().all(|e| e.color.is_none()));
}

#[test]
fn test_largest_only_policy() {
    let (nodes, edges) = components_input();
    let pipeline =
        GraphPipeline::new(FakeEngine::default()).with_component_policy(ComponentPolicy::LargestOnly);
    let doc = pipeline.build_graph(nodes, edges, None, RenderingMode::Dim).unwrap();

    assert_eq!(doc.subgraph, vec!["C", "D", "E"]);
    let ab = doc.edges.iter().find(|e| e.source == "A").unwrap();
    assert_eq!(ab.color.as_deref(), Some(DIM_EDGE_COLOR));
    assert_eq!(doc.node("A").unwrap().color.as_deref(), Some(DIM_NODE_COLOR));
}

#[test]
fn test_kappa_policy_and_metadata() {
    let pipeline = GraphPipeline::new(FakeEngine::default()).with_score_policy(ScorePolicy::Kappa);
    let metadata = vec![
        TermMetadata {
            id: "T1".to_string(),
            p_value: 0.001,
            fdr_rate: 0.01,
        },
        TermMetadata {
            id: "T9".to_string(),
            p_value: 0.5,
            fdr_rate: 0.5,
        },
    ];
    let doc = pipeline
        .build_graph(
            vec![node("T1"), node("T2")],
            vec![EdgeRow::new("T1", "T2", 0.8675)],
            Some(&metadata),
            RenderingMode::Hide,
        )
        .unwrap();

    assert_eq!(doc.edges[0].extra["size"], json!(87));
    assert_eq!(doc.node("T1").unwrap().attributes[ATTR_FDR], json!(0.01));
    // Unmatched nodes carry zeroed statistics
    assert_eq!(doc.node("T2").unwrap().attributes[ATTR_FDR], json!(0.0));
}

#[test]
fn test_unknown_endpoint_is_rejected_before_layout() {
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let err = pipeline
        .build_graph(vec![node("P1")], vec![EdgeRow::new("P1", "P9", 1.0)], None, RenderingMode::Dim)
        .unwrap_err();

    assert!(err.to_string().contains("P9"));
    assert_eq!(pipeline.engine().calls(), 0);
}

#[test]
fn test_layout_failure_is_surfaced() {
    let pipeline = GraphPipeline::new(FakeEngine::failing());
    let err = pipeline
        .build_graph(vec![node("A"), node("B")], vec![EdgeRow::new("A", "B", 1.0)], None, RenderingMode::Dim)
        .unwrap_err();
    assert!(matches!(
        err,
        protgraph::PipelineError::Layout(LayoutError::EmptyOutput)
    ));
}

#[test]
fn test_failed_builds_still_finish_observer() {
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = GraphPipeline::new(FakeEngine::failing()).with_observer(observer.clone());

    // Assembly error
    pipeline
        .build_graph(vec![node("P1")], vec![EdgeRow::new("P1", "P9", 1.0)], None, RenderingMode::Dim)
        .unwrap_err();
    assert_eq!(observer.finished(), 1);
    assert!(observer.stages().is_empty());

    // Layout error
    pipeline
        .build_graph(vec![node("A"), node("B")], vec![EdgeRow::new("A", "B", 1.0)], None, RenderingMode::Dim)
        .unwrap_err();
    assert_eq!(observer.finished(), 2);
    assert_eq!(observer.stages(), vec![Stage::Assemble, Stage::Components]);
}

fn snapshot() -> SnapshotSource {
    let snapshot: Snapshot = serde_json::from_value(json!({
        "proteins": [
            {"external_id": "ENSMUSP1", "name": "Trp53", "species_id": 10090, "description": "p53"},
            {"external_id": "ENSMUSP2", "name": "Mdm2", "species_id": 10090},
            {"external_id": "ENSMUSP3", "name": "Egfr", "species_id": 10090},
            {"external_id": "ENSMUSP4", "name": "Kras", "species_id": 10090}
        ],
        "associations": [
            {"source": "ENSMUSP1", "target": "ENSMUSP2", "combined": 950},
            {"source": "ENSMUSP1", "target": "ENSMUSP3", "combined": 420},
            {"source": "ENSMUSP3", "target": "ENSMUSP4", "combined": 800}
        ],
        "terms": [
            {"external_id": "GO:1", "name": "apoptosis", "category": "GO Process"},
            {"external_id": "GO:2", "name": "autophagy", "category": "GO Process"},
            {"external_id": "GO:3", "name": "mitosis", "category": "GO Process"}
        ],
        "overlaps": [
            {"source": "GO:1", "target": "GO:2", "score": 0.8675},
            {"source": "GO:2", "target": "GO:3", "score": -0.5}
        ]
    }))
    .unwrap();
    SnapshotSource::new(snapshot)
}

#[test]
fn test_protein_graph_with_several_names() {
    let source = snapshot();
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let request = ProteinGraphRequest::new("trp53;MDM2;egfr").with_threshold(0.5);

    let report = service::protein_graph(&source, &pipeline, &request).unwrap();
    let doc = report.document;

    // 1-3 is below the threshold, 3-4 leaves the requested set
    assert_eq!(doc.edges.len(), 1);
    assert_eq!(doc.subgraph, vec!["ENSMUSP1", "ENSMUSP2"]);
    let p1 = doc.node("ENSMUSP1").unwrap();
    assert_eq!(p1.attributes[ATTR_NAME], json!("Trp53"));
    assert_eq!(p1.attributes["Category"], json!("Protein"));
    assert_eq!(p1.extra["species"], json!("10090"));
    assert!(doc.dvalues.is_none());
}

#[test]
fn test_protein_graph_single_name_uses_neighbours() {
    let source = snapshot();
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let request = ProteinGraphRequest::new("Egfr").with_threshold(0.4);

    let doc = service::protein_graph(&source, &pipeline, &request).unwrap().document;
    assert_eq!(doc.edges.len(), 2);
    assert_eq!(doc.subgraph, vec!["ENSMUSP1", "ENSMUSP3", "ENSMUSP4"]);
}

#[test]
fn test_protein_graph_unknown_name_is_empty() {
    let source = snapshot();
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let request = ProteinGraphRequest::new("NOPE");

    let doc = service::protein_graph(&source, &pipeline, &request).unwrap().document;
    assert!(doc.is_empty());
    assert_eq!(pipeline.engine().calls(), 0);
}

#[test]
fn test_protein_graph_with_experiment_columns() {
    let source = snapshot();
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let table = protgraph::experiment::ExperimentTable::from_reader(
        "SYMBOL,d1\ntrp53,1.5\nmdm2,-2\n".as_bytes(),
    )
    .unwrap();
    let request = ProteinGraphRequest::default().with_experiment(table, vec!["d1".to_string()]);

    let doc = service::protein_graph(&source, &pipeline, &request).unwrap().document;
    assert_eq!(doc.dvalues, Some(vec!["d1".to_string()]));
    assert_eq!(doc.node("ENSMUSP1").unwrap().attributes["d1"], json!(1.5));
    assert_eq!(doc.node("ENSMUSP2").unwrap().attributes["d1"], json!(-2.0));
}

#[test]
fn test_protein_graph_experiment_replaces_names() {
    let source = snapshot();
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let table = protgraph::experiment::ExperimentTable::from_reader(
        "SYMBOL,d1\ntrp53,1.5\nmdm2,-2\n".as_bytes(),
    )
    .unwrap();
    let request = ProteinGraphRequest::new("Egfr;Kras").with_experiment(table, vec![]);

    let doc = service::protein_graph(&source, &pipeline, &request).unwrap().document;
    assert_eq!(doc.subgraph, vec!["ENSMUSP1", "ENSMUSP2"]);
    assert!(doc.node("ENSMUSP4").is_none());
}

#[test]
fn test_term_graph_hides_and_scores_kappa() {
    let source = snapshot();
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let terms: Vec<EnrichedTerm> = serde_json::from_value(json!([
        {"id": "GO:1", "name": "apoptosis", "category": "GO Process", "p_value": 0.001, "fdr_rate": 0.01},
        {"id": "GO:2", "name": "autophagy", "category": "GO Process", "p_value": 0.002, "fdr_rate": 0.02},
        {"id": "GO:3", "name": "mitosis", "category": "GO Process", "p_value": 0.003, "fdr_rate": 0.03}
    ]))
    .unwrap();

    let report = service::term_graph(&source, &pipeline, &terms).unwrap();
    let doc = report.document;

    assert_eq!(report.skipped_rows, 0);
    let sizes: Vec<&Value> = doc.edges.iter().map(|e| &e.extra["size"]).collect();
    assert_eq!(sizes, vec![&json!(87), &json!(-50)]);
    assert_eq!(doc.node("GO:2").unwrap().attributes[ATTR_FDR], json!(0.02));
    assert_eq!(doc.subgraph, vec!["GO:1", "GO:2", "GO:3"]);
}

#[test]
fn test_term_graph_without_terms_skips_everything() {
    let source = snapshot();
    let pipeline = GraphPipeline::new(FakeEngine::default());
    let doc = service::term_graph(&source, &pipeline, &[]).unwrap().document;
    assert!(doc.is_empty());
    assert_eq!(pipeline.engine().calls(), 0);
}

/// Snapshot source that counts live sessions and can fail chosen reads.
#[derive(Default)]
struct CountingSource {
    inner: SnapshotSource,
    opened: AtomicUsize,
    live: AtomicUsize,
    fail_associations: bool,
    fail_export: bool,
}

impl CountingSource {
    fn new() -> Self {
        Self {
            inner: snapshot(),
            ..Self::default()
        }
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl QuerySource for CountingSource {
    fn session(&self) -> Result<Box<dyn QuerySession + '_>, QueryError> {
        let inner = self.inner.session()?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSession { source: self, inner }))
    }
}

struct CountingSession<'a> {
    source: &'a CountingSource,
    inner: Box<dyn QuerySession + 'a>,
}

impl Drop for CountingSession<'_> {
    fn drop(&mut self) {
        self.source.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl QuerySession for CountingSession<'_> {
    fn protein_ids_for_names(
        &mut self,
        names: &[String],
        species_id: u32,
    ) -> Result<Vec<String>, QueryError> {
        self.inner.protein_ids_for_names(names, species_id)
    }

    fn protein_associations(
        &mut self,
        ids: &[String],
        threshold: i64,
    ) -> Result<Vec<AssociationRecord>, QueryError> {
        if self.source.fail_associations {
            return Err(QueryError::Failed("connection reset".to_string()));
        }
        self.inner.protein_associations(ids, threshold)
    }

    fn protein_neighbours(
        &mut self,
        ids: &[String],
        threshold: i64,
    ) -> Result<Vec<AssociationRecord>, QueryError> {
        self.inner.protein_neighbours(ids, threshold)
    }

    fn export_term_overlaps(&mut self, term_ids: &[String], dest: &Path) -> Result<(), QueryError> {
        if self.source.fail_export {
            return Err(QueryError::Failed("export refused".to_string()));
        }
        self.inner.export_term_overlaps(term_ids, dest)
    }
}

fn enriched_terms() -> Vec<EnrichedTerm> {
    serde_json::from_value(json!([
        {"id": "GO:1", "name": "apoptosis"},
        {"id": "GO:2", "name": "autophagy"}
    ]))
    .unwrap()
}

#[test]
fn test_protein_graph_releases_session() {
    let source = CountingSource::new();
    let pipeline = GraphPipeline::new(FakeEngine::default());

    let doc = service::protein_graph(&source, &pipeline, &ProteinGraphRequest::new("Trp53;Mdm2"))
        .unwrap()
        .document;
    assert_eq!(doc.subgraph, vec!["ENSMUSP1", "ENSMUSP2"]);
    assert_eq!(source.opened(), 1);
    assert_eq!(source.live(), 0);

    // Unknown name short-circuits to an empty graph
    let doc = service::protein_graph(&source, &pipeline, &ProteinGraphRequest::new("NOPE"))
        .unwrap()
        .document;
    assert!(doc.is_empty());
    assert_eq!(source.opened(), 2);
    assert_eq!(source.live(), 0);
}

#[test]
fn test_protein_graph_releases_session_on_query_error() {
    let source = CountingSource {
        fail_associations: true,
        ..CountingSource::new()
    };
    let pipeline = GraphPipeline::new(FakeEngine::default());

    let err = service::protein_graph(&source, &pipeline, &ProteinGraphRequest::new("Trp53;Mdm2"))
        .unwrap_err();
    assert!(matches!(
        err,
        protgraph::PipelineError::Query(QueryError::Failed(_))
    ));
    assert_eq!(source.opened(), 1);
    assert_eq!(source.live(), 0);
    assert_eq!(pipeline.engine().calls(), 0);
}

#[test]
fn test_term_graph_releases_session() {
    let source = CountingSource::new();
    let pipeline = GraphPipeline::new(FakeEngine::default());

    let doc = service::term_graph(&source, &pipeline, &enriched_terms()).unwrap().document;
    assert_eq!(doc.subgraph, vec!["GO:1", "GO:2"]);
    assert_eq!(source.opened(), 1);
    assert_eq!(source.live(), 0);

    // Terms with no stored overlaps give an empty graph
    let unknown: Vec<EnrichedTerm> = serde_json::from_value(json!([{"id": "GO:404"}])).unwrap();
    let doc = service::term_graph(&source, &pipeline, &unknown).unwrap().document;
    assert!(doc.is_empty());
    assert_eq!(source.opened(), 2);
    assert_eq!(source.live(), 0);
}

#[test]
fn test_term_graph_releases_session_on_export_error() {
    let source = CountingSource {
        fail_export: true,
        ..CountingSource::new()
    };
    let pipeline = GraphPipeline::new(FakeEngine::default());

    let err = service::term_graph(&source, &pipeline, &enriched_terms()).unwrap_err();
    assert!(matches!(
        err,
        protgraph::PipelineError::Query(QueryError::Failed(_))
    ));
    assert_eq!(source.opened(), 1);
    assert_eq!(source.live(), 0);
}
