//! Graph build pipeline
//!
//! The single entry point shared by every caller:
//! 1. Assemble (dedup, score policy, optional enrichment metadata)
//! 2. Extract the principal subgraph
//! 3. Lay out through the layout engine
//! 4. Merge metadata and highlight back onto the layout
//!
//! An assembly with no edges short-circuits to an empty document and never
//! reaches the layout engine.

mod observer;

pub use observer::{NoopObserver, RecordingObserver, Stage, StageObserver, Stopwatch, TracingObserver};

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::adapter::{AdaptedRows, AdapterError};
use crate::experiment::ExperimentError;
use crate::graph::{self, AssemblyError, ComponentPolicy};
use crate::layout::{LayoutEngine, LayoutError};
use crate::merge::{self, GraphDocument, MergeOptions, MergeStats};
use crate::models::{EdgeRow, Node, RenderingMode, ScorePolicy, TermMetadata};
use crate::query::QueryError;

/// Anything that can fail a graph request
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Experiment(#[from] ExperimentError),
}

/// Outcome of a build, with the bookkeeping callers may want to surface.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub document: GraphDocument,
    /// Input rows dropped by the adapter
    pub skipped_rows: usize,
    pub merge: MergeStats,
}

/// Graph build pipeline bound to one layout engine.
pub struct GraphPipeline<E: LayoutEngine> {
    engine: E,
    score_policy: ScorePolicy,
    component_policy: ComponentPolicy,
    observer: Arc<dyn StageObserver>,
}

impl<E: LayoutEngine> GraphPipeline<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            score_policy: ScorePolicy::default(),
            component_policy: ComponentPolicy::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_score_policy(mut self, policy: ScorePolicy) -> Self {
        self.score_policy = policy;
        self
    }

    pub fn with_component_policy(mut self, policy: ComponentPolicy) -> Self {
        self.component_policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn score_policy(&self) -> ScorePolicy {
        self.score_policy
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Build a graph document from node and edge rows.
    pub fn build_graph(
        &self,
        nodes: Vec<Node>,
        edges: Vec<EdgeRow>,
        metadata: Option<&[TermMetadata]>,
        mode: RenderingMode,
    ) -> Result<GraphDocument, PipelineError> {
        let (document, _) = self.build_with_options(nodes, edges, metadata, &MergeOptions::new(mode))?;
        Ok(document)
    }

    /// Build from adapter output, carrying the skipped-row count through.
    pub fn build_from_rows(
        &self,
        rows: AdaptedRows,
        metadata: Option<&[TermMetadata]>,
        options: &MergeOptions,
    ) -> Result<BuildReport, PipelineError> {
        self.build_from_rows_with_policy(rows, metadata, options, self.score_policy)
    }

    /// [`GraphPipeline::build_from_rows`] with a per-request score policy.
    pub fn build_from_rows_with_policy(
        &self,
        rows: AdaptedRows,
        metadata: Option<&[TermMetadata]>,
        options: &MergeOptions,
        policy: ScorePolicy,
    ) -> Result<BuildReport, PipelineError> {
        let skipped_rows = rows.skipped;
        let (document, merge) = self.run(rows.nodes, rows.edges, metadata, options, policy)?;
        Ok(BuildReport {
            document,
            skipped_rows,
            merge,
        })
    }

    /// [`GraphPipeline::build_graph`] with full merge options.
    pub fn build_with_options(
        &self,
        nodes: Vec<Node>,
        edges: Vec<EdgeRow>,
        metadata: Option<&[TermMetadata]>,
        options: &MergeOptions,
    ) -> Result<(GraphDocument, MergeStats), PipelineError> {
        self.run(nodes, edges, metadata, options, self.score_policy)
    }

    fn run(
        &self,
        nodes: Vec<Node>,
        edges: Vec<EdgeRow>,
        metadata: Option<&[TermMetadata]>,
        options: &MergeOptions,
        policy: ScorePolicy,
    ) -> Result<(GraphDocument, MergeStats), PipelineError> {
        let mut watch = Stopwatch::new(self.observer.as_ref());

        let mut assembled = graph::assemble(nodes, edges, policy)?;
        if let Some(metadata) = metadata {
            let matched = graph::merge_metadata(&mut assembled, metadata);
            debug!("Enrichment metadata matched {} nodes", matched);
        }
        watch.round(Stage::Assemble);

        if assembled.is_empty() {
            info!("No associations found; returning empty graph");
            watch.total();
            return Ok((GraphDocument::empty(), MergeStats::default()));
        }

        let principal = graph::principal_component(&assembled.edges, self.component_policy);
        watch.round(Stage::Components);

        let layout = self.engine.render(&assembled.nodes, &assembled.edges)?;
        watch.round(Stage::Layout);

        let (document, stats) = merge::merge(layout, &assembled, &principal, options);
        watch.round(Stage::Merge);

        info!(
            "Built graph: {} nodes, {} edges, {} in principal subgraph",
            document.nodes.len(),
            document.edges.len(),
            document.subgraph.len()
        );
        watch.total();
        Ok((document, stats))
    }
}
