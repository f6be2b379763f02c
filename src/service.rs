//! Request entry points
//!
//! The two graph requests served to the front end, each a thin wrapper
//! that queries the store and hands the rows to [`GraphPipeline`]:
//! - protein subgraph (association scores, dimmed non-members)
//! - functional-term graph (kappa overlaps, hidden non-members)

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adapter::{adapt_records, ScratchExport};
use crate::experiment::ExperimentTable;
use crate::layout::LayoutEngine;
use crate::merge::{GraphDocument, MergeOptions};
use crate::models::{RenderingMode, ScorePolicy, TermMetadata};
use crate::pipeline::{BuildReport, GraphPipeline, PipelineError};
use crate::query::QuerySource;

pub const PROTEIN_CATEGORY: &str = "Protein";
pub const TERM_CATEGORY: &str = "Term";
pub const DEFAULT_SPECIES: u32 = 10090;

/// A protein subgraph request.
#[derive(Debug, Clone)]
pub struct ProteinGraphRequest {
    /// `;`-separated protein names
    pub names: Option<String>,
    pub species_id: u32,
    /// Minimum association score in [0, 1]
    pub threshold: f64,
    pub experiment: Option<ExperimentTable>,
    /// Experiment columns to copy onto nodes
    pub columns: Vec<String>,
}

impl Default for ProteinGraphRequest {
    fn default() -> Self {
        Self {
            names: None,
            species_id: DEFAULT_SPECIES,
            threshold: 0.0,
            experiment: None,
            columns: Vec::new(),
        }
    }
}

impl ProteinGraphRequest {
    pub fn new(names: &str) -> Self {
        Self {
            names: Some(names.to_string()),
            ..Self::default()
        }
    }

    pub fn with_species(mut self, species_id: u32) -> Self {
        self.species_id = species_id;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_experiment(mut self, table: ExperimentTable, columns: Vec<String>) -> Self {
        self.experiment = Some(table);
        self.columns = columns;
        self
    }

    /// Names to query. An experiment table replaces the explicit names
    /// with its symbols.
    pub fn protein_names(&self) -> Vec<String> {
        if let Some(table) = &self.experiment {
            if self.names.is_some() {
                debug!("Experiment table given; querying its symbols instead of the name list");
            }
            return table.symbols();
        }
        self.names.as_deref().map(split_names).unwrap_or_default()
    }

    /// Threshold on the integer score scale.
    pub fn score_threshold(&self) -> i64 {
        (self.threshold * 1000.0).trunc() as i64
    }
}

/// Split a `;`-separated name list, dropping blanks and upper-casing.
pub fn split_names(names: &str) -> Vec<String> {
    names
        .split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_uppercase)
        .collect()
}

/// One enriched term as produced by the enrichment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTerm {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, alias = "pValue", alias = "p Value")]
    pub p_value: f64,
    #[serde(default, alias = "fdr", alias = "FDR")]
    pub fdr_rate: f64,
}

impl EnrichedTerm {
    pub fn metadata(&self) -> TermMetadata {
        TermMetadata {
            id: self.id.clone(),
            p_value: self.p_value,
            fdr_rate: self.fdr_rate,
        }
    }
}

/// Build the protein subgraph for a request.
pub fn protein_graph<S, E>(
    source: &S,
    pipeline: &GraphPipeline<E>,
    request: &ProteinGraphRequest,
) -> Result<BuildReport, PipelineError>
where
    S: QuerySource + ?Sized,
    E: LayoutEngine,
{
    if let Some(table) = &request.experiment {
        table.validate(&request.columns)?;
    }

    let names = request.protein_names();
    let threshold = request.score_threshold();

    let records = {
        let mut session = source.session()?;
        let ids = session.protein_ids_for_names(&names, request.species_id)?;
        debug!("Resolved {} of {} protein names", ids.len(), names.len());
        if ids.len() > 1 {
            session.protein_associations(&ids, threshold)?
        } else {
            session.protein_neighbours(&ids, threshold)?
        }
    };

    let rows = adapt_records(records, PROTEIN_CATEGORY);
    let options = MergeOptions::new(RenderingMode::Dim).with_species(request.species_id.to_string());
    let mut report = pipeline.build_from_rows(rows, None, &options)?;

    if let Some(table) = &request.experiment {
        if !request.columns.is_empty() && !report.document.is_empty() {
            let annotated = table.annotate(&mut report.document, &request.columns)?;
            debug!("Annotated {} nodes with experiment values", annotated);
        }
    }

    info!(
        "Protein graph: {} nodes, {} skipped rows",
        report.document.nodes.len(),
        report.skipped_rows
    );
    Ok(report)
}

/// Build the functional-term graph for a list of enriched terms.
///
/// Scores are read as kappa regardless of the pipeline's configured policy.
pub fn term_graph<S, E>(
    source: &S,
    pipeline: &GraphPipeline<E>,
    terms: &[EnrichedTerm],
) -> Result<BuildReport, PipelineError>
where
    S: QuerySource + ?Sized,
    E: LayoutEngine,
{
    if terms.is_empty() {
        return Ok(BuildReport {
            document: GraphDocument::empty(),
            ..BuildReport::default()
        });
    }

    let term_ids: Vec<String> = terms.iter().map(|t| t.id.clone()).collect();
    let scratch = ScratchExport::new()?;
    {
        let mut session = source.session()?;
        session.export_term_overlaps(&term_ids, scratch.path())?;
    }
    let rows = scratch.into_rows(TERM_CATEGORY)?;

    let metadata: Vec<TermMetadata> = terms.iter().map(EnrichedTerm::metadata).collect();
    let options = MergeOptions::new(RenderingMode::Hide);
    let report = pipeline.build_from_rows_with_policy(rows, Some(&metadata), &options, ScorePolicy::Kappa)?;

    info!(
        "Term graph: {} nodes, {} skipped rows",
        report.document.nodes.len(),
        report.skipped_rows
    );
    Ok(report)
}
