//! Assemble command - build a graph from exported association records

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use protgraph::adapter::{adapt_records, AssociationRecord};
use protgraph::config::AppConfig;
use protgraph::merge::MergeOptions;
use protgraph::models::{RenderingMode, ScorePolicy, TermMetadata};

/// Either a bare record list or records plus enrichment metadata
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsFile {
    Records(Vec<AssociationRecord>),
    WithMetadata {
        records: Vec<AssociationRecord>,
        #[serde(default)]
        metadata: Option<Vec<TermMetadata>>,
    },
}

pub fn run(
    config: &AppConfig,
    records: &Path,
    policy: ScorePolicy,
    mode: RenderingMode,
    output: Option<&Path>,
) -> Result<()> {
    let (records, metadata) = match super::read_json::<RecordsFile>(records)? {
        RecordsFile::Records(records) => (records, None),
        RecordsFile::WithMetadata { records, metadata } => (records, metadata),
    };

    let default_category = match policy {
        ScorePolicy::Association => "Protein",
        ScorePolicy::Kappa => "Term",
    };
    let rows = adapt_records(records, default_category);

    let pipeline = super::pipeline(config).with_score_policy(policy);
    let report = pipeline.build_from_rows(rows, metadata.as_deref(), &MergeOptions::new(mode))?;

    super::report_skipped(report.skipped_rows);
    super::write_document(&report.document, output)
}
