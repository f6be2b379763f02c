//! Terms command - overlap graph of enriched functional terms

use anyhow::Result;
use std::path::Path;

use protgraph::config::AppConfig;
use protgraph::query::SnapshotSource;
use protgraph::service::{self, EnrichedTerm};

pub fn run(config: &AppConfig, snapshot: &Path, terms: &Path, output: Option<&Path>) -> Result<()> {
    let terms: Vec<EnrichedTerm> = super::read_json(terms)?;
    let source = SnapshotSource::open(snapshot)?;
    let pipeline = super::pipeline(config);
    let report = service::term_graph(&source, &pipeline, &terms)?;

    super::report_skipped(report.skipped_rows);
    super::write_document(&report.document, output)
}
