//! Proteins command - association subgraph around a protein set

use anyhow::{Context, Result};
use std::path::Path;

use protgraph::config::AppConfig;
use protgraph::experiment::ExperimentTable;
use protgraph::query::SnapshotSource;
use protgraph::service::{self, ProteinGraphRequest};

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &AppConfig,
    snapshot: &Path,
    names: Option<String>,
    species: u32,
    threshold: f64,
    experiment: Option<&Path>,
    columns: Vec<String>,
    output: Option<&Path>,
) -> Result<()> {
    let mut request = ProteinGraphRequest {
        names,
        ..ProteinGraphRequest::default()
    }
    .with_species(species)
    .with_threshold(threshold);

    if let Some(path) = experiment {
        let table = ExperimentTable::from_path(path)
            .with_context(|| format!("Failed to load experiment table {}", path.display()))?;
        request = request.with_experiment(table, columns);
    }

    if request.protein_names().is_empty() {
        anyhow::bail!("No protein names given; pass --names or an --experiment table");
    }

    let source = SnapshotSource::open(snapshot)?;
    let pipeline = super::pipeline(config);
    let report = service::protein_graph(&source, &pipeline, &request)?;

    super::report_skipped(report.skipped_rows);
    super::write_document(&report.document, output)
}
