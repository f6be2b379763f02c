//! CLI command definitions and handlers

mod assemble;
mod hubs;
mod init;
mod proteins;
mod terms;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};

use protgraph::config::AppConfig;
use protgraph::layout::ProcessLayoutEngine;
use protgraph::models::{RenderingMode, ScorePolicy};
use protgraph::{GraphDocument, GraphPipeline};

/// Parse and validate a threshold in [0, 1]
fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if !(0.0..=1.0).contains(&value) {
        Err("threshold must be between 0 and 1".to_string())
    } else {
        Ok(value)
    }
}

/// protgraph - association graph assembly
#[derive(Parser, Debug)]
#[command(name = "protgraph")]
#[command(
    version,
    about = "Assemble protein association and functional-term graphs for visualization",
    after_help = "\
Examples:
  protgraph proteins --snapshot db.json --names \"TP53;MDM2\"   Protein subgraph
  protgraph terms --snapshot db.json --terms enriched.json     Functional-term graph
  protgraph assemble --records records.json --policy kappa     Build from exported records
  protgraph hubs --document graph.json --show                  List hub nodes
  protgraph init                                               Write protgraph.toml"
)]
pub struct Cli {
    /// Config file (overrides ./protgraph.toml and the user config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); defaults to RUST_LOG
    #[arg(long, global = true, value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a protgraph.toml config file with example settings
    Init,

    /// Build the association subgraph around a set of proteins
    Proteins {
        /// Graph store snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,

        /// Protein names separated by ';' (replaced by the symbols of --experiment)
        #[arg(long)]
        names: Option<String>,

        /// NCBI species id
        #[arg(long, default_value = "10090")]
        species: u32,

        /// Minimum association score (0-1)
        #[arg(long, default_value = "0", value_parser = parse_threshold)]
        threshold: f64,

        /// Experiment table (CSV with a SYMBOL column)
        #[arg(long)]
        experiment: Option<PathBuf>,

        /// Experiment columns to attach to nodes
        #[arg(long, value_delimiter = ',', requires = "experiment")]
        columns: Vec<String>,

        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Build the overlap graph of enriched functional terms
    Terms {
        /// Graph store snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,

        /// Enriched terms (JSON array of {id, name, category, p_value, fdr_rate})
        #[arg(long)]
        terms: PathBuf,

        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Build a graph directly from exported association records
    Assemble {
        /// Records file (JSON array, or {"records": [...], "metadata": [...]})
        #[arg(long)]
        records: PathBuf,

        /// Score policy: association or kappa
        #[arg(long, default_value = "association")]
        policy: ScorePolicy,

        /// Rendering of nodes outside the principal subgraph: dim or hide
        #[arg(long, default_value = "dim")]
        mode: RenderingMode,

        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Find hub nodes in a rendered graph document
    Hubs {
        /// Graph document (JSON)
        #[arg(long)]
        document: PathBuf,

        /// List the hubs instead of the non-hub nodes
        #[arg(long)]
        show: bool,
    },
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init => init::run(Path::new(".")),

        Commands::Proteins {
            snapshot,
            names,
            species,
            threshold,
            experiment,
            columns,
            output,
        } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            proteins::run(
                &config,
                &snapshot,
                names,
                species,
                threshold,
                experiment.as_deref(),
                columns,
                output.as_deref(),
            )
        }

        Commands::Terms {
            snapshot,
            terms,
            output,
        } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            terms::run(&config, &snapshot, &terms, output.as_deref())
        }

        Commands::Assemble {
            records,
            policy,
            mode,
            output,
        } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            assemble::run(&config, &records, policy, mode, output.as_deref())
        }

        Commands::Hubs { document, show } => hubs::run(&document, show),
    }
}

/// Pipeline wired to the configured layout engine.
fn pipeline(config: &AppConfig) -> GraphPipeline<ProcessLayoutEngine> {
    let engine = ProcessLayoutEngine::from_config(&config.layout);
    tracing::debug!(
        "Layout engine: {} (timeout {}s, {} retries)",
        engine.program(),
        config.layout.timeout_secs(),
        config.layout.retries()
    );
    GraphPipeline::new(engine).with_component_policy(config.graph.component_policy())
}

/// Read and parse a JSON input file.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write a document to `output`, or stdout.
fn write_document(document: &GraphDocument, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(document)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} Wrote {} nodes, {} edges to {}",
                style("✓").green(),
                document.nodes.len(),
                document.edges.len(),
                style(path.display()).cyan()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// One-line summary of skipped input rows, if any
fn report_skipped(skipped: usize) {
    if skipped > 0 {
        eprintln!(
            "{} Skipped {} malformed input row{}",
            style("!").yellow(),
            skipped,
            if skipped == 1 { "" } else { "s" }
        );
    }
}
