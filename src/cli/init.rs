//! Init command - write an example protgraph.toml

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use protgraph::config::{AppConfig, PROJECT_CONFIG_FILE};

/// Run the init command
pub fn run(path: &Path) -> Result<()> {
    let dir = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    let existed = dir.join(PROJECT_CONFIG_FILE).exists();
    let config_path = AppConfig::init_project_config(&dir)?;

    if existed {
        println!(
            "{} Already initialized at {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
    } else {
        println!(
            "{} Created {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        println!(
            "\n{} Point {} at your layout engine, then run {}",
            style("→").dim(),
            style("[layout]").bold(),
            style("protgraph proteins --snapshot <db.json> --names <A;B>").cyan()
        );
    }
    Ok(())
}
