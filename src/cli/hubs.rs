//! Hubs command - hub detection over a rendered document

use anyhow::Result;
use console::style;
use std::path::Path;

use protgraph::hubs::{self, HubFilter};
use protgraph::GraphDocument;

pub fn run(document: &Path, show: bool) -> Result<()> {
    let document: GraphDocument = super::read_json(document)?;

    let Some(threshold) = hubs::hub_threshold(&document) else {
        anyhow::bail!("Document has no node with a Degree attribute");
    };

    let filter = if show { HubFilter::Show } else { HubFilter::Hide };
    let selected = hubs::select(&document, filter);

    eprintln!(
        "{} Hub threshold: degree >= {} ({} of {} nodes selected)",
        style("✓").green(),
        style(threshold).bold(),
        selected.len(),
        document.nodes.len()
    );
    println!("{}", serde_json::to_string_pretty(&selected)?);
    Ok(())
}
