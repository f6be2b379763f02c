//! Layout engine wire format

use std::io;

use super::{LayoutError, LayoutResult};
use crate::models::{Edge, Node};

/// Encode nodes and edges as the engine's standard input.
///
/// `<node table>\n<edge table>`, each table with a header row and
/// minimal quoting.
pub fn encode_input(nodes: &[Node], edges: &[Edge]) -> Result<String, LayoutError> {
    let mut node_table = table_writer();
    node_table.write_record(["external_id"]).map_err(io::Error::from)?;
    for node in nodes {
        node_table.write_record([node.id.as_str()]).map_err(io::Error::from)?;
    }

    let mut edge_table = table_writer();
    edge_table
        .write_record(["source", "target", "score"])
        .map_err(io::Error::from)?;
    for edge in edges {
        let score = edge.score.to_string();
        edge_table
            .write_record([edge.source.as_str(), edge.target.as_str(), score.as_str()])
            .map_err(io::Error::from)?;
    }

    let node_text = finish(node_table)?;
    let edge_text = finish(edge_table)?;
    Ok(format!("{}\n{}", node_text, edge_text))
}

/// Decode the engine's standard output.
pub fn decode_output(stdout: &str) -> Result<LayoutResult, LayoutError> {
    if stdout.trim().is_empty() {
        return Err(LayoutError::EmptyOutput);
    }
    Ok(serde_json::from_str(stdout)?)
}

fn table_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, LayoutError> {
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}
