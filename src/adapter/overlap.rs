//! Term-overlap exports
//!
//! Bulk term-overlap queries are exported by the graph store as CSV with
//! three columns: `source` and `target` hold JSON-encoded node envelopes,
//! `score` holds the kappa value. The export lands in a [`ScratchExport`]
//! that is deleted as soon as the rows have been read.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{AdaptedRows, AdapterError};

const SOURCE_COLUMN: &str = "source";
const TARGET_COLUMN: &str = "target";
const SCORE_COLUMN: &str = "score";

/// Parse a term-overlap CSV export.
pub fn adapt_overlap_export<R: Read>(
    reader: R,
    default_category: &str,
) -> Result<AdaptedRows, AdapterError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| -> Result<usize, AdapterError> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| AdapterError::MissingColumn(name.to_string()))
    };
    let source_idx = column(SOURCE_COLUMN)?;
    let target_idx = column(TARGET_COLUMN)?;
    let score_idx = column(SCORE_COLUMN)?;

    let mut rows = AdaptedRows::default();
    for (line, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                debug!("Skipping unreadable export row {}: {}", line + 1, e);
                rows.skipped += 1;
                continue;
            }
        };

        let cell = |idx: usize| record.get(idx).unwrap_or_default();
        let source: Value = serde_json::from_str(cell(source_idx)).unwrap_or(Value::Null);
        let target: Value = serde_json::from_str(cell(target_idx)).unwrap_or(Value::Null);
        let score = Value::String(cell(score_idx).to_string());

        let before = rows.skipped;
        rows.push_association(&source, &target, &score, default_category);
        if rows.skipped > before {
            debug!("Skipping malformed export row {}", line + 1);
        }
    }

    Ok(rows)
}

/// A temporary export file owned for the duration of one request.
///
/// The query layer writes into [`ScratchExport::path`]; the file is removed
/// when the guard is dropped, whichever way the request ends.
#[derive(Debug)]
pub struct ScratchExport {
    file: NamedTempFile,
}

impl ScratchExport {
    pub fn new() -> Result<Self, AdapterError> {
        let file = tempfile::Builder::new()
            .prefix("protgraph-overlap-")
            .suffix(".csv")
            .tempfile()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the export back as adapted rows and delete it.
    pub fn into_rows(self, default_category: &str) -> Result<AdaptedRows, AdapterError> {
        let reader = File::open(self.path())?;
        adapt_overlap_export(reader, default_category)
    }
}
