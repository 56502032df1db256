//! Single-pass column census, preview capture, and row counting.
//!
//! The upload path makes exactly one pass over the row stream: the first
//! row's keys (in encountered order) become the column list, the first
//! `preview_limit` rows are retained verbatim, and every yielded row is
//! counted. Later rows with extra keys do not extend the column list — a
//! deliberate first-row-only policy; their missing keys read as absent.

use crate::decode::RowReader;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{ColumnDescriptor, Row};

/// Result of one full pass over a row stream.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Column list from the first row, in encountered order. Empty for a
    /// zero-row source.
    pub columns: Vec<ColumnDescriptor>,
    /// Rows successfully yielded before exhaustion or the first fatal error.
    pub row_count: usize,
    /// The first `preview_limit` rows, verbatim.
    pub preview: Vec<Row>,
    /// The fatal decode error that ended the stream early, if any.
    pub decode_error: Option<PipelineError>,
}

/// Consume the whole stream, deriving columns, preview, and total row count.
///
/// A zero-row source yields empty columns and `row_count == 0`, not an
/// error. A fatal decode error ends the count early and is reported in
/// [`ScanOutcome::decode_error`]; the caller decides whether that downgrades
/// to a partial result or fails the request.
pub fn scan_stream(reader: RowReader, preview_limit: usize) -> ScanOutcome {
    let mut columns: Vec<ColumnDescriptor> = Vec::new();
    let mut preview: Vec<Row> = Vec::new();
    let mut row_count = 0usize;
    let mut decode_error = None;

    for item in reader {
        match item {
            Ok(row) => {
                if row_count == 0 {
                    columns = census_columns(&row);
                }
                if preview.len() < preview_limit {
                    preview.push(row);
                }
                row_count += 1;
            }
            Err(e) => {
                decode_error = Some(e);
                break;
            }
        }
    }

    ScanOutcome {
        columns,
        row_count,
        preview,
        decode_error,
    }
}

/// Read up to `limit` rows from the stream without consuming the rest.
///
/// Used by the preview endpoint, which re-derives a bounded preview from the
/// stored source. An error before the first row fails the call; an error
/// after some rows yields the rows gathered so far.
pub fn preview_rows(reader: RowReader, limit: usize) -> PipelineResult<Vec<Row>> {
    let mut rows = Vec::new();
    for item in reader.take(limit) {
        match item {
            Ok(row) => rows.push(row),
            Err(e) if rows.is_empty() => return Err(e),
            Err(_) => break,
        }
    }
    Ok(rows)
}

fn census_columns(row: &Row) -> Vec<ColumnDescriptor> {
    row.iter()
        .map(|(name, value)| ColumnDescriptor::new(name, value.kind()))
        .collect()
}
