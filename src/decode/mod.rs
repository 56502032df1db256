//! Format decoders: one lazy row-stream implementation per supported format,
//! unified behind [`RowReader`].
//!
//! A [`RowReader`] is a forward-only sequence of [`crate::types::Row`]s. It
//! is not a rewindable cursor: consuming the stream a second time requires
//! reopening the source. A fatal parse error ends the sequence early; the
//! error item is yielded once and the stream then reports exhaustion.

pub mod delimited;
pub mod json;
pub mod workbook;

use std::fmt;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::Row;

pub use delimited::DelimitedReader;
pub use json::{JsonArrayReader, JsonLinesReader};
pub use workbook::WorkbookReader;

/// Supported source formats, selected by file extension at the entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma-delimited text.
    Csv,
    /// Tab-delimited text.
    Tsv,
    /// A single top-level JSON array of objects.
    Json,
    /// Newline-delimited JSON objects.
    NdJson,
    /// Spreadsheet workbook (first sheet only).
    Workbook,
}

impl SourceFormat {
    /// Parse a source format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "ndjson" => Some(Self::NdJson),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Workbook),
            _ => None,
        }
    }

    /// Derive the format from a path's extension.
    ///
    /// Fails with [`PipelineError::UnsupportedFormat`] before any byte of the
    /// source is read.
    pub fn from_path(path: &Path) -> PipelineResult<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| PipelineError::UnsupportedFormat {
            extension: ext.to_string(),
        })
    }

    /// Field delimiter for the delimited-text formats.
    pub(crate) fn delimiter(self) -> u8 {
        match self {
            Self::Tsv => b'\t',
            _ => b',',
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Json => "json",
            Self::NdJson => "ndjson",
            Self::Workbook => "workbook",
        };
        f.write_str(name)
    }
}

/// A format-tagged row stream over a byte source.
///
/// One variant per decoder; dispatch is by tag, not trait objects, so the
/// reader stays a plain owned value.
pub enum RowReader {
    /// Delimited text (CSV/TSV).
    Delimited(DelimitedReader),
    /// Top-level JSON array of objects, parsed element-at-a-time.
    JsonArray(JsonArrayReader),
    /// Newline-delimited JSON objects.
    JsonLines(JsonLinesReader),
    /// First sheet of a spreadsheet workbook.
    Workbook(WorkbookReader),
}

impl RowReader {
    /// Open a row stream over `path` using the given format.
    pub fn open(path: impl AsRef<Path>, format: SourceFormat) -> PipelineResult<Self> {
        let path = path.as_ref();
        match format {
            SourceFormat::Csv | SourceFormat::Tsv => {
                Ok(Self::Delimited(DelimitedReader::open(path, format)?))
            }
            SourceFormat::Json => Ok(Self::JsonArray(JsonArrayReader::open(path)?)),
            SourceFormat::NdJson => Ok(Self::JsonLines(JsonLinesReader::open(path)?)),
            SourceFormat::Workbook => Ok(Self::Workbook(WorkbookReader::open(path)?)),
        }
    }

    /// Open a row stream, deriving the format from the path extension.
    pub fn open_auto(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)?;
        Self::open(path, format)
    }
}

impl Iterator for RowReader {
    type Item = PipelineResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Delimited(r) => r.next(),
            Self::JsonArray(r) => r.next(),
            Self::JsonLines(r) => r.next(),
            Self::Workbook(r) => r.next(),
        }
    }
}
