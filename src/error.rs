use thiserror::Error;

use crate::decode::SourceFormat;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned across the ingestion pipeline.
///
/// This is a single error enum shared by the decoders, the registry, the
/// importer, and the service entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The uploaded file's extension does not name a supported format.
    ///
    /// Raised before any byte of the source is read.
    #[error("unsupported format: extension '{extension}' is not one of csv/tsv/json/ndjson/xlsx/xls/xlsm/xlsb/ods")]
    UnsupportedFormat { extension: String },

    /// The uploaded file exceeds the configured size ceiling.
    #[error("upload of {size_bytes} bytes exceeds the {limit_bytes} byte limit")]
    UploadTooLarge { size_bytes: u64, limit_bytes: u64 },

    /// The byte content does not parse as the declared format.
    ///
    /// `offset` is the byte position where the decoder gave up, when the
    /// underlying parser can report one; `message` carries a human-readable
    /// position hint whenever any is available.
    #[error("malformed {format} source: {message}")]
    Format {
        format: SourceFormat,
        message: String,
        offset: Option<u64>,
    },

    /// The referenced dataset id does not exist in the registry.
    #[error("dataset '{id}' not found")]
    NotFound { id: String },

    /// An attempt to re-record a set-once field with a different value.
    #[error("registry conflict for dataset '{id}': {message}")]
    RegistryConflict { id: String, message: String },

    /// Another import into the same destination table is still running.
    #[error("an import into table '{table}' is already in flight")]
    ImportInProgress { table: String },

    /// Metadata store / destination table error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// JSON (de)serialization error outside the decode path (config files,
    /// persisted column censuses).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Build a [`PipelineError::Format`] with an optional byte offset.
    pub fn format(format: SourceFormat, message: impl Into<String>, offset: Option<u64>) -> Self {
        Self::Format {
            format,
            message: message.into(),
            offset,
        }
    }
}
