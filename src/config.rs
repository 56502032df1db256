//! Service configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::PipelineResult;

/// Configuration for [`crate::service::IngestService`].
///
/// Use [`Default`] for common cases; every field can also come from a JSON
/// config file via [`ServiceConfig::from_json_file`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory where uploaded byte sources are stored.
    pub data_dir: PathBuf,
    /// Path of the SQLite database holding dataset metadata and every
    /// imported table.
    pub db_path: PathBuf,
    /// Maximum number of rows retained for the upload-time preview.
    pub preview_limit: usize,
    /// Rows per import transaction.
    pub batch_size: usize,
    /// Upload size ceiling in bytes.
    pub max_upload_bytes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/uploads"),
            db_path: PathBuf::from("data/datasets.db"),
            preview_limit: 5,
            batch_size: 250,
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
