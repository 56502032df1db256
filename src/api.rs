//! Transport-agnostic request/response surface.
//!
//! Each handler mirrors one endpoint of the hosting application and returns
//! either a serializable response DTO or an [`ApiError`] carrying the HTTP
//! status class for the failure. The handlers hold no state of their own;
//! everything goes through the injected [`IngestService`].

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::import::{ImportOptions, ImportStatus};
use crate::registry::DatasetSummary;
use crate::service::IngestService;
use crate::types::{ColumnDescriptor, Row};

/// Failure payload: an HTTP status plus a concise reason naming the
/// offending file or dataset id.
///
/// For partially completed imports the body also reports the destination
/// table and the rows already committed, so successful work is never hidden
/// behind an opaque failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Human-readable reason.
    pub error: String,
    /// Destination table of a partially completed import.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Rows committed before the import stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted: Option<u64>,
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::UnsupportedFormat { .. } => 415,
            PipelineError::UploadTooLarge { .. } => 413,
            PipelineError::Format { .. } => 422,
            PipelineError::NotFound { .. } => 404,
            PipelineError::RegistryConflict { .. } | PipelineError::ImportInProgress { .. } => 409,
            PipelineError::Io(_) | PipelineError::Storage(_) | PipelineError::Json(_) => 500,
        };
        Self {
            status,
            error: e.to_string(),
            table: None,
            inserted: None,
        }
    }
}

/// `POST /upload` response: dataset metadata plus the bounded preview.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub name: String,
    pub uploaded_at: String,
    pub size_bytes: u64,
    pub row_count: u64,
    pub column_count: u64,
    /// Preview rows only; the full dataset is never echoed back.
    pub data: Vec<Row>,
    pub columns: Vec<ColumnDescriptor>,
    pub is_preview: bool,
    /// Present when decoding ended early after some rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// `GET /preview/{id}` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub id: String,
    pub data: Vec<Row>,
    pub is_preview: bool,
}

/// `GET /summary/{id}` response, from stored metadata only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub row_count: u64,
    pub column_count: u64,
    pub columns: Vec<ColumnDescriptor>,
}

/// `POST /import/{id}` request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportRequest {
    pub table_name: Option<String>,
    pub batch_size: Option<usize>,
}

/// `POST /import/{id}` success response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub table: String,
    pub inserted: u64,
}

/// `GET /health` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// `POST /upload`: one multipart file field, decoded per its extension.
pub fn handle_upload(
    service: &IngestService,
    file_name: &str,
    bytes: &[u8],
) -> Result<UploadResponse, ApiError> {
    let result = service.upload(file_name, bytes)?;
    let record = result.record;
    Ok(UploadResponse {
        id: record.id,
        name: record.name,
        uploaded_at: record.uploaded_at,
        size_bytes: record.size_bytes,
        row_count: record.row_count.unwrap_or_default(),
        column_count: record.column_count.unwrap_or_default(),
        data: result.preview,
        columns: record.columns.unwrap_or_default(),
        is_preview: true,
        warning: result.warning,
    })
}

/// `GET /datasets`: summaries, most recent first.
pub fn handle_list(service: &IngestService) -> Result<Vec<DatasetSummary>, ApiError> {
    Ok(service.list()?)
}

/// `GET /preview/{id}?limit=N`: re-derived preview from the stored source.
pub fn handle_preview(
    service: &IngestService,
    id: &str,
    limit: Option<usize>,
) -> Result<PreviewResponse, ApiError> {
    let data = service.preview(id, limit)?;
    Ok(PreviewResponse {
        id: id.to_string(),
        data,
        is_preview: true,
    })
}

/// `GET /summary/{id}`: metadata only, no source re-read.
pub fn handle_summary(service: &IngestService, id: &str) -> Result<SummaryResponse, ApiError> {
    let record = service.summary(id)?;
    Ok(SummaryResponse {
        row_count: record.row_count.unwrap_or_default(),
        column_count: record.column_count.unwrap_or_default(),
        columns: record.columns.unwrap_or_default(),
    })
}

/// `POST /import/{id}`: run a batched import of the full dataset.
///
/// A fully successful import returns the table and inserted count; a
/// partial or failed import surfaces as a 5xx whose body still reports the
/// rows committed so far.
pub fn handle_import(
    service: &IngestService,
    id: &str,
    request: &ImportRequest,
) -> Result<ImportResponse, ApiError> {
    let options = ImportOptions {
        table_name: request.table_name.clone(),
        batch_size: request.batch_size,
    };
    let outcome = service.import(id, &options)?;
    match outcome.status {
        ImportStatus::Succeeded => Ok(ImportResponse {
            table: outcome.table,
            inserted: outcome.rows_inserted,
        }),
        ImportStatus::PartiallySucceeded | ImportStatus::Failed => Err(ApiError {
            status: 500,
            error: outcome
                .error
                .unwrap_or_else(|| "import did not fully complete".to_string()),
            table: Some(outcome.table),
            inserted: Some(outcome.rows_inserted),
        }),
    }
}

/// `GET /health`: liveness probe.
pub fn handle_health(service: &IngestService) -> HealthResponse {
    let health = service.health();
    HealthResponse {
        status: health.status.to_string(),
        timestamp: health.timestamp,
    }
}
