//! The ingestion service boundary.
//!
//! [`IngestService`] owns the injected [`DatasetRegistry`] and the upload
//! directory, and exposes the pipeline's operations: upload (scan + census +
//! preview), listing, re-derived previews, metadata summaries, batched
//! imports, and a liveness probe. One upload or import is handled
//! synchronously per call; callers may run requests concurrently across
//! independent dataset ids.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use crate::census::{preview_rows, scan_stream};
use crate::config::ServiceConfig;
use crate::decode::{RowReader, SourceFormat};
use crate::error::{PipelineError, PipelineResult};
use crate::import::{BatchImporter, ImportOptions, ImportOutcome};
use crate::observe::{
    severity_for_error, PipelineContext, PipelineObserver, PipelineSeverity, UploadStats,
};
use crate::registry::{DatasetRecord, DatasetRegistry, DatasetSummary};
use crate::sanitize::sanitize_identifier;
use crate::types::Row;

/// What an upload produced: the persisted record, the bounded preview, and
/// an optional warning when decoding ended early after some rows.
#[derive(Debug)]
pub struct UploadResult {
    /// The registered dataset record, census included.
    pub record: DatasetRecord,
    /// The first `preview_limit` rows, verbatim.
    pub preview: Vec<Row>,
    /// Decode error detail when the stream ended early; the census covers
    /// the rows that did decode.
    pub warning: Option<String>,
}

/// Liveness probe payload.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Always `"ok"` when the service can answer at all.
    pub status: &'static str,
    /// RFC 3339 probe timestamp.
    pub timestamp: String,
}

/// The tabular-data ingestion service.
pub struct IngestService {
    config: ServiceConfig,
    registry: DatasetRegistry,
    imports_in_flight: Arc<Mutex<HashSet<String>>>,
    observer: Option<Arc<dyn PipelineObserver>>,
    alert_at_or_above: PipelineSeverity,
}

impl IngestService {
    /// Create a service backed by the registry database named in `config`.
    pub fn new(config: ServiceConfig) -> PipelineResult<Self> {
        let registry = DatasetRegistry::open(&config.db_path)?;
        Ok(Self::with_registry(config, registry))
    }

    /// Create a service over an already-open registry. Useful for tests
    /// running against an in-memory database.
    pub fn with_registry(config: ServiceConfig, registry: DatasetRegistry) -> Self {
        Self {
            config,
            registry,
            imports_in_flight: Arc::new(Mutex::new(HashSet::new())),
            observer: None,
            alert_at_or_above: PipelineSeverity::Critical,
        }
    }

    /// Attach an observer for pipeline outcomes.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Severity threshold at which failures also trigger `on_alert`.
    pub fn with_alert_threshold(mut self, severity: PipelineSeverity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    /// Service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Accept an uploaded file: persist the bytes, register the dataset,
    /// and run the single census/preview pass.
    ///
    /// Rejects unsupported extensions and oversized payloads before any
    /// byte of content is read. A decode failure before the first row fails
    /// the call; a failure after some rows downgrades to a partial result
    /// carried in [`UploadResult::warning`].
    pub fn upload(&self, file_name: &str, bytes: &[u8]) -> PipelineResult<UploadResult> {
        let format = SourceFormat::from_path(Path::new(file_name))?;
        let size_bytes = bytes.len() as u64;
        if size_bytes > self.config.max_upload_bytes {
            return Err(PipelineError::UploadTooLarge {
                size_bytes,
                limit_bytes: self.config.max_upload_bytes,
            });
        }

        fs::create_dir_all(&self.config.data_dir)?;
        let ext = Path::new(file_name)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let source_path = self
            .config
            .data_dir
            .join(format!("{}.{ext}", Uuid::new_v4().simple()));
        fs::write(&source_path, bytes)?;

        let id = self.registry.create(file_name, &source_path, size_bytes)?;
        let ctx = PipelineContext {
            dataset_id: Some(id.clone()),
            source: source_path.clone(),
            format,
        };

        let reader = match RowReader::open(&source_path, format) {
            Ok(reader) => reader,
            Err(e) => return Err(self.report_failure(&ctx, e)),
        };
        let mut scan = scan_stream(reader, self.config.preview_limit);

        // A stream that died before yielding anything is a request failure,
        // not a zero-row dataset.
        let decode_error = match scan.decode_error.take() {
            Some(e) if scan.row_count == 0 => return Err(self.report_failure(&ctx, e)),
            other => other,
        };

        self.registry
            .record_census(&id, &scan.columns, scan.row_count as u64)?;

        if let Some(obs) = &self.observer {
            obs.on_upload_success(
                &ctx,
                UploadStats {
                    rows: scan.row_count,
                    preview_rows: scan.preview.len(),
                },
            );
        }
        let warning = decode_error.map(|e| self.report_failure(&ctx, e).to_string());

        let record = self.registry.get(&id)?;
        Ok(UploadResult {
            record,
            preview: scan.preview,
            warning,
        })
    }

    /// Dataset summaries, most recent first.
    pub fn list(&self) -> PipelineResult<Vec<DatasetSummary>> {
        self.registry.list()
    }

    /// Metadata-only summary of one dataset; no source re-read.
    pub fn summary(&self, id: &str) -> PipelineResult<DatasetRecord> {
        self.registry.get(id)
    }

    /// Re-derive a preview of up to `limit` rows from the stored source.
    ///
    /// Unlike the upload-time preview this reads the source again, so the
    /// caller may ask for more rows than the original preview held.
    pub fn preview(&self, id: &str, limit: Option<usize>) -> PipelineResult<Vec<Row>> {
        let record = self.registry.get(id)?;
        let reader = RowReader::open_auto(&record.source_path)?;
        preview_rows(reader, limit.unwrap_or(self.config.preview_limit))
    }

    /// Project the full dataset into a destination table in transactional
    /// batches.
    ///
    /// At most one import per destination table name may be in flight;
    /// a concurrent request for the same table fails with
    /// [`PipelineError::ImportInProgress`].
    pub fn import(&self, id: &str, options: &ImportOptions) -> PipelineResult<ImportOutcome> {
        let record = self.registry.get(id)?;

        let raw_table = options
            .table_name
            .clone()
            .unwrap_or_else(|| format!("ds_{}", record.id));
        let table = sanitize_identifier(&raw_table);
        let _guard = ImportGuard::acquire(&self.imports_in_flight, &table)?;

        // A zero batch size is treated as one row per transaction.
        let batch_size = options.batch_size.unwrap_or(self.config.batch_size).max(1);
        let importer = BatchImporter::new(self.registry.connection(), batch_size);
        let outcome = importer.run(&record, &table)?;

        if let Some(obs) = &self.observer {
            let ctx = PipelineContext {
                dataset_id: Some(record.id.clone()),
                source: record.source_path.clone(),
                format: SourceFormat::from_path(&record.source_path)?,
            };
            obs.on_import_finished(&ctx, &outcome);
        }
        Ok(outcome)
    }

    /// Liveness probe.
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok",
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    fn report_failure(&self, ctx: &PipelineContext, error: PipelineError) -> PipelineError {
        if let Some(obs) = &self.observer {
            let severity = severity_for_error(&error);
            obs.on_failure(ctx, severity, &error);
            if severity >= self.alert_at_or_above {
                obs.on_alert(ctx, severity, &error);
            }
        }
        error
    }
}

/// Holds a destination table name in the in-flight set; released on drop so
/// the batch boundary of a finished (or abandoned) import frees the name.
struct ImportGuard {
    tables: Arc<Mutex<HashSet<String>>>,
    table: String,
}

impl ImportGuard {
    fn acquire(
        tables: &Arc<Mutex<HashSet<String>>>,
        table: &str,
    ) -> PipelineResult<Self> {
        let mut set = tables.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(table.to_string()) {
            return Err(PipelineError::ImportInProgress {
                table: table.to_string(),
            });
        }
        Ok(Self {
            tables: Arc::clone(tables),
            table: table.to_string(),
        })
    }
}

impl Drop for ImportGuard {
    fn drop(&mut self) {
        let mut set = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        set.remove(&self.table);
    }
}
