//! Observer hooks for pipeline outcomes.
//!
//! The service reports upload and import results to an optional
//! [`PipelineObserver`]; implementors can record metrics, logs, or trigger
//! alerts above a severity threshold.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::decode::SourceFormat;
use crate::error::PipelineError;
use crate::import::ImportOutcome;

/// Severity classification used for observer callbacks and alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

/// Classify an error for observer reporting.
pub fn severity_for_error(e: &PipelineError) -> PipelineSeverity {
    match e {
        PipelineError::Io(_) => PipelineSeverity::Critical,
        _ => PipelineSeverity::Error,
    }
}

/// Context about the operation being observed.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Dataset id, once one exists.
    pub dataset_id: Option<String>,
    /// The stored byte source.
    pub source: PathBuf,
    /// Format used to decode the source.
    pub format: SourceFormat,
}

/// Stats reported on a successful upload scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadStats {
    /// Full-stream row count.
    pub rows: usize,
    /// Rows retained in the preview.
    pub preview_rows: usize,
}

/// Observer interface for pipeline outcomes.
pub trait PipelineObserver: Send + Sync {
    /// Called when an upload scan succeeds.
    fn on_upload_success(&self, _ctx: &PipelineContext, _stats: UploadStats) {}

    /// Called when an import finishes, whatever its terminal status.
    fn on_import_finished(&self, _ctx: &PipelineContext, _outcome: &ImportOutcome) {}

    /// Called when an operation fails.
    fn on_failure(&self, _ctx: &PipelineContext, _severity: PipelineSeverity, _error: &PipelineError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &PipelineContext, severity: PipelineSeverity, error: &PipelineError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_upload_success(&self, ctx: &PipelineContext, stats: UploadStats) {
        for o in &self.observers {
            o.on_upload_success(ctx, stats);
        }
    }

    fn on_import_finished(&self, ctx: &PipelineContext, outcome: &ImportOutcome) {
        for o in &self.observers {
            o.on_import_finished(ctx, outcome);
        }
    }

    fn on_failure(&self, ctx: &PipelineContext, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &PipelineContext, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs pipeline events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl PipelineObserver for StdErrObserver {
    fn on_upload_success(&self, ctx: &PipelineContext, stats: UploadStats) {
        eprintln!(
            "[pipeline][ok] format={} source={} rows={} preview={}",
            ctx.format,
            ctx.source.display(),
            stats.rows,
            stats.preview_rows
        );
    }

    fn on_import_finished(&self, ctx: &PipelineContext, outcome: &ImportOutcome) {
        eprintln!(
            "[pipeline][import] source={} table={} inserted={} failed_batches={} status={:?}",
            ctx.source.display(),
            outcome.table,
            outcome.rows_inserted,
            outcome.failed_batches,
            outcome.status
        );
    }

    fn on_failure(&self, ctx: &PipelineContext, severity: PipelineSeverity, error: &PipelineError) {
        eprintln!(
            "[pipeline][{:?}] format={} source={} err={}",
            severity,
            ctx.format,
            ctx.source.display(),
            error
        );
    }

    fn on_alert(&self, ctx: &PipelineContext, severity: PipelineSeverity, error: &PipelineError) {
        eprintln!(
            "[ALERT][pipeline][{:?}] format={} source={} err={}",
            severity,
            ctx.format,
            ctx.source.display(),
            error
        );
    }
}

/// Appends pipeline events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are
    /// ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_upload_success(&self, ctx: &PipelineContext, stats: UploadStats) {
        self.append_line(&format!(
            "{} ok format={} source={} rows={} preview={}",
            unix_ts(),
            ctx.format,
            ctx.source.display(),
            stats.rows,
            stats.preview_rows
        ));
    }

    fn on_import_finished(&self, ctx: &PipelineContext, outcome: &ImportOutcome) {
        self.append_line(&format!(
            "{} import source={} table={} inserted={} failed_batches={} status={:?}",
            unix_ts(),
            ctx.source.display(),
            outcome.table,
            outcome.rows_inserted,
            outcome.failed_batches,
            outcome.status
        ));
    }

    fn on_failure(&self, ctx: &PipelineContext, severity: PipelineSeverity, error: &PipelineError) {
        self.append_line(&format!(
            "{} fail severity={:?} format={} source={} err={}",
            unix_ts(),
            severity,
            ctx.format,
            ctx.source.display(),
            error
        ));
    }

    fn on_alert(&self, ctx: &PipelineContext, severity: PipelineSeverity, error: &PipelineError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} format={} source={} err={}",
            unix_ts(),
            severity,
            ctx.format,
            ctx.source.display(),
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
