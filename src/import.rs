//! Batch importer: projects a full dataset into a dynamically created
//! SQLite table using fixed-size transactional batches.
//!
//! Partial failure is a feature, not a bug: a batch that fails to commit is
//! rolled back alone and the import moves on to the next batch, so the
//! reported result states exactly how many rows were committed. Do not
//! "fix" this into an all-or-nothing transaction; the reported row counts
//! depend on it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use serde::Serialize;

use crate::decode::{RowReader, SourceFormat};
use crate::error::{PipelineError, PipelineResult};
use crate::registry::DatasetRecord;
use crate::sanitize::sanitize_columns;
use crate::types::{Row, Value};

/// Name of the synthetic auto-incrementing identifier column.
///
/// Sanitized column names never start with an underscore, so this cannot
/// collide with a destination column.
const ROW_ID_COLUMN: &str = "_row_id";

/// Caller-supplied knobs for one import request.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Destination table name; defaults to `ds_<dataset id>`.
    pub table_name: Option<String>,
    /// Rows per transaction; defaults to the service configuration.
    pub batch_size: Option<usize>,
}

/// Terminal status of one import invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportStatus {
    /// Decoding reached natural end-of-stream and every batch committed.
    Succeeded,
    /// At least some work committed, but a batch failed or decoding ended
    /// early on a fatal error.
    PartiallySucceeded,
    /// The destination table could not be created at all.
    Failed,
}

/// Progress of one import invocation through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportPhase {
    Idle,
    Reading,
    WritingBatch,
    Finalizing,
}

/// What one import call produced.
///
/// Even when decoding failed mid-stream, `rows_inserted` reports the work
/// already committed rather than discarding it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    /// Destination table name actually used.
    pub table: String,
    /// Rows committed across all successful batches.
    pub rows_inserted: u64,
    /// Batches that failed to commit and were rolled back.
    pub failed_batches: u64,
    /// Terminal status.
    pub status: ImportStatus,
    /// Decode or table-creation error detail, when any occurred.
    pub error: Option<String>,
}

/// Ephemeral state for one import invocation; never shared across requests.
struct ImportJob {
    table: String,
    phase: ImportPhase,
    rows_inserted: u64,
    failed_batches: u64,
    batch_error: Option<String>,
}

impl ImportJob {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            phase: ImportPhase::Idle,
            rows_inserted: 0,
            failed_batches: 0,
            batch_error: None,
        }
    }

    fn outcome(self, status: ImportStatus, error: Option<String>) -> ImportOutcome {
        ImportOutcome {
            table: self.table,
            rows_inserted: self.rows_inserted,
            failed_batches: self.failed_batches,
            status,
            error: error.or(self.batch_error),
        }
    }
}

/// Destination schema as data: source column names paired with their
/// sanitized destination identifiers, in census order.
struct ColumnPlan {
    source: Vec<String>,
    dest: Vec<String>,
}

impl ColumnPlan {
    fn new(source: Vec<String>) -> Self {
        let dest = sanitize_columns(&source);
        Self { source, dest }
    }

    fn from_row(row: &Row) -> Self {
        Self::new(row.column_names().map(str::to_string).collect())
    }

    fn create_table_sql(&self, table: &str) -> String {
        let mut columns = vec![format!(
            "\"{ROW_ID_COLUMN}\" INTEGER PRIMARY KEY AUTOINCREMENT"
        )];
        // Destination columns are declared without a type: SQLite then
        // accepts any scalar, which is exactly the permissive storage the
        // dynamic schema needs.
        columns.extend(self.dest.iter().map(|name| format!("\"{name}\"")));
        format!("CREATE TABLE \"{table}\" ({})", columns.join(", "))
    }

    fn insert_sql(&self, table: &str) -> String {
        let columns = self
            .dest
            .iter()
            .map(|name| format!("\"{name}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=self.dest.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO \"{table}\" ({columns}) VALUES ({placeholders})")
    }
}

/// Writes a dataset's full row stream into a destination table in
/// fixed-size transactional batches.
pub struct BatchImporter {
    conn: Arc<Mutex<Connection>>,
    batch_size: usize,
}

impl BatchImporter {
    /// Create an importer writing through the given connection.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size == 0`.
    pub fn new(conn: Arc<Mutex<Connection>>, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        Self { conn, batch_size }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-read the dataset's stored source and project every row into
    /// `table`.
    ///
    /// The column list prefers the census recorded on the record and falls
    /// back to the first row of this pass. The destination table is created
    /// lazily on the first row; batches are written in source order, each in
    /// its own transaction, and a failed batch rolls back alone.
    pub fn run(&self, record: &DatasetRecord, table: &str) -> PipelineResult<ImportOutcome> {
        let format = SourceFormat::from_path(&record.source_path)?;
        let mut job = ImportJob::new(table);

        let reader = match RowReader::open(&record.source_path, format) {
            Ok(reader) => reader,
            Err(e) => {
                // Source unreadable before any row: no table was created.
                return Ok(job.outcome(ImportStatus::Failed, Some(e.to_string())));
            }
        };

        let mut plan: Option<ColumnPlan> = record
            .columns
            .as_ref()
            .map(|cols| ColumnPlan::new(cols.iter().map(|c| c.name.clone()).collect()));
        let mut table_created = false;
        let mut buffer: Vec<Row> = Vec::with_capacity(self.batch_size);
        let mut decode_error: Option<PipelineError> = None;

        job.phase = ImportPhase::Reading;
        for item in reader {
            match item {
                Ok(row) => {
                    let plan = plan.get_or_insert_with(|| ColumnPlan::from_row(&row));
                    if !table_created {
                        if let Err(e) = self.create_table(plan, table) {
                            return Ok(job.outcome(ImportStatus::Failed, Some(e.to_string())));
                        }
                        table_created = true;
                    }
                    buffer.push(row);
                    if buffer.len() >= self.batch_size {
                        job.phase = ImportPhase::WritingBatch;
                        self.flush_batch(&mut job, plan, &mut buffer);
                        job.phase = ImportPhase::Reading;
                    }
                }
                Err(e) => {
                    decode_error = Some(e);
                    break;
                }
            }
        }

        job.phase = ImportPhase::Finalizing;
        if let Some(plan) = plan.as_ref() {
            if table_created {
                self.flush_batch(&mut job, plan, &mut buffer);
            }
        }

        let status = if !table_created {
            match decode_error {
                // Nothing to project: an empty source is a successful,
                // zero-row import with no table.
                None => ImportStatus::Succeeded,
                Some(_) => ImportStatus::Failed,
            }
        } else if decode_error.is_some() || job.failed_batches > 0 {
            ImportStatus::PartiallySucceeded
        } else {
            ImportStatus::Succeeded
        };

        Ok(job.outcome(status, decode_error.map(|e| e.to_string())))
    }

    fn create_table(&self, plan: &ColumnPlan, table: &str) -> Result<(), rusqlite::Error> {
        self.lock().execute(&plan.create_table_sql(table), [])?;
        Ok(())
    }

    /// Commit the buffered rows as one transaction; on failure the batch is
    /// rolled back, counted, and the buffer cleared so the import continues.
    fn flush_batch(&self, job: &mut ImportJob, plan: &ColumnPlan, buffer: &mut Vec<Row>) {
        debug_assert!(
            matches!(
                job.phase,
                ImportPhase::WritingBatch | ImportPhase::Finalizing
            ),
            "batches may only be written from the WritingBatch/Finalizing phases"
        );
        if buffer.is_empty() {
            return;
        }
        match self.write_batch(plan, &job.table, buffer) {
            Ok(written) => job.rows_inserted += written,
            Err(e) => {
                job.failed_batches += 1;
                if job.batch_error.is_none() {
                    job.batch_error = Some(e.to_string());
                }
            }
        }
        buffer.clear();
    }

    fn write_batch(
        &self,
        plan: &ColumnPlan,
        table: &str,
        rows: &[Row],
    ) -> Result<u64, rusqlite::Error> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&plan.insert_sql(table))?;
            for row in rows {
                let values = plan
                    .source
                    .iter()
                    .map(|name| bind_value(row.get(name)));
                stmt.execute(rusqlite::params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(rows.len() as u64)
    }
}

fn bind_value(value: Option<&Value>) -> rusqlite::types::Value {
    match value {
        None | Some(Value::Null) => rusqlite::types::Value::Null,
        Some(Value::Bool(b)) => rusqlite::types::Value::Integer(i64::from(*b)),
        Some(Value::Int(i)) => rusqlite::types::Value::Integer(*i),
        Some(Value::Float(f)) => rusqlite::types::Value::Real(*f),
        Some(Value::Text(s)) => rusqlite::types::Value::Text(s.clone()),
    }
}
