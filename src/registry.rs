//! Dataset registry: the durable metadata store keyed by dataset id.
//!
//! The registry is the single point of truth the other components query.
//! It owns one SQLite table of dataset records; the uploaded byte sources
//! live on disk and are referenced by path, never copied into the store.
//! Import destination tables share the same database (see
//! [`crate::import::BatchImporter`]), so the registry hands its connection
//! out via [`DatasetRegistry::connection`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::types::ColumnDescriptor;

const DATASETS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS datasets (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    source_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    row_count INTEGER,
    column_count INTEGER,
    columns_json TEXT,
    uploaded_at TEXT NOT NULL
);
"#;

/// One uploaded source and its census metadata.
///
/// Immutable after creation, except that `row_count`/`column_count`/
/// `columns` are populated once by [`DatasetRegistry::record_census`].
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    /// Opaque unique token, created at upload time.
    pub id: String,
    /// Original filename, display-only.
    pub name: String,
    /// Stable reference to the byte source; owned by the registry.
    pub source_path: PathBuf,
    /// Byte length of the source at upload time.
    pub size_bytes: u64,
    /// Full-stream row count, set once at first full scan.
    pub row_count: Option<u64>,
    /// Column count, set alongside `row_count`.
    pub column_count: Option<u64>,
    /// Ordered column census, first-seen order, never re-sorted.
    pub columns: Option<Vec<ColumnDescriptor>>,
    /// RFC 3339 upload timestamp, set once.
    pub uploaded_at: String,
}

/// Listing entry: the record without its column census.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub uploaded_at: String,
    pub row_count: Option<u64>,
    pub column_count: Option<u64>,
}

/// SQLite-backed dataset metadata store.
///
/// All operations are atomic with respect to each other: every access goes
/// through one shared connection, and multi-statement updates run in a
/// transaction.
pub struct DatasetRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl DatasetRegistry {
    /// Open (or create) the registry database at `path`.
    pub fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// Open an in-memory registry. Useful for tests.
    pub fn open_in_memory() -> PipelineResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> PipelineResult<Self> {
        conn.execute_batch(DATASETS_DDL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared handle to the underlying database, for components that write
    /// import tables next to the metadata table.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh dataset id and persist a new record.
    pub fn create(
        &self,
        name: &str,
        source_path: &Path,
        size_bytes: u64,
    ) -> PipelineResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        let uploaded_at = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO datasets (id, name, source_path, size_bytes, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                name,
                source_path.to_string_lossy().into_owned(),
                size_bytes as i64,
                uploaded_at
            ],
        )?;
        Ok(id)
    }

    /// Record the column census and full-stream row count for a dataset.
    ///
    /// Set-once: re-recording identical values is a no-op; re-recording
    /// different values is a [`PipelineError::RegistryConflict`]. This
    /// guards against double-counting when an import or scan is retried.
    pub fn record_census(
        &self,
        id: &str,
        columns: &[ColumnDescriptor],
        row_count: u64,
    ) -> PipelineResult<()> {
        let columns_json = serde_json::to_string(columns)?;
        let column_count = columns.len() as u64;

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let existing: Option<(Option<i64>, Option<String>)> = tx
            .query_row(
                "SELECT row_count, columns_json FROM datasets WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (existing_rows, existing_columns) = match existing {
            Some(v) => v,
            None => {
                return Err(PipelineError::NotFound { id: id.to_string() });
            }
        };

        if let Some(prev_rows) = existing_rows {
            let unchanged = prev_rows == row_count as i64
                && existing_columns.as_deref() == Some(columns_json.as_str());
            if unchanged {
                return Ok(());
            }
            return Err(PipelineError::RegistryConflict {
                id: id.to_string(),
                message: format!(
                    "census already recorded ({prev_rows} rows); refusing to overwrite with {row_count} rows"
                ),
            });
        }

        tx.execute(
            "UPDATE datasets SET row_count = ?2, column_count = ?3, columns_json = ?4 WHERE id = ?1",
            params![id, row_count as i64, column_count as i64, columns_json],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch a record by id.
    pub fn get(&self, id: &str) -> PipelineResult<DatasetRecord> {
        let conn = self.lock();
        let record = conn
            .query_row(
                "SELECT id, name, source_path, size_bytes, row_count, column_count, columns_json, uploaded_at
                 FROM datasets WHERE id = ?1",
                params![id],
                row_to_record,
            )
            .optional()?;
        record.ok_or_else(|| PipelineError::NotFound { id: id.to_string() })
    }

    /// List dataset summaries, most recent first.
    pub fn list(&self) -> PipelineResult<Vec<DatasetSummary>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, size_bytes, uploaded_at, row_count, column_count
             FROM datasets ORDER BY uploaded_at DESC, id",
        )?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(DatasetSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    size_bytes: row.get::<_, i64>(2)? as u64,
                    uploaded_at: row.get(3)?,
                    row_count: row.get::<_, Option<i64>>(4)?.map(|n| n as u64),
                    column_count: row.get::<_, Option<i64>>(5)?.map(|n| n as u64),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DatasetRecord> {
    let columns_json: Option<String> = row.get(6)?;
    let columns = match columns_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?),
        None => None,
    };
    Ok(DatasetRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        source_path: PathBuf::from(row.get::<_, String>(2)?),
        size_bytes: row.get::<_, i64>(3)? as u64,
        row_count: row.get::<_, Option<i64>>(4)?.map(|n| n as u64),
        column_count: row.get::<_, Option<i64>>(5)?.map(|n| n as u64),
        columns,
        uploaded_at: row.get(7)?,
    })
}
