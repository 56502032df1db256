//! `dataset-ingest` is the tabular-data ingestion pipeline behind a
//! data-analytics workbench: it accepts uploaded files of unknown size in
//! several row-oriented formats, produces a bounded preview and a
//! row/column census without ever buffering the whole file, and can later
//! materialize the full dataset into a SQLite table using a dynamically
//! inferred, sanitized schema written in transactional batches.
//!
//! ## Supported formats (auto-detected by extension)
//!
//! - **Delimited text**: `.csv`, `.tsv`
//! - **JSON**: `.json` (a single top-level array of objects, parsed
//!   incrementally) and `.ndjson` (newline-delimited objects)
//! - **Workbooks**: `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods` (first sheet)
//!
//! ## Quick example: upload + import
//!
//! ```no_run
//! use std::fs;
//!
//! use dataset_ingest::config::ServiceConfig;
//! use dataset_ingest::import::ImportOptions;
//! use dataset_ingest::service::IngestService;
//!
//! # fn main() -> Result<(), dataset_ingest::PipelineError> {
//! let service = IngestService::new(ServiceConfig::default())?;
//!
//! // Single pass: persists the source, registers the dataset, derives the
//! // column census and a bounded preview.
//! let bytes = fs::read("people.csv")?;
//! let upload = service.upload("people.csv", &bytes)?;
//! println!(
//!     "dataset {} has {} rows",
//!     upload.record.id,
//!     upload.record.row_count.unwrap_or(0)
//! );
//!
//! // Separate request: project the full dataset into a table, in
//! // transactional batches.
//! let outcome = service.import(&upload.record.id, &ImportOptions::default())?;
//! println!("imported {} rows into {}", outcome.rows_inserted, outcome.table);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`decode`]: format decoders unified behind one lazy row stream
//! - [`census`]: single-pass column census, preview, and row counting
//! - [`sanitize`]: deterministic storage-identifier sanitization
//! - [`registry`]: SQLite-backed dataset metadata store
//! - [`import`]: batched, partial-failure-tolerant table importer
//! - [`service`]: the request-level service boundary
//! - [`api`]: transport-agnostic request/response DTOs
//! - [`observe`]: observer hooks for upload/import outcomes
//! - [`config`], [`error`], [`types`]: ambient support

pub mod api;
pub mod census;
pub mod config;
pub mod decode;
pub mod error;
pub mod import;
pub mod observe;
pub mod registry;
pub mod sanitize;
pub mod service;
pub mod types;

pub use error::{PipelineError, PipelineResult};
