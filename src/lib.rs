//! `csv-table-loader` loads a directory of delimited text files into a relational store, one
//! table per file, and can read those tables back out as CSV.
//!
//! The primary entrypoint is [`ingestion::run`], which discovers the files of a directory and
//! runs each one through:
//!
//! 1. **Naming**: the file stem is sanitized into a table name (`Brand Image.csv` → `brand_image`)
//! 2. **Detection**: a byte sample picks the first candidate encoding that decodes cleanly
//!    (`utf-8`, `utf-8-sig`, `cp1252` by default) and sniffs the delimiter (`,` `;` tab `|`)
//! 3. **Parsing**: a strict pass that rejects malformed rows, then a lenient pass that drops
//!    them, then the next candidate encoding
//! 4. **Sink**: the table is dropped and recreated in the [`sink::TableSink`], rows inserted in
//!    batches
//!
//! Per-file failures never stop a run; they are reported in the returned
//! [`ingestion::RunReport`]. Only configuration problems ([`ConfigError`]) abort before any file
//! is processed.
//!
//! ## Cell types
//!
//! Parsed files become a [`types::Table`] of typed [`types::Value`]s. One type is inferred per
//! column:
//!
//! - [`types::DataType::Int64`] when every non-empty cell is an integer
//! - [`types::DataType::Float64`] when every non-empty cell is a number
//! - [`types::DataType::Utf8`] otherwise
//!
//! Empty cells and common missing-value markers (`NA`, `NaN`, `NULL`, ...) become
//! [`types::Value::Null`].
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use csv_table_loader::ingestion::{run, LoadOptions, StdErrObserver};
//! use csv_table_loader::sink::SqliteSink;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sink = SqliteSink::open("sqlite://survey.db")?;
//! let options = LoadOptions {
//!     observer: Some(Arc::new(StdErrObserver)),
//!     ..Default::default()
//! };
//! let report = run("data/raw", &mut sink, &options)?;
//! for outcome in &report.outcomes {
//!     println!("{} -> {} rows", outcome.table, outcome.rows);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: naming, detection, parsing and the run driver
//! - [`sink`]: relational destinations (PostgreSQL, SQLite, in-memory)
//! - [`types`]: in-memory table types
//! - [`config`]: `.env` / environment configuration
//! - [`export`]: CSV output for tables read back from a sink
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod sink;
pub mod types;

pub use error::{ConfigError, IngestionError, IngestionResult, SinkError};
