//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`run`] (from [`driver`]) which:
//!
//! - discovers source files and maps each to a table name ([`naming`])
//! - detects encoding and delimiter from a sample ([`dialect`])
//! - parses with a strict → lenient fallback ([`csv`])
//! - writes each table to a [`crate::sink::TableSink`]
//! - optionally reports progress/failures/alerts to an [`IngestionObserver`]

pub mod csv;
pub mod dialect;
pub mod driver;
pub mod naming;
pub mod observability;

pub use self::csv::{parse, parse_with_fallback, ParseTier, ParsedTable};
pub use dialect::{detect, Delimiter, Detection, TextEncoding};
pub use driver::{
    discover_source_files, ingest_file, run, IngestionOutcome, LoadOptions, OutcomeStatus, RunReport,
};
pub use naming::{sanitize, table_name_for};
pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    StdErrObserver,
};
