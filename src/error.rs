use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type for per-file ingestion problems.
///
/// None of these abort a run: the driver turns each into a failed
/// [`crate::ingestion::IngestionOutcome`] and moves on to the next file.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader/writer error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// None of the candidate encodings could decode the file sample.
    #[error("no encoding succeeded (tried: {})", .tried.join(", "))]
    NoEncoding { tried: Vec<String> },

    /// Strict parsing hit a malformed record. Recovered locally by the lenient tier.
    #[error("strict parse failed: {reason}")]
    StrictParseFailed { reason: String },

    /// Neither the strict nor the lenient tier could parse the file under any candidate encoding.
    #[error("unparseable file {}: {reason}", .path.display())]
    UnparseableFile { path: PathBuf, reason: String },

    /// Writing the parsed table to the sink failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Error type returned by [`crate::sink::TableSink`] implementations.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Could not open the sink connection.
    #[error("failed to connect to sink: {0}")]
    Connect(#[source] sqlx::Error),

    /// Could not start the runtime that drives the database driver.
    #[error("failed to start sink runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// `batch_size` must be at least one row.
    #[error("invalid batch size {0}: must be > 0")]
    InvalidBatchSize(usize),

    /// The table has no columns, so no relational table can be created for it.
    #[error("table '{0}' has no columns")]
    NoColumns(String),

    /// A write failed part-way; the destination table is left in an undefined state.
    #[error("write to table '{table}' failed after {rows_written} rows: {source}")]
    WriteFailed {
        table: String,
        rows_written: usize,
        #[source]
        source: sqlx::Error,
    },

    /// Reading a table back from the sink failed.
    #[error("failed to read table '{table}': {source}")]
    Query {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// The requested table does not exist in the sink.
    #[error("table '{0}' does not exist")]
    TableNotFound(String),
}

/// Fatal configuration problems, detected before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variables are absent or empty.
    #[error("missing required env vars: {}. Set them in .env or the environment.", .0.join(", "))]
    MissingEnv(Vec<String>),

    /// The source directory does not exist or is not a directory.
    #[error("source directory not found: {}", .0.display())]
    SourceDirMissing(PathBuf),

    /// The source directory contains no matching files.
    #[error("no .{extension} files found in {}", .dir.display())]
    NoSourceFiles { dir: PathBuf, extension: String },

    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: '{value}' ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    /// An encoding label is not known.
    #[error("unknown encoding label '{0}'")]
    UnknownEncoding(String),

    /// The file-discovery pattern could not be built.
    #[error("invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The sink could not be opened.
    #[error(transparent)]
    Sink(#[from] SinkError),
}
