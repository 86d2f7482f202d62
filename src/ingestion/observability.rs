use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{IngestionError, SinkError};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the file failed).
    Error,
    /// Critical error (I/O or sink connectivity failures).
    Critical,
}

impl IngestionSeverity {
    /// Severity of a per-file error.
    pub fn for_error(e: &IngestionError) -> Self {
        match e {
            IngestionError::Io(_) => Self::Critical,
            IngestionError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            IngestionError::Sink(err) => match err {
                SinkError::Connect(_) | SinkError::Runtime(_) => Self::Critical,
                SinkError::WriteFailed { source, .. } | SinkError::Query { source, .. } => {
                    if is_connectivity_error(source) {
                        Self::Critical
                    } else {
                        Self::Error
                    }
                }
                _ => Self::Error,
            },
            IngestionError::NoEncoding { .. }
            | IngestionError::StrictParseFailed { .. }
            | IngestionError::UnparseableFile { .. } => Self::Error,
        }
    }
}

fn is_connectivity_error(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

/// Context about one file of an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// Source file path.
    pub path: PathBuf,
    /// Target table name.
    pub table: String,
}

/// Stats reported on successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Number of rows written to the sink.
    pub rows: usize,
    /// Malformed rows skipped while parsing.
    pub dropped_rows: usize,
}

/// Observer interface for per-file ingestion events.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called before a file is processed.
    fn on_start(&self, _ctx: &IngestionContext) {}

    /// Called when a file was loaded.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called for non-fatal problems (lenient parse, table name collisions).
    fn on_warning(&self, _ctx: &IngestionContext, _message: &str) {}

    /// Called when a file failed.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
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

impl IngestionObserver for CompositeObserver {
    fn on_start(&self, ctx: &IngestionContext) {
        for o in &self.observers {
            o.on_start(ctx);
        }
    }

    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_warning(&self, ctx: &IngestionContext, message: &str) {
        for o in &self.observers {
            o.on_warning(ctx, message);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Streams progress lines to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl IngestionObserver for StdErrObserver {
    fn on_start(&self, ctx: &IngestionContext) {
        eprintln!("Loading {} -> table {} ...", ctx.path.display(), ctx.table);
    }

    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        eprintln!("[ingest][ok] table={} rows={} dropped={}", ctx.table, stats.rows, stats.dropped_rows);
    }

    fn on_warning(&self, ctx: &IngestionContext, message: &str) {
        eprintln!("[ingest][warn] table={} path={} {message}", ctx.table, ctx.path.display());
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        eprintln!(
            "[ingest][{:?}] table={} path={} err={}",
            severity,
            ctx.table,
            ctx.path.display(),
            error
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        eprintln!(
            "[ALERT][ingest][{:?}] table={} path={} err={}",
            severity,
            ctx.table,
            ctx.path.display(),
            error
        );
    }
}

/// Appends ingestion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
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

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append_line(&format!(
            "{} ok table={} path={} rows={} dropped={}",
            unix_ts(),
            ctx.table,
            ctx.path.display(),
            stats.rows,
            stats.dropped_rows
        ));
    }

    fn on_warning(&self, ctx: &IngestionContext, message: &str) {
        self.append_line(&format!(
            "{} warn table={} path={} {message}",
            unix_ts(),
            ctx.table,
            ctx.path.display()
        ));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append_line(&format!(
            "{} fail severity={:?} table={} path={} err={}",
            unix_ts(),
            severity,
            ctx.table,
            ctx.path.display(),
            error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} table={} path={} err={}",
            unix_ts(),
            severity,
            ctx.table,
            ctx.path.display(),
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
