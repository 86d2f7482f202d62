//! Directory-level ingestion driver.
//!
//! Most callers should use [`run`], which:
//!
//! - discovers the source files of a directory (sorted, so runs are deterministic)
//! - maps each file to a table name via [`super::naming::table_name_for`]
//! - runs detect → parse → sink write per file, recording one [`IngestionOutcome`] each
//! - optionally reports progress/failures/alerts to an [`IngestionObserver`]
//!
//! Only configuration problems abort a run; every per-file error becomes a failed outcome.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::MatchOptions;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ConfigError, IngestionError, IngestionResult};
use crate::sink::{TableSink, DEFAULT_BATCH_SIZE};

use super::csv::{parse_with_fallback, ParseTier, ParsedTable};
use super::dialect::{detect, TextEncoding, DEFAULT_SAMPLE_BYTES};
use super::naming::table_name_for;
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};

/// Default source file extension.
pub const DEFAULT_EXTENSION: &str = "csv";

/// Options controlling a load run.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct LoadOptions {
    /// Candidate encodings, tried in order.
    pub encodings: Vec<TextEncoding>,
    /// Bytes sampled for encoding/delimiter detection.
    pub sample_bytes: usize,
    /// Rows per sink insert batch.
    pub batch_size: usize,
    /// Source file extension (matched case-insensitively, without the dot).
    pub extension: String,
    /// Optional observer for progress logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("encodings", &self.encodings)
            .field("sample_bytes", &self.sample_bytes)
            .field("batch_size", &self.batch_size)
            .field("extension", &self.extension)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            encodings: TextEncoding::default_candidates(),
            sample_bytes: DEFAULT_SAMPLE_BYTES,
            batch_size: DEFAULT_BATCH_SIZE,
            extension: DEFAULT_EXTENSION.to_string(),
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

impl LoadOptions {
    fn notify(&self, f: impl FnOnce(&dyn IngestionObserver)) {
        if let Some(obs) = self.observer.as_deref() {
            f(obs);
        }
    }
}

/// Terminal state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// What happened to one source file during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionOutcome {
    /// Source file path.
    pub source: PathBuf,
    /// Target table name.
    pub table: String,
    /// Rows written to the sink (0 on failure).
    pub rows: usize,
    /// Malformed rows skipped by the lenient parse tier.
    pub dropped_rows: usize,
    pub status: OutcomeStatus,
    /// Error detail when `status` is [`OutcomeStatus::Failure`].
    pub error: Option<String>,
    /// Encoding the file was decoded with, when parsing succeeded.
    pub encoding: Option<String>,
    /// Parse tier that produced the table, when parsing succeeded.
    pub tier: Option<ParseTier>,
}

impl IngestionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// All outcomes of a run, in processing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Description of the sink the run wrote to.
    pub sink: String,
    pub outcomes: Vec<IngestionOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Rows written across all successful files.
    pub fn total_rows(&self) -> usize {
        self.outcomes.iter().map(|o| o.rows).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Outcome for table `name` (the last one, when names collided).
    pub fn outcome_for(&self, table: &str) -> Option<&IngestionOutcome> {
        self.outcomes.iter().rev().find(|o| o.table == table)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{}/{} files loaded, {} rows ({})",
            self.succeeded(),
            self.outcomes.len(),
            self.total_rows(),
            self.sink
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for o in &self.outcomes {
            match (&o.status, &o.error) {
                (OutcomeStatus::Success, _) if o.dropped_rows > 0 => writeln!(
                    f,
                    "ok     {}: {} rows ({} malformed rows dropped)",
                    o.table, o.rows, o.dropped_rows
                )?,
                (OutcomeStatus::Success, _) => writeln!(f, "ok     {}: {} rows", o.table, o.rows)?,
                (OutcomeStatus::Failure, err) => writeln!(
                    f,
                    "FAILED {}: {}",
                    o.table,
                    err.as_deref().unwrap_or("unknown error")
                )?,
            }
        }
        write!(f, "{}", self.summary_line())
    }
}

/// List the files in `dir` with the given extension, sorted by path.
///
/// Hidden files are skipped. An empty result is a configuration error.
pub fn discover_source_files(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ConfigError::SourceDirMissing(dir.to_path_buf()));
    }

    let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut files = Vec::new();
    for entry in glob::glob_with(&pattern, options)? {
        match entry {
            Ok(path) if path.is_file() && has_extension(&path, extension) => files.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable directory entry"),
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(ConfigError::NoSourceFiles {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Load every source file in `source_dir` into `sink`.
///
/// Fails only for configuration problems (missing directory, no matching files, zero batch
/// size); per-file failures are recorded in the returned report and the run continues.
///
/// # Example
///
/// ```no_run
/// use csv_table_loader::ingestion::{run, LoadOptions};
/// use csv_table_loader::sink::SqliteSink;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut sink = SqliteSink::open("sqlite://survey.db")?;
/// let report = run("data/raw", &mut sink, &LoadOptions::default())?;
/// println!("{report}");
/// # Ok(())
/// # }
/// ```
pub fn run(
    source_dir: impl AsRef<Path>,
    sink: &mut dyn TableSink,
    options: &LoadOptions,
) -> Result<RunReport, ConfigError> {
    if options.batch_size == 0 {
        return Err(ConfigError::InvalidValue {
            key: "batch_size".to_string(),
            value: "0".to_string(),
            message: "must be > 0".to_string(),
        });
    }
    let files = discover_source_files(source_dir.as_ref(), &options.extension)?;
    info!(files = files.len(), sink = %sink.describe(), "starting load");

    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    let mut outcomes = Vec::with_capacity(files.len());
    for path in &files {
        let table = table_name_for(path);
        if let Some(previous) = claimed.insert(table.clone(), path.clone()) {
            let message = format!(
                "table name '{table}' also produced by {}; this file replaces it",
                previous.display()
            );
            warn!(path = %path.display(), %message, "table name collision");
            let ctx = IngestionContext {
                path: path.clone(),
                table: table.clone(),
            };
            options.notify(|obs| obs.on_warning(&ctx, &message));
        }
        outcomes.push(ingest_file(path, &table, sink, options));
    }

    let report = RunReport {
        sink: sink.describe(),
        outcomes,
    };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        rows = report.total_rows(),
        "load finished"
    );
    Ok(report)
}

/// Load a single file into table `table`, converting any error into a failed outcome.
pub fn ingest_file(
    path: &Path,
    table: &str,
    sink: &mut dyn TableSink,
    options: &LoadOptions,
) -> IngestionOutcome {
    let ctx = IngestionContext {
        path: path.to_path_buf(),
        table: table.to_string(),
    };
    options.notify(|obs| obs.on_start(&ctx));

    match load_file(path, table, sink, options) {
        Ok((parsed, rows)) => {
            if parsed.dropped_rows > 0 {
                let message = format!(
                    "read with encoding={} skipping {} malformed rows",
                    parsed.encoding, parsed.dropped_rows
                );
                options.notify(|obs| obs.on_warning(&ctx, &message));
            }
            options.notify(|obs| {
                obs.on_success(
                    &ctx,
                    IngestionStats {
                        rows,
                        dropped_rows: parsed.dropped_rows,
                    },
                )
            });
            IngestionOutcome {
                source: ctx.path,
                table: ctx.table,
                rows,
                dropped_rows: parsed.dropped_rows,
                status: OutcomeStatus::Success,
                error: None,
                encoding: Some(parsed.encoding.label()),
                tier: Some(parsed.tier),
            }
        }
        Err(e) => {
            let severity = IngestionSeverity::for_error(&e);
            warn!(path = %path.display(), error = %e, "file failed");
            options.notify(|obs| {
                obs.on_failure(&ctx, severity, &e);
                if severity >= options.alert_at_or_above {
                    obs.on_alert(&ctx, severity, &e);
                }
            });
            IngestionOutcome {
                source: ctx.path,
                table: ctx.table,
                rows: 0,
                dropped_rows: 0,
                status: OutcomeStatus::Failure,
                error: Some(e.to_string()),
                encoding: None,
                tier: None,
            }
        }
    }
}

fn load_file(
    path: &Path,
    table: &str,
    sink: &mut dyn TableSink,
    options: &LoadOptions,
) -> IngestionResult<(ParsedTable, usize)> {
    let detection = detect(path, &options.encodings, options.sample_bytes)?;
    let parsed = parse_with_fallback(path, detection, &options.encodings)?;
    let rows = sink
        .replace_table(table, &parsed.table, options.batch_size)
        .map_err(IngestionError::from)?;
    Ok((parsed, rows))
}
