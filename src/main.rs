use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use csv_table_loader::config::{load_dotenv, LoaderConfig};
use csv_table_loader::export::write_csv_to_path;
use csv_table_loader::ingestion::{
    run, CompositeObserver, FileObserver, IngestionObserver, RunReport, StdErrObserver,
};
use csv_table_loader::sink::{MemorySink, TableSink};

#[derive(Parser)]
#[command(name = "csv-table-loader", version, about = "Load a directory of CSV files into database tables")]
struct Cli {
    /// Base directory for `.env` lookup and the default source directory
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every CSV file of a directory, one table per file
    Load {
        /// Directory holding the CSV files (default: <base-dir>/data/raw)
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// Rows per insert batch (overrides LOADER_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Write the run report as JSON to this file
        #[arg(long)]
        report_json: Option<PathBuf>,

        /// Append per-file events to this log file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Parse everything but keep the tables in memory instead of writing to a database
        #[arg(long)]
        dry_run: bool,
    },
    /// Read a loaded table back and write it as CSV
    Export {
        /// Table to read
        #[arg(long)]
        table: String,

        /// Output CSV file
        #[arg(long)]
        out: PathBuf,

        /// Only the first N rows
        #[arg(long)]
        limit: Option<usize>,
    },
}

const EXIT_FILE_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Load {
            source_dir,
            batch_size,
            report_json,
            log_file,
            dry_run,
        } => load(&cli.base_dir, source_dir, batch_size, report_json, log_file, dry_run),
        Command::Export { table, out, limit } => export(&cli.base_dir, &table, &out, limit),
    }
}

fn load(
    base_dir: &Path,
    source_dir: Option<PathBuf>,
    batch_size: Option<usize>,
    report_json: Option<PathBuf>,
    log_file: Option<PathBuf>,
    dry_run: bool,
) -> ExitCode {
    let config = if dry_run {
        // No database is opened, so credentials are not required.
        load_dotenv(base_dir);
        LoaderConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            _ => std::env::var(key).ok(),
        })
    } else {
        LoaderConfig::load(base_dir)
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => return config_failure(&e),
    };

    let mut options = config.load_options();
    if let Some(n) = batch_size {
        options.batch_size = n;
    }
    let mut observers: Vec<Arc<dyn IngestionObserver>> = vec![Arc::new(StdErrObserver)];
    if let Some(path) = log_file {
        observers.push(Arc::new(FileObserver::new(path)));
    }
    options.observer = Some(Arc::new(CompositeObserver::new(observers)));

    let mut sink: Box<dyn TableSink> = if dry_run {
        Box::new(MemorySink::new())
    } else {
        match config.open_sink() {
            Ok(s) => s,
            Err(e) => return config_failure(&e),
        }
    };

    let source_dir = source_dir.unwrap_or_else(|| base_dir.join("data").join("raw"));
    info!(source_dir = %source_dir.display(), dry_run, "loading");
    let report = match run(&source_dir, sink.as_mut(), &options) {
        Ok(r) => r,
        Err(e) => return config_failure(&e),
    };

    println!("{report}");
    if let Some(path) = report_json {
        if let Err(e) = write_report(&report, &path) {
            error!(path = %path.display(), error = %e, "could not write report");
        }
    }

    if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FILE_FAILED)
    }
}

fn write_report(report: &RunReport, path: &Path) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), report)?;
    Ok(())
}

fn export(base_dir: &Path, table: &str, out: &Path, limit: Option<usize>) -> ExitCode {
    let mut sink = match LoaderConfig::load(base_dir).and_then(|c| c.open_sink()) {
        Ok(s) => s,
        Err(e) => return config_failure(&e),
    };
    let data = match sink.read_table(table, limit) {
        Ok(t) => t,
        Err(e) => {
            error!(table, error = %e, "read failed");
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_FILE_FAILED);
        }
    };
    if let Err(e) = write_csv_to_path(&data, out) {
        eprintln!("error: {e}");
        return ExitCode::from(EXIT_FILE_FAILED);
    }
    println!("{} rows of {table} written to {}", data.row_count(), out.display());
    ExitCode::SUCCESS
}

fn config_failure(e: &dyn std::error::Error) -> ExitCode {
    error!(error = %e, "configuration error");
    eprintln!("error: {e}");
    ExitCode::from(EXIT_CONFIG)
}
