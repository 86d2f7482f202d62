use std::path::Path;
use std::sync::{Arc, Mutex};

use csv_table_loader::ingestion::dialect::TextEncoding;
use csv_table_loader::ingestion::{
    ingest_file, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, LoadOptions,
};
use csv_table_loader::sink::MemorySink;
use csv_table_loader::IngestionError;

#[derive(Default)]
struct RecordingObserver {
    starts: Mutex<Vec<String>>,
    successes: Mutex<Vec<IngestionStats>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_start(&self, ctx: &IngestionContext) {
        self.starts.lock().unwrap().push(ctx.table.clone());
    }

    fn on_success(&self, _ctx: &IngestionContext, stats: IngestionStats) {
        self.successes.lock().unwrap().push(stats);
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn options_with(obs: &Arc<RecordingObserver>) -> LoadOptions {
    LoadOptions {
        observer: Some(obs.clone()),
        alert_at_or_above: IngestionSeverity::Critical,
        ..Default::default()
    }
}

#[test]
fn observer_receives_failure_and_alert_on_critical_io_error() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = options_with(&obs);
    let mut sink = MemorySink::new();

    // Missing file -> Io error -> Critical
    let outcome = ingest_file(Path::new("tests/fixtures/does_not_exist.csv"), "does_not_exist", &mut sink, &opts);
    assert!(!outcome.is_success());

    assert_eq!(obs.starts.lock().unwrap().clone(), vec!["does_not_exist"]);
    assert_eq!(obs.failures.lock().unwrap().clone(), vec![IngestionSeverity::Critical]);
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![IngestionSeverity::Critical]);
}

#[test]
fn observer_receives_failure_without_alert_for_non_critical_error() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = LoadOptions {
        encodings: vec![TextEncoding::UTF8],
        ..options_with(&obs)
    };
    let mut sink = MemorySink::new();

    // No candidate decodes -> Error severity (not Critical) -> should not alert
    let outcome = ingest_file(Path::new("tests/fixtures/cp1252_cafes.csv"), "cp1252_cafes", &mut sink, &opts);
    assert!(outcome.error.as_deref().unwrap().contains("no encoding succeeded"));

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![IngestionSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
    assert!(sink.table("cp1252_cafes").is_none());
}

#[test]
fn lower_alert_threshold_alerts_on_errors() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = LoadOptions {
        encodings: vec![TextEncoding::UTF8],
        alert_at_or_above: IngestionSeverity::Error,
        ..options_with(&obs)
    };
    let mut sink = MemorySink::new();

    ingest_file(Path::new("tests/fixtures/cp1252_cafes.csv"), "cp1252_cafes", &mut sink, &opts);
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![IngestionSeverity::Error]);
}

#[test]
fn observer_receives_success_stats() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = options_with(&obs);
    let mut sink = MemorySink::new();

    let outcome = ingest_file(Path::new("tests/fixtures/people.csv"), "people", &mut sink, &opts);
    assert!(outcome.is_success());
    assert_eq!(outcome.encoding.as_deref(), Some("utf-8"));

    assert_eq!(
        obs.successes.lock().unwrap().clone(),
        vec![IngestionStats {
            rows: 3,
            dropped_rows: 0
        }]
    );
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn file_observer_appends_event_lines() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ingest.log");
    let opts = LoadOptions {
        observer: Some(Arc::new(csv_table_loader::ingestion::FileObserver::new(&log))),
        ..Default::default()
    };
    let mut sink = MemorySink::new();

    ingest_file(Path::new("tests/fixtures/people.csv"), "people", &mut sink, &opts);
    ingest_file(Path::new("tests/fixtures/does_not_exist.csv"), "missing", &mut sink, &opts);

    let text = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    // success, failure, then the alert for the critical failure
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains(" ok table=people"));
    assert!(lines[0].contains("rows=3"));
    assert!(lines[1].contains(" fail severity=Critical table=missing"));
    assert!(lines[2].contains(" ALERT severity=Critical table=missing"));
}
