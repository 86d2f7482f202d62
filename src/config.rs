//! Loader configuration from `.env` files and the process environment.
//!
//! Lookup order for `.env`: `<base>/config/.env`, then `<base>/.env`; the first file that exists
//! is loaded and never overrides variables already set in the environment.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `PGHOST` | PostgreSQL host | `127.0.0.1` |
//! | `PGPORT` | port, used only when all digits | driver default |
//! | `PGDATABASE`, `PGUSER`, `PGPASSWORD` | required unless `DATABASE_URL` is a SQLite URL | |
//! | `DATABASE_URL` | `sqlite:...` selects a SQLite sink | |
//! | `LOADER_SCHEMA` | target schema | `public` |
//! | `LOADER_BATCH_SIZE` | rows per insert batch | `50000` |
//! | `LOADER_SAMPLE_BYTES` | detection sample size | `32768` |
//! | `LOADER_ENCODINGS` | comma-separated encoding labels | `utf-8,utf-8-sig,cp1252` |

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::ingestion::dialect::{TextEncoding, DEFAULT_SAMPLE_BYTES};
use crate::ingestion::LoadOptions;
use crate::sink::{PgSettings, PostgresSink, SqliteSink, TableSink, DEFAULT_BATCH_SIZE};

pub const DEFAULT_PGHOST: &str = "127.0.0.1";
pub const DEFAULT_SCHEMA: &str = "public";

/// Where tables are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    Postgres(PgSettings),
    Sqlite(String),
}

/// Fully resolved loader configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub sink: SinkTarget,
    pub schema: String,
    pub batch_size: usize,
    pub sample_bytes: usize,
    pub encodings: Vec<TextEncoding>,
}

impl LoaderConfig {
    /// Load `.env` below `base_dir` (if any), then resolve from the process environment.
    pub fn load(base_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if let Some(path) = load_dotenv(base_dir.as_ref()) {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let sink = match get("DATABASE_URL").filter(|url| url.starts_with("sqlite:")) {
            Some(url) => SinkTarget::Sqlite(url),
            None => SinkTarget::Postgres(pg_settings(&get)?),
        };

        let encodings = match get("LOADER_ENCODINGS") {
            Some(labels) => TextEncoding::parse_list(&labels)?,
            None => TextEncoding::default_candidates(),
        };
        if encodings.is_empty() {
            return Err(invalid("LOADER_ENCODINGS", "", "at least one encoding is required"));
        }

        Ok(Self {
            sink,
            schema: get("LOADER_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            batch_size: positive(&get, "LOADER_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            sample_bytes: positive(&get, "LOADER_SAMPLE_BYTES", DEFAULT_SAMPLE_BYTES)?,
            encodings,
        })
    }

    /// Load options for the driver; the observer is left for the caller to attach.
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            encodings: self.encodings.clone(),
            sample_bytes: self.sample_bytes,
            batch_size: self.batch_size,
            ..LoadOptions::default()
        }
    }

    /// Open the configured sink. The connection is reused for the whole run.
    pub fn open_sink(&self) -> Result<Box<dyn TableSink>, ConfigError> {
        let sink: Box<dyn TableSink> = match &self.sink {
            SinkTarget::Postgres(settings) => Box::new(PostgresSink::connect(settings, self.schema.clone())?),
            SinkTarget::Sqlite(url) => Box::new(SqliteSink::open(url)?),
        };
        Ok(sink)
    }
}

/// Load the first `.env` found in `<base>/config/.env` or `<base>/.env`.
pub fn load_dotenv(base_dir: &Path) -> Option<PathBuf> {
    [base_dir.join("config").join(".env"), base_dir.join(".env")]
        .into_iter()
        .find(|p| p.is_file())
        .filter(|p| dotenvy::from_path(p).is_ok())
}

fn pg_settings(get: &impl Fn(&str) -> Option<String>) -> Result<PgSettings, ConfigError> {
    let database = get("PGDATABASE");
    let user = get("PGUSER");
    let password = get("PGPASSWORD");

    let missing: Vec<String> = [("PGDATABASE", &database), ("PGUSER", &user), ("PGPASSWORD", &password)]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| k.to_string())
        .collect();
    let (Some(database), Some(user), Some(password)) = (database, user, password) else {
        return Err(ConfigError::MissingEnv(missing));
    };

    Ok(PgSettings {
        host: get("PGHOST").unwrap_or_else(|| DEFAULT_PGHOST.to_string()),
        port: get("PGPORT")
            .filter(|p| p.chars().all(|c| c.is_ascii_digit()))
            .and_then(|p| p.parse().ok()),
        database,
        user,
        password,
    })
}

fn positive(get: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> Result<usize, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            Ok(_) => Err(invalid(key, &raw, "must be > 0")),
            Err(e) => Err(invalid(key, &raw, &e.to_string())),
        },
    }
}

fn invalid(key: &str, value: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn all_missing_credentials_are_listed() {
        let err = LoaderConfig::from_lookup(lookup(&[("PGUSER", "postgres"), ("PGPASSWORD", "")])).unwrap_err();
        match err {
            ConfigError::MissingEnv(keys) => assert_eq!(keys, vec!["PGDATABASE", "PGPASSWORD"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn postgres_defaults_and_port_rules() {
        let cfg = LoaderConfig::from_lookup(lookup(&[
            ("PGDATABASE", "highlands"),
            ("PGUSER", "postgres"),
            ("PGPASSWORD", "secret"),
            ("PGPORT", "54x2"),
        ]))
        .unwrap();
        let SinkTarget::Postgres(pg) = &cfg.sink else {
            panic!("expected postgres target");
        };
        assert_eq!(pg.host, "127.0.0.1");
        assert_eq!(pg.port, None);
        assert_eq!(cfg.schema, "public");
        assert_eq!(cfg.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.encodings, TextEncoding::default_candidates());

        let cfg = LoaderConfig::from_lookup(lookup(&[
            ("PGDATABASE", "highlands"),
            ("PGUSER", "postgres"),
            ("PGPASSWORD", "secret"),
            ("PGPORT", "5433"),
        ]))
        .unwrap();
        let SinkTarget::Postgres(pg) = &cfg.sink else {
            panic!("expected postgres target");
        };
        assert_eq!(pg.port, Some(5433));
    }

    #[test]
    fn sqlite_url_skips_credential_check() {
        let cfg = LoaderConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("LOADER_BATCH_SIZE", "10"),
            ("LOADER_ENCODINGS", "utf-8, latin1"),
        ]))
        .unwrap();
        assert_eq!(cfg.sink, SinkTarget::Sqlite("sqlite::memory:".into()));
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.encodings, vec![TextEncoding::UTF8, TextEncoding::WINDOWS_1252]);
    }

    #[test]
    fn bad_values_are_rejected() {
        let base = [("DATABASE_URL", "sqlite::memory:")];
        let with = |k: &'static str, v: &'static str| {
            let mut pairs = base.to_vec();
            pairs.push((k, v));
            LoaderConfig::from_lookup(lookup(&pairs))
        };
        assert!(matches!(with("LOADER_BATCH_SIZE", "0"), Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(with("LOADER_SAMPLE_BYTES", "lots"), Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(with("LOADER_ENCODINGS", "ebcdic-ish"), Err(ConfigError::UnknownEncoding(_))));
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let pg = PgSettings {
            host: "db".into(),
            port: None,
            database: "highlands".into(),
            user: "postgres".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{pg:?}").contains("hunter2"));
    }
}
