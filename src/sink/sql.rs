//! SQL statement text shared by the relational sinks.

use std::collections::HashSet;

use crate::types::{Column, DataType};

/// SQL flavour of a sink backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Upper bound on bind parameters in a single statement.
    pub fn max_bind_params(self) -> usize {
        match self {
            Self::Postgres => 65_535,
            Self::Sqlite => 32_766,
        }
    }

    pub fn column_type(self, data_type: DataType) -> &'static str {
        match (self, data_type) {
            (_, DataType::Int64) => "BIGINT",
            (Self::Postgres, DataType::Float64) => "DOUBLE PRECISION",
            (Self::Sqlite, DataType::Float64) => "REAL",
            (_, DataType::Utf8) => "TEXT",
        }
    }

    /// Longest identifier the backend keeps; PostgreSQL silently truncates past `NAMEDATALEN - 1`.
    fn max_identifier_bytes(self) -> Option<usize> {
        match self {
            Self::Postgres => Some(63),
            Self::Sqlite => None,
        }
    }

    /// Key under which the backend treats two column names as the same column.
    ///
    /// SQLite matches column names ASCII case-insensitively, even when quoted.
    fn identifier_key(self, name: &str) -> String {
        match self {
            Self::Postgres => name.to_owned(),
            Self::Sqlite => name.to_ascii_lowercase(),
        }
    }

    /// `name` cut so that `reserve` more bytes still fit in an identifier.
    fn fit_identifier(self, name: &str, reserve: usize) -> &str {
        match self.max_identifier_bytes() {
            Some(max) => truncate_bytes(name, max.saturating_sub(reserve)),
            None => name,
        }
    }

    fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::Sqlite => format!("?{n}"),
        }
    }

    /// Map a declared column type back onto a [`DataType`].
    pub fn data_type_for(self, declared: &str) -> DataType {
        let declared = declared.to_ascii_lowercase();
        if declared.contains("int") {
            DataType::Int64
        } else if ["double", "real", "float"].iter().any(|t| declared.contains(t)) {
            DataType::Float64
        } else {
            DataType::Utf8
        }
    }
}

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`, or just `"table"` without a schema.
pub fn qualified_name(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(table)),
        None => quote_ident(table),
    }
}

/// Column names as they will be created in the sink.
///
/// Blank names become `Unnamed: <index>` and names the backend would consider repeated get `.1`,
/// `.2`, ... suffixes, so every `CREATE TABLE` gets distinct columns. PostgreSQL names are cut to
/// 63 bytes first, and suffixed names are cut further so the suffix survives.
pub fn sink_column_names(dialect: Dialect, columns: &[Column]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(columns.len());
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let base = if col.name.trim().is_empty() {
                format!("Unnamed: {idx}")
            } else {
                col.name.clone()
            };
            let mut name = dialect.fit_identifier(&base, 0).to_owned();
            let mut suffix = 1;
            while !seen.insert(dialect.identifier_key(&name)) {
                let tail = format!(".{suffix}");
                name = format!("{}{tail}", dialect.fit_identifier(&base, tail.len()));
                suffix += 1;
            }
            name
        })
        .collect()
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub fn drop_table(qualified: &str) -> String {
    format!("DROP TABLE IF EXISTS {qualified}")
}

pub fn create_table(dialect: Dialect, qualified: &str, names: &[String], columns: &[Column]) -> String {
    let defs: Vec<String> = names
        .iter()
        .zip(columns)
        .map(|(name, col)| format!("{} {}", quote_ident(name), dialect.column_type(col.data_type)))
        .collect();
    format!("CREATE TABLE {qualified} ({})", defs.join(", "))
}

/// Multi-row `INSERT` with `rows` value tuples of `names.len()` placeholders each.
pub fn insert_rows(dialect: Dialect, qualified: &str, names: &[String], rows: usize) -> String {
    let cols: Vec<String> = names.iter().map(|n| quote_ident(n)).collect();
    let width = names.len();
    let tuples: Vec<String> = (0..rows)
        .map(|r| {
            let params: Vec<String> = (1..=width)
                .map(|c| dialect.placeholder(r * width + c))
                .collect();
            format!("({})", params.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {qualified} ({}) VALUES {}",
        cols.join(", "),
        tuples.join(", ")
    )
}

/// `SELECT` casting every column to the type it is decoded as.
pub fn select_rows(
    dialect: Dialect,
    qualified: &str,
    columns: &[Column],
    limit: Option<usize>,
) -> String {
    let exprs: Vec<String> = columns
        .iter()
        .map(|c| {
            format!(
                "CAST({} AS {})",
                quote_ident(&c.name),
                dialect.column_type(c.data_type)
            )
        })
        .collect();
    let mut sql = format!("SELECT {} FROM {qualified}", exprs.join(", "));
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql
}

/// Rows per `INSERT` statement: `batch_size`, capped by the bind-parameter limit.
pub fn rows_per_statement(dialect: Dialect, batch_size: usize, column_count: usize) -> usize {
    let by_params = dialect.max_bind_params() / column_count.max(1);
    batch_size.min(by_params).max(1)
}
