use std::str::FromStr;

use sqlx::query::Query;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Connection, Database, Row, Sqlite};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::SinkError;
use crate::types::{Column, DataType, Table, Value};

use super::sql::{self, Dialect};
use super::{sink_runtime, validate_write, SqlParam, TableSink};

const DIALECT: Dialect = Dialect::Sqlite;

/// SQLite sink over a single connection.
pub struct SqliteSink {
    // Dropped before the runtime that drives it.
    conn: SqliteConnection,
    runtime: Runtime,
    url: String,
}

impl SqliteSink {
    /// Open (creating if missing) the database at `url`, e.g. `sqlite://loader.db` or
    /// `sqlite::memory:`.
    pub fn open(url: &str) -> Result<Self, SinkError> {
        let runtime = sink_runtime()?;
        let options = SqliteConnectOptions::from_str(url)
            .map_err(SinkError::Connect)?
            .create_if_missing(true);
        let conn = runtime
            .block_on(SqliteConnection::connect_with(&options))
            .map_err(SinkError::Connect)?;
        Ok(Self {
            conn,
            runtime,
            url: url.to_string(),
        })
    }

    /// Private in-memory database, discarded when the sink is dropped.
    pub fn in_memory() -> Result<Self, SinkError> {
        Self::open("sqlite::memory:")
    }
}

impl TableSink for SqliteSink {
    fn describe(&self) -> String {
        format!("sqlite {}", self.url)
    }

    fn replace_table(&mut self, name: &str, table: &Table, batch_size: usize) -> Result<usize, SinkError> {
        validate_write(name, table, batch_size)?;
        let Self { conn, runtime, .. } = self;
        runtime.block_on(replace_table(conn, name, table, batch_size))
    }

    fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Table, SinkError> {
        let Self { conn, runtime, .. } = self;
        runtime.block_on(read_table(conn, name, limit))
    }
}

type SqliteQuery<'q> = Query<'q, Sqlite, <Sqlite as Database>::Arguments<'q>>;

fn bind(query: SqliteQuery<'_>, param: SqlParam) -> SqliteQuery<'_> {
    match param {
        SqlParam::Int(v) => query.bind(v),
        SqlParam::Float(v) => query.bind(v),
        SqlParam::Text(v) => query.bind(v),
    }
}

async fn replace_table(
    conn: &mut SqliteConnection,
    name: &str,
    table: &Table,
    batch_size: usize,
) -> Result<usize, SinkError> {
    let qualified = sql::qualified_name(None, name);
    let names = sql::sink_column_names(DIALECT, &table.columns);
    let failed = |rows_written: usize| {
        move |source: sqlx::Error| SinkError::WriteFailed {
            table: name.to_string(),
            rows_written,
            source,
        }
    };

    sqlx::query(&sql::drop_table(&qualified))
        .execute(&mut *conn)
        .await
        .map_err(failed(0))?;
    sqlx::query(&sql::create_table(DIALECT, &qualified, &names, &table.columns))
        .execute(&mut *conn)
        .await
        .map_err(failed(0))?;

    let per_statement = sql::rows_per_statement(DIALECT, batch_size, names.len());
    let mut written = 0usize;
    for chunk in table.batches(per_statement) {
        let statement = sql::insert_rows(DIALECT, &qualified, &names, chunk.len());
        let mut query = sqlx::query(&statement);
        for row in chunk {
            for (col, value) in table.columns.iter().zip(row) {
                query = bind(query, SqlParam::for_column(col.data_type, value));
            }
        }
        query.execute(&mut *conn).await.map_err(failed(written))?;
        written += chunk.len();
        debug!(table = name, written, "batch inserted");
    }
    Ok(written)
}

async fn read_table(
    conn: &mut SqliteConnection,
    name: &str,
    limit: Option<usize>,
) -> Result<Table, SinkError> {
    let query_err = |source: sqlx::Error| SinkError::Query {
        table: name.to_string(),
        source,
    };

    let described = sqlx::query("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
        .bind(name)
        .fetch_all(&mut *conn)
        .await
        .map_err(query_err)?;
    if described.is_empty() {
        return Err(SinkError::TableNotFound(name.to_string()));
    }
    let columns = described
        .iter()
        .map(|row| -> Result<Column, sqlx::Error> {
            let col: String = row.try_get(0)?;
            let declared: String = row.try_get(1)?;
            Ok(Column::new(col, DIALECT.data_type_for(&declared)))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_err)?;

    let statement = sql::select_rows(DIALECT, &sql::qualified_name(None, name), &columns, limit);
    let rows = sqlx::query(&statement)
        .fetch_all(&mut *conn)
        .await
        .map_err(query_err)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut values = Vec::with_capacity(columns.len());
        for (idx, col) in columns.iter().enumerate() {
            values.push(decode_cell(row, idx, col).map_err(query_err)?);
        }
        out.push(values);
    }
    Ok(Table::new(columns, out))
}

fn decode_cell(row: &SqliteRow, idx: usize, col: &Column) -> Result<Value, sqlx::Error> {
    Ok(match col.data_type {
        DataType::Int64 => row.try_get::<Option<i64>, _>(idx)?.map_or(Value::Null, Value::Int64),
        DataType::Float64 => row.try_get::<Option<f64>, _>(idx)?.map_or(Value::Null, Value::Float64),
        DataType::Utf8 => row.try_get::<Option<String>, _>(idx)?.map_or(Value::Null, Value::Utf8),
    })
}
