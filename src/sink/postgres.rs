use std::fmt;

use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::query::Query;
use sqlx::{Connection, Database, Postgres, Row};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::error::SinkError;
use crate::types::{Column, DataType, Table, Value};

use super::sql::{self, Dialect};
use super::{sink_runtime, validate_write, SqlParam, TableSink};

const DIALECT: Dialect = Dialect::Postgres;

/// Connection parameters for [`PostgresSink`].
#[derive(Clone, PartialEq, Eq)]
pub struct PgSettings {
    pub host: String,
    /// `None` uses the driver default (5432).
    pub port: Option<u16>,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for PgSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl PgSettings {
    fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password);
        match self.port {
            Some(port) => options.port(port),
            None => options,
        }
    }
}

/// PostgreSQL sink over a single connection, writing into one schema.
pub struct PostgresSink {
    // Dropped before the runtime that drives it.
    conn: PgConnection,
    runtime: Runtime,
    schema: String,
    target: String,
}

impl PostgresSink {
    /// Connect once; the connection is reused for every table of a run.
    pub fn connect(settings: &PgSettings, schema: impl Into<String>) -> Result<Self, SinkError> {
        let runtime = sink_runtime()?;
        let conn = runtime
            .block_on(PgConnection::connect_with(&settings.connect_options()))
            .map_err(SinkError::Connect)?;
        let target = match settings.port {
            Some(port) => format!("{}:{}/{}", settings.host, port, settings.database),
            None => format!("{}/{}", settings.host, settings.database),
        };
        info!(%target, "connected to postgres");
        Ok(Self {
            conn,
            runtime,
            schema: schema.into(),
            target,
        })
    }
}

impl TableSink for PostgresSink {
    fn describe(&self) -> String {
        format!("postgres {} schema={}", self.target, self.schema)
    }

    fn replace_table(&mut self, name: &str, table: &Table, batch_size: usize) -> Result<usize, SinkError> {
        validate_write(name, table, batch_size)?;
        let Self {
            conn,
            runtime,
            schema,
            ..
        } = self;
        runtime.block_on(replace_table(conn, schema, name, table, batch_size))
    }

    fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Table, SinkError> {
        let Self {
            conn,
            runtime,
            schema,
            ..
        } = self;
        runtime.block_on(read_table(conn, schema, name, limit))
    }
}

type PgQuery<'q> = Query<'q, Postgres, <Postgres as Database>::Arguments<'q>>;

fn bind(query: PgQuery<'_>, param: SqlParam) -> PgQuery<'_> {
    match param {
        SqlParam::Int(v) => query.bind(v),
        SqlParam::Float(v) => query.bind(v),
        SqlParam::Text(v) => query.bind(v),
    }
}

async fn replace_table(
    conn: &mut PgConnection,
    schema: &str,
    name: &str,
    table: &Table,
    batch_size: usize,
) -> Result<usize, SinkError> {
    let qualified = sql::qualified_name(Some(schema), name);
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
        // Statement text varies with the chunk length; don't fill the prepared-statement cache.
        let mut query = sqlx::query(&statement).persistent(false);
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
    conn: &mut PgConnection,
    schema: &str,
    name: &str,
    limit: Option<usize>,
) -> Result<Table, SinkError> {
    let query_err = |source: sqlx::Error| SinkError::Query {
        table: name.to_string(),
        source,
    };

    let described = sqlx::query(
        r#"
        SELECT column_name::text, data_type::text
        FROM information_schema.columns
        WHERE table_schema = $1 AND table_name = $2
        ORDER BY ordinal_position
        "#,
    )
    .bind(schema)
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

    let statement = sql::select_rows(DIALECT, &sql::qualified_name(Some(schema), name), &columns, limit);
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

fn decode_cell(row: &PgRow, idx: usize, col: &Column) -> Result<Value, sqlx::Error> {
    Ok(match col.data_type {
        DataType::Int64 => row.try_get::<Option<i64>, _>(idx)?.map_or(Value::Null, Value::Int64),
        DataType::Float64 => row.try_get::<Option<f64>, _>(idx)?.map_or(Value::Null, Value::Float64),
        DataType::Utf8 => row.try_get::<Option<String>, _>(idx)?.map_or(Value::Null, Value::Utf8),
    })
}
