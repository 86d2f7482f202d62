//! Relational destinations for parsed tables.
//!
//! Every sink implements [`TableSink`] with replace semantics: writing a table destroys any
//! existing table of the same name and recreates it from the header, then inserts all rows in
//! order, `batch_size` rows at a time. Writes are not transactional; a failure part-way leaves
//! the table in an undefined state and reports how many rows made it.
//!
//! - [`PostgresSink`]: PostgreSQL, schema-qualified (default schema `public`)
//! - [`SqliteSink`]: SQLite file or in-memory database
//! - [`MemorySink`]: in-process map of tables, used for dry runs

mod memory;
mod postgres;
pub mod sql;
mod sqlite;

pub use memory::MemorySink;
pub use postgres::{PgSettings, PostgresSink};
pub use sqlite::SqliteSink;

use crate::error::SinkError;
use crate::types::{DataType, Table, Value};

/// Default rows per insert batch.
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// A relational store that tables can be written to and read back from.
pub trait TableSink {
    /// Human-readable description of the destination, e.g. `postgres schema=public`.
    fn describe(&self) -> String;

    /// Replace table `name` with `table`, writing at most `batch_size` rows per batch.
    ///
    /// Returns the number of rows written.
    fn replace_table(&mut self, name: &str, table: &Table, batch_size: usize) -> Result<usize, SinkError>;

    /// Read table `name` back, optionally only its first `limit` rows.
    fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Table, SinkError>;
}

/// Checks shared by every sink before anything is dropped.
pub(crate) fn validate_write(name: &str, table: &Table, batch_size: usize) -> Result<(), SinkError> {
    if batch_size == 0 {
        return Err(SinkError::InvalidBatchSize(batch_size));
    }
    if table.columns.is_empty() {
        return Err(SinkError::NoColumns(name.to_string()));
    }
    Ok(())
}

/// A value converted to the bind type of its column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlParam {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
}

impl SqlParam {
    /// Convert `value` for a column of `data_type`.
    ///
    /// Whole floats in an integer column are narrowed. Anything else that does not fit is sent as
    /// text and left for the database to reject.
    pub(crate) fn for_column(data_type: DataType, value: &Value) -> Self {
        match (data_type, value) {
            (_, Value::Null) => match data_type {
                DataType::Int64 => Self::Int(None),
                DataType::Float64 => Self::Float(None),
                DataType::Utf8 => Self::Text(None),
            },
            (DataType::Int64, Value::Int64(v)) => Self::Int(Some(*v)),
            (DataType::Int64, Value::Float64(v)) if v.fract() == 0.0 => Self::Int(Some(*v as i64)),
            (DataType::Float64, Value::Float64(v)) => Self::Float(Some(*v)),
            (DataType::Float64, Value::Int64(v)) => Self::Float(Some(*v as f64)),
            (_, other) => Self::Text(Some(other.to_string())),
        }
    }
}

/// Build a runtime for a sink's blocking API.
pub(crate) fn sink_runtime() -> Result<tokio::runtime::Runtime, SinkError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(SinkError::Runtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    #[test]
    fn params_follow_column_type() {
        assert_eq!(SqlParam::for_column(DataType::Int64, &Value::Null), SqlParam::Int(None));
        assert_eq!(
            SqlParam::for_column(DataType::Float64, &Value::Int64(2)),
            SqlParam::Float(Some(2.0))
        );
        assert_eq!(
            SqlParam::for_column(DataType::Utf8, &Value::Int64(7)),
            SqlParam::Text(Some("7".into()))
        );
        assert_eq!(
            SqlParam::for_column(DataType::Int64, &Value::Utf8("x".into())),
            SqlParam::Text(Some("x".into()))
        );
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let table = Table::new(vec![Column::new("a", DataType::Int64)], vec![]);
        assert!(matches!(
            validate_write("t", &table, 0),
            Err(SinkError::InvalidBatchSize(0))
        ));
        assert!(matches!(
            validate_write("t", &Table::new(vec![], vec![]), 10),
            Err(SinkError::NoColumns(_))
        ));
    }
}
