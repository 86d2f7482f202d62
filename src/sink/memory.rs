use std::collections::BTreeMap;

use crate::error::SinkError;
use crate::types::Table;

use super::sql::{sink_column_names, Dialect};
use super::{validate_write, TableSink};

/// Keeps written tables in memory.
///
/// Applies the same replace, batching and column-renaming rules as the relational sinks, renaming
/// columns the way the default PostgreSQL target would. Used for `--dry-run` loads.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: BTreeMap<String, Table>,
    batches: Vec<(String, usize)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents of table `name`.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Names of all stored tables, sorted.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Every batch written so far as `(table, rows)`, in write order.
    pub fn batches(&self) -> &[(String, usize)] {
        &self.batches
    }
}

impl TableSink for MemorySink {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn replace_table(&mut self, name: &str, table: &Table, batch_size: usize) -> Result<usize, SinkError> {
        validate_write(name, table, batch_size)?;

        let mut stored = Table::new(table.columns.clone(), Vec::with_capacity(table.row_count()));
        let names = sink_column_names(Dialect::Postgres, &table.columns);
        for (col, sink_name) in stored.columns.iter_mut().zip(names) {
            col.name = sink_name;
        }
        self.tables.remove(name);

        for batch in table.batches(batch_size) {
            stored.rows.extend_from_slice(batch);
            self.batches.push((name.to_string(), batch.len()));
        }
        let written = stored.row_count();
        self.tables.insert(name.to_string(), stored);
        Ok(written)
    }

    fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Table, SinkError> {
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| SinkError::TableNotFound(name.to_string()))?;
        let take = limit.unwrap_or(usize::MAX);
        Ok(Table::new(
            table.columns.clone(),
            table.rows.iter().take(take).cloned().collect(),
        ))
    }
}
