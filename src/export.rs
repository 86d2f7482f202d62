//! Write tables back out as CSV.

use std::io::Write;
use std::path::Path;

use crate::error::IngestionResult;
use crate::types::Table;

/// Write `table` as comma-separated text with a header row. Nulls become empty fields.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> IngestionResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.column_names())?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `table` to the file at `path`, replacing it.
pub fn write_csv_to_path(table: &Table, path: impl AsRef<Path>) -> IngestionResult<()> {
    let file = std::fs::File::create(path)?;
    write_csv(table, std::io::BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, DataType, Value};

    #[test]
    fn nulls_and_quotes_are_rendered() {
        let table = Table::new(
            vec![Column::new("ID", DataType::Int64), Column::new("Name", DataType::Utf8)],
            vec![
                vec![Value::Int64(1), Value::Utf8("Tran, Binh".into())],
                vec![Value::Int64(2), Value::Null],
            ],
        );
        let mut out = Vec::new();
        write_csv(&table, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "ID,Name\n1,\"Tran, Binh\"\n2,\n");
    }
}
