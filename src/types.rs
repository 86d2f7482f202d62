//! Core data model types for ingestion.
//!
//! Parsed files land in an in-memory [`Table`]: an ordered list of named, typed [`Column`]s plus
//! row-major [`Value`] storage. Column types are inferred from the cell text after parsing; no
//! schema is declared up front.

use std::fmt;

use serde::Serialize;

/// Logical data type for a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// Infer the narrowest type that can hold every cell.
    ///
    /// Null tokens (see [`is_null_token`]) are ignored. A column with no non-null cells is
    /// [`DataType::Utf8`].
    pub fn infer<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen_any = false;
        let mut all_int = true;
        let mut all_float = true;

        for raw in cells {
            let cell = raw.trim();
            if is_null_token(cell) {
                continue;
            }
            seen_any = true;
            if all_int && cell.parse::<i64>().is_err() {
                all_int = false;
            }
            if all_float && parse_finite_f64(cell).is_none() {
                all_float = false;
            }
            if !all_int && !all_float {
                return Self::Utf8;
            }
        }

        match (seen_any, all_int, all_float) {
            (false, _, _) => Self::Utf8,
            (true, true, _) => Self::Int64,
            (true, false, true) => Self::Float64,
            _ => Self::Utf8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64 => f.write_str("int64"),
            Self::Float64 => f.write_str("float64"),
            Self::Utf8 => f.write_str("utf8"),
        }
    }
}

/// A single named, typed column in a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name, verbatim from the source header.
    pub name: String,
    /// Column data type.
    pub data_type: DataType,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A single typed value in a [`Table`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Convert raw cell text into a value of `data_type`.
    ///
    /// Surrounding whitespace is ignored when recognising null tokens and numbers, but text cells
    /// keep the raw cell verbatim. Text that does not parse as the requested numeric type falls
    /// back to [`Value::Utf8`], so the conversion is total.
    pub fn from_raw(raw: &str, data_type: DataType) -> Self {
        let trimmed = raw.trim();
        if is_null_token(trimmed) {
            return Self::Null;
        }
        let text = || Self::Utf8(raw.to_owned());
        match data_type {
            DataType::Int64 => trimmed.parse::<i64>().map(Self::Int64).unwrap_or_else(|_| text()),
            DataType::Float64 => parse_finite_f64(trimmed).map(Self::Float64).unwrap_or_else(text),
            DataType::Utf8 => text(),
        }
    }
}

impl fmt::Display for Value {
    /// Renders the value the way it is written back out to CSV; null is the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{v:.1}")
            }
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => f.write_str(v),
        }
    }
}

/// Cell text treated as missing, in addition to the empty string.
const NULL_TOKENS: &[&str] = &["NA", "N/A", "n/a", "NaN", "nan", "NULL", "null", "#N/A", "<NA>"];

/// Returns `true` when `cell` (already trimmed) represents a missing value.
pub fn is_null_token(cell: &str) -> bool {
    cell.is_empty() || NULL_TOKENS.contains(&cell)
}

fn parse_finite_f64(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// In-memory tabular data.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as [`Table::columns`]. Column names are
/// not required to be unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// Ordered column descriptions.
    pub columns: Vec<Column>,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create a table from columns and rows.
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build a table from a header and raw text rows, inferring one type per column.
    ///
    /// Every row must already have `header.len()` cells.
    pub fn from_text_rows(header: Vec<String>, raw_rows: Vec<Vec<String>>) -> Self {
        let columns: Vec<Column> = header
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let data_type =
                    DataType::infer(raw_rows.iter().filter_map(|row| row.get(idx)).map(String::as_str));
                Column::new(name, data_type)
            })
            .collect();

        let rows = raw_rows
            .into_iter()
            .map(|row| {
                row.iter()
                    .zip(&columns)
                    .map(|(raw, col)| Value::from_raw(raw, col.data_type))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the table.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Iterate over consecutive row slices of at most `batch_size` rows.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size == 0`.
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, Vec<Value>> {
        self.rows.chunks(batch_size)
    }
}
