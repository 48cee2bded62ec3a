//! In-memory table model.
//!
//! A table is an ordered list of named, homogeneous columns that all have the
//! same number of rows. Tables are immutable once built; every constructor,
//! including deserialization, goes through [`Table::new`].

use crate::error::TableError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Values of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnValues {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
}

impl ColumnValues {
    /// Returns the number of values.
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int64(v) => v.len(),
            ColumnValues::Float64(v) => v.len(),
            ColumnValues::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the type name used in the JSON form.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnValues::Int64(_) => "int64",
            ColumnValues::Float64(_) => "float64",
            ColumnValues::Utf8(_) => "utf8",
        }
    }

    /// Returns an empty column of the same type.
    pub fn empty_like(&self) -> Self {
        match self {
            ColumnValues::Int64(_) => ColumnValues::Int64(Vec::new()),
            ColumnValues::Float64(_) => ColumnValues::Float64(Vec::new()),
            ColumnValues::Utf8(_) => ColumnValues::Utf8(Vec::new()),
        }
    }

    /// Copies `len` values starting at `offset`, clamped to the column.
    fn slice(&self, offset: usize, len: usize) -> Self {
        let start = offset.min(self.len());
        let end = start.saturating_add(len).min(self.len());
        match self {
            ColumnValues::Int64(v) => ColumnValues::Int64(v[start..end].to_vec()),
            ColumnValues::Float64(v) => ColumnValues::Float64(v[start..end].to_vec()),
            ColumnValues::Utf8(v) => ColumnValues::Utf8(v[start..end].to_vec()),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn int64(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self::new(name, ColumnValues::Int64(values))
    }

    pub fn float64(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, ColumnValues::Float64(values))
    }

    pub fn utf8<S: Into<String>>(name: impl Into<String>, values: Vec<S>) -> Self {
        Self::new(
            name,
            ColumnValues::Utf8(values.into_iter().map(Into::into).collect()),
        )
    }
}

#[derive(Deserialize)]
struct RawTable {
    columns: Vec<Column>,
}

impl TryFrom<RawTable> for Table {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        Table::new(raw.columns)
    }
}

/// A table with equal-length columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Builds a table, checking that all columns have the same row count and
    /// distinct names.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let mut names = HashSet::with_capacity(columns.len());
        let expected = columns.first().map(|c| c.values.len()).unwrap_or(0);

        for column in &columns {
            if !names.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
            let actual = column.values.len();
            if actual != expected {
                return Err(TableError::RaggedColumns {
                    column: column.name.clone(),
                    expected,
                    actual,
                });
            }
        }

        Ok(Self { columns })
    }

    /// Returns a table with no columns.
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    /// Returns `len` rows starting at `offset`. Out-of-range requests are
    /// clamped.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values.slice(offset, len)))
                .collect(),
        }
    }

    /// Returns the first `n` rows.
    pub fn head(&self, n: usize) -> Self {
        self.slice(0, n)
    }

    /// Builds a deterministic trade-like table with `rows` rows.
    ///
    /// Columns: `time` (milliseconds since midnight, starting 09:30),
    /// `sym`, `price` and `size`.
    pub fn sample(rows: usize) -> Self {
        const SYMBOLS: [&str; 6] = ["AAPL", "GOOG", "MSFT", "AMZN", "META", "TSLA"];
        const OPEN_MS: i64 = (9 * 3600 + 30 * 60) * 1000;

        let mut time = Vec::with_capacity(rows);
        let mut sym = Vec::with_capacity(rows);
        let mut price = Vec::with_capacity(rows);
        let mut size = Vec::with_capacity(rows);

        for i in 0..rows {
            let n = i as i64;
            time.push(OPEN_MS + n * 250);
            sym.push(SYMBOLS[i % SYMBOLS.len()].to_string());
            price.push(100.0 + ((n * 37) % 1000) as f64 / 100.0);
            size.push(100 * (1 + (n * 7) % 10));
        }

        Self {
            columns: vec![
                Column::int64("time", time),
                Column::new("sym", ColumnValues::Utf8(sym)),
                Column::float64("price", price),
                Column::int64("size", size),
            ],
        }
    }
}
