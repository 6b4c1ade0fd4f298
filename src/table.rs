// 📋 Tabular Model - Values, columns and rows
//
// A Table is an ordered column list plus rows aligned to it. Every stage
// of the pipeline takes a &Table and hands back a brand new Table.

use crate::error::{MergeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// VALUE
// ============================================================================

/// One scalar cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Missing marker, or a float that carries no number
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric view (Int and Float only; text is never coerced)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Canonical string form used for keys and code comparisons.
    ///
    /// Integral floats render without a fractional part so that `1` and
    /// `1.0` serialize identically. Missing values have no canonical form.
    pub fn canonical(&self) -> Option<String> {
        match self {
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    Some(format!("{}", *f as i64))
                } else {
                    Some(f.to_string())
                }
            }
            Value::Text(s) => Some(s.clone()),
            Value::Missing => None,
        }
    }

    /// Type of a non-missing value
    pub fn column_type(&self) -> Option<ColumnType> {
        if self.is_missing() {
            return None;
        }
        match self {
            Value::Int(_) | Value::Float(_) => Some(ColumnType::Numeric),
            Value::Text(_) => Some(ColumnType::Text),
            Value::Missing => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Missing)
    }
}

// ============================================================================
// COLUMN TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Text,
}

impl ColumnType {
    pub fn name(&self) -> &str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,

    /// (quarter, first row) for each stacked partition, in row order
    segments: Vec<(u8, usize)>,
}

impl Table {
    /// Create an empty table; column names must be unique
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self> {
        let name = name.into();
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.clone(), i).is_some() {
                return Err(MergeError::DuplicateColumn {
                    table: name,
                    column: column.clone(),
                });
            }
        }

        Ok(Table {
            name,
            columns,
            index,
            rows: Vec::new(),
            segments: Vec::new(),
        })
    }

    /// Build a table from positional rows
    pub fn from_rows(name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut table = Table::new(name, columns.iter().map(|c| c.to_string()).collect())?;
        for row in rows {
            table.push_row(row);
        }
        Ok(table)
    }

    /// Build a table from field→value records. Columns appear in order of
    /// first appearance; fields a record lacks become Missing.
    pub fn from_records(name: &str, records: Vec<Vec<(String, Value)>>) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for record in &records {
            for (field, _) in record {
                if !seen.contains_key(field) {
                    seen.insert(field.clone(), columns.len());
                    columns.push(field.clone());
                }
            }
        }

        let mut table = Table::new(name, columns)?;
        for record in records {
            let mut row = vec![Value::Missing; table.columns.len()];
            for (field, value) in record {
                row[seen[&field]] = value;
            }
            table.rows.push(row);
        }
        Ok(table)
    }

    /// Append a row; short rows are padded with Missing
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        debug_assert!(
            row.len() <= self.columns.len(),
            "row of {} values pushed into '{}' with {} columns",
            row.len(),
            self.name,
            self.columns.len()
        );
        row.resize(self.columns.len(), Value::Missing);
        self.rows.push(row);
    }

    /// Rows pushed from here on belong to `quarter`
    pub fn begin_quarter(&mut self, quarter: u8) {
        self.segments.push((quarter, self.rows.len()));
    }

    /// Quarter a row was stacked from and its 0-based position inside that
    /// quarter's file. None for tables that were never stacked.
    pub fn row_origin(&self, row: usize) -> Option<(u8, usize)> {
        self.segments
            .iter()
            .rev()
            .find(|&&(_, start)| start <= row)
            .map(|&(quarter, start)| (quarter, row - start))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Cell lookup; None when the column does not exist
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn record(&self, row: usize) -> Record<'_> {
        Record { table: self, row }
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        (0..self.rows.len()).map(move |row| Record { table: self, row })
    }

    /// Column type from its non-missing values: Text wins over Numeric,
    /// None when every value is missing or the column does not exist
    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        let idx = self.column_index(column)?;
        let mut found = None;
        for row in &self.rows {
            match row[idx].column_type() {
                Some(ColumnType::Text) => return Some(ColumnType::Text),
                Some(ColumnType::Numeric) => found = Some(ColumnType::Numeric),
                None => {}
            }
        }
        found
    }

    /// Rename the table (stages name their outputs)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Copy of this table keeping only the columns `keep` accepts
    pub fn select_columns<F>(&self, keep: F) -> Table
    where
        F: Fn(&str) -> bool,
    {
        let kept: Vec<usize> = (0..self.columns.len())
            .filter(|&i| keep(&self.columns[i]))
            .collect();
        let columns: Vec<String> = kept.iter().map(|&i| self.columns[i].clone()).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| kept.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Table {
            name: self.name.clone(),
            columns,
            index,
            rows,
            segments: self.segments.clone(),
        }
    }
}

// ============================================================================
// RECORD VIEW
// ============================================================================

/// Read-only view of one row
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    table: &'a Table,
    row: usize,
}

impl<'a> Record<'a> {
    /// Field value; None when the table has no such column
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        let idx = self.table.column_index(field)?;
        Some(&self.table.rows[self.row][idx])
    }

    pub fn row_index(&self) -> usize {
        self.row
    }

    pub fn origin(&self) -> Option<(u8, usize)> {
        self.table.row_origin(self.row)
    }
}
