// 📂 Data Loader - Quarterly CSV partitions → Tables
//
// Typing is per column and deliberately shallow:
//   all non-empty cells are integers        → Int
//   all non-empty cells are finite numbers  → Float
//   anything else                           → Text
// Empty cells are Missing. Fixed-width codes such as "001" load as Int(1);
// their width comes back through `keys.padding`, never from the file.

use crate::config::ModuleConfig;
use crate::error::{MergeError, Result};
use crate::stacker::Partition;
use crate::table::{Table, Value};
use std::path::Path;
use tracing::debug;

pub const QUARTERS: [u8; 4] = [1, 2, 3, 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Text,
}

/// Read one CSV file into a table named `name`
pub fn load_csv_table(path: &Path, name: &str) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut raw: Vec<csv::StringRecord> = Vec::new();
    for result in rdr.records() {
        raw.push(result?);
    }

    let kinds: Vec<CellKind> = (0..headers.len())
        .map(|col| column_kind(raw.iter().filter_map(|r| r.get(col))))
        .collect();

    let mut table = Table::new(name, headers)?;
    for record in &raw {
        let row = kinds
            .iter()
            .enumerate()
            .map(|(col, kind)| parse_cell(record.get(col).unwrap_or(""), *kind))
            .collect();
        table.push_row(row);
    }

    debug!(path = %path.display(), rows = table.len(), columns = table.columns().len(), "loaded CSV");
    Ok(table)
}

/// Load the four quarterly partitions of a module from `dir`
pub fn load_module(dir: &Path, module: &ModuleConfig) -> Result<Vec<Partition>> {
    QUARTERS
        .iter()
        .map(|&quarter| {
            let path = dir.join(module.file_name(quarter));
            if !path.is_file() {
                return Err(MergeError::MissingPartition {
                    module: module.name.clone(),
                    quarter,
                    path: path.display().to_string(),
                });
            }
            let table = load_csv_table(&path, &module.name)?;
            Ok(Partition::new(quarter, table))
        })
        .collect()
}

fn column_kind<'a>(cells: impl Iterator<Item = &'a str>) -> CellKind {
    let mut kind = CellKind::Int;
    for cell in cells.filter(|c| !c.is_empty()) {
        if cell.parse::<i64>().is_ok() {
            continue;
        }
        match cell.parse::<f64>() {
            Ok(f) if f.is_finite() => kind = CellKind::Float,
            _ => return CellKind::Text,
        }
    }
    kind
}

fn parse_cell(cell: &str, kind: CellKind) -> Value {
    if cell.is_empty() {
        return Value::Missing;
    }
    match kind {
        CellKind::Int => cell.parse::<i64>().map(Value::Int).unwrap_or(Value::Missing),
        CellKind::Float => cell.parse::<f64>().map(Value::Float).unwrap_or(Value::Missing),
        CellKind::Text => Value::Text(cell.to_string()),
    }
}
