// 🧱 Stacker - One table per module out of four quarterly partitions
//
// Rows keep their original order inside each quarter; quarters follow
// each other 1 → 4. Columns are the union of every partition's columns.

use crate::error::{MergeError, Result};
use crate::table::{ColumnType, Table, Value};
use std::collections::HashMap;
use tracing::debug;

/// One quarterly file of a module
#[derive(Debug, Clone)]
pub struct Partition {
    pub quarter: u8,
    pub table: Table,
}

impl Partition {
    pub fn new(quarter: u8, table: Table) -> Self {
        Partition { quarter, table }
    }
}

/// Concatenate the quarterly partitions of `module`.
///
/// A column that is numeric in one quarter and text in another is a
/// `SchemaConflict`; nothing is coerced.
pub fn stack(module: &str, partitions: &[Partition]) -> Result<Table> {
    let mut ordered: Vec<&Partition> = partitions.iter().collect();
    ordered.sort_by_key(|p| p.quarter);

    for pair in ordered.windows(2) {
        if pair[0].quarter == pair[1].quarter {
            return Err(MergeError::Config(format!(
                "module '{}' received quarter {} twice",
                module, pair[0].quarter
            )));
        }
    }
    if let Some(bad) = ordered.iter().find(|p| !(1..=4).contains(&p.quarter)) {
        return Err(MergeError::Config(format!(
            "module '{}' received partition for invalid quarter {}",
            module, bad.quarter
        )));
    }

    // Column union in first-seen order, with the first type observed per column
    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut first_types: HashMap<String, (u8, ColumnType)> = HashMap::new();

    for partition in &ordered {
        for column in partition.table.columns() {
            if !positions.contains_key(column) {
                positions.insert(column.clone(), columns.len());
                columns.push(column.clone());
            }

            let Some(found) = partition.table.column_type(column) else {
                continue;
            };
            match first_types.get(column) {
                Some(&(first_quarter, first_type)) if first_type != found => {
                    return Err(MergeError::SchemaConflict {
                        module: module.to_string(),
                        column: column.clone(),
                        first_quarter,
                        first_type: first_type.name().to_string(),
                        conflicting_quarter: partition.quarter,
                        conflicting_type: found.name().to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    first_types.insert(column.clone(), (partition.quarter, found));
                }
            }
        }
    }

    let mut stacked = Table::new(module, columns)?;
    for partition in &ordered {
        stacked.begin_quarter(partition.quarter);
        let targets: Vec<usize> = partition
            .table
            .columns()
            .iter()
            .map(|c| positions[c])
            .collect();

        for source in partition.table.rows() {
            let mut row = vec![Value::Missing; stacked.columns().len()];
            for (value, &target) in source.iter().zip(&targets) {
                row[target] = value.clone();
            }
            stacked.push_row(row);
        }

        debug!(
            module,
            quarter = partition.quarter,
            rows = partition.table.len(),
            "stacked partition"
        );
    }

    Ok(stacked)
}
