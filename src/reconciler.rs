// 🧹 Column Reconciler - Drop the redundant duplicates produced by the joins
//
// Only columns named in a drop-list are removed. A suffixed duplicate that
// no drop-list names stays in the table and is reported instead.

use crate::config::PipelineConfig;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub columns_in: usize,
    pub columns_out: usize,

    /// Drop-list columns that were present and removed
    pub dropped: Vec<String>,

    /// Suffixed duplicates kept because no drop-list mentions them
    pub unknown_duplicates: Vec<String>,
}

pub struct ColumnReconciler {
    drop_list: HashSet<String>,
    suffixes: Vec<String>,
}

impl ColumnReconciler {
    pub fn new(drop_list: impl IntoIterator<Item = String>, suffixes: Vec<String>) -> Self {
        ColumnReconciler {
            drop_list: drop_list.into_iter().collect(),
            suffixes,
        }
    }

    /// Drop-lists and suffixes of every joined module
    pub fn from_config(config: &PipelineConfig) -> Self {
        let joined = config.joined_modules();
        ColumnReconciler::new(
            joined.iter().flat_map(|m| m.always_drop.iter().cloned()),
            joined.iter().map(|m| m.suffix.clone()).collect(),
        )
    }

    /// Remove drop-listed columns that exist. Absent ones are ignored, so
    /// running this twice gives the same column set as running it once.
    pub fn reconcile(&self, table: &Table) -> (Table, ReconcileReport) {
        let dropped: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| self.drop_list.contains(c.as_str()))
            .cloned()
            .collect();

        let cleaned = table.select_columns(|c| !self.drop_list.contains(c));
        let unknown_duplicates = self.unknown_duplicates(&cleaned);

        let report = ReconcileReport {
            columns_in: table.columns().len(),
            columns_out: cleaned.columns().len(),
            dropped,
            unknown_duplicates,
        };
        (cleaned, report)
    }

    /// Columns that look like `<existing column><suffix>`
    fn unknown_duplicates(&self, table: &Table) -> Vec<String> {
        table
            .columns()
            .iter()
            .filter(|column| {
                self.suffixes.iter().any(|suffix| {
                    column
                        .strip_suffix(suffix.as_str())
                        .map_or(false, |base| !base.is_empty() && table.has_column(base))
                })
            })
            .cloned()
            .collect()
    }
}
