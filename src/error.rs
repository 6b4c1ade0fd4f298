// 🚨 Error Taxonomy - structural errors abort, data-quality warnings are collected
//
// Structural errors (missing key field, schema conflict, unreadable input)
// stop the run immediately. Warnings never stop the run; they are carried
// through to the final summary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// STRUCTURAL ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum MergeError {
    /// A constituent key field is missing (or unusable) in one record.
    /// `row` is 1-based within the quarter's file when `quarter` is known,
    /// otherwise within the table being keyed.
    #[error(
        "key construction failed in module '{module}' ({}): field '{field}' {reason}",
        record_location(.quarter, .row)
    )]
    KeyConstruction {
        module: String,
        quarter: Option<u8>,
        row: usize,
        field: String,
        reason: String,
    },

    /// The same column carries incompatible types across quarterly partitions
    #[error(
        "schema conflict in module '{module}': column '{column}' is {first_type} in quarter {first_quarter} but {conflicting_type} in quarter {conflicting_quarter}"
    )]
    SchemaConflict {
        module: String,
        column: String,
        first_quarter: u8,
        first_type: String,
        conflicting_quarter: u8,
        conflicting_type: String,
    },

    #[error("missing partition for module '{module}' quarter {quarter}: {path}")]
    MissingPartition {
        module: String,
        quarter: u8,
        path: String,
    },

    #[error("table '{table}' declares column '{column}' more than once")]
    DuplicateColumn { table: String, column: String },

    /// A pipeline invariant was violated (e.g. roster rows lost in a join)
    #[error("pipeline invariant violated: {0}")]
    Invariant(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, MergeError>;

fn record_location(quarter: &Option<u8>, row: &usize) -> String {
    match quarter {
        Some(q) => format!("quarter {}, row {}", q, row),
        None => format!("row {}", row),
    }
}

// ============================================================================
// DATA-QUALITY WARNINGS
// ============================================================================

/// Non-fatal findings collected along the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// A joined module held more than one row for the same key (fan-out)
    DuplicateKey {
        module: String,
        key_count: usize,
        keys: Vec<String>,
    },

    /// Rows dropped from the benchmark computation (no usable weight)
    MissingWeight { excluded_rows: usize },

    /// A post-merge quality check did not pass
    QualityCheckFailed { check: String, detail: String },

    /// Suffixed duplicate columns that no drop-list names; kept in the output
    UnknownSuffixedColumns { columns: Vec<String> },
}

impl PipelineWarning {
    /// Short label used in logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            PipelineWarning::DuplicateKey { .. } => "DuplicateKeyWarning",
            PipelineWarning::MissingWeight { .. } => "MissingWeightWarning",
            PipelineWarning::QualityCheckFailed { .. } => "QualityCheckWarning",
            PipelineWarning::UnknownSuffixedColumns { .. } => "UnknownColumnsWarning",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PipelineWarning::DuplicateKey {
                module,
                key_count,
                keys,
            } => {
                let shown: Vec<&str> = keys.iter().take(5).map(String::as_str).collect();
                let more = if keys.len() > shown.len() {
                    format!(" (+{} more)", keys.len() - shown.len())
                } else {
                    String::new()
                };
                format!(
                    "{} duplicate key(s) in module '{}': {}{}",
                    key_count,
                    module,
                    shown.join(", "),
                    more
                )
            }
            PipelineWarning::MissingWeight { excluded_rows } => format!(
                "{} row(s) excluded from validation: quarter has no usable weight",
                excluded_rows
            ),
            PipelineWarning::QualityCheckFailed { check, detail } => {
                format!("quality check '{}' failed: {}", check, detail)
            }
            PipelineWarning::UnknownSuffixedColumns { columns } => format!(
                "{} suffixed column(s) not in any drop-list were kept: {}",
                columns.len(),
                columns.join(", ")
            ),
        }
    }
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.label(), self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_warning_cites_keys() {
        let warning = PipelineWarning::DuplicateKey {
            module: "household".to_string(),
            key_count: 1,
            keys: vec!["2023_1_001_01_0001".to_string()],
        };

        let text = warning.to_string();
        assert!(text.contains("DuplicateKeyWarning"));
        assert!(text.contains("2023_1_001_01_0001"));
        assert!(!text.contains("more"));
    }

    #[test]
    fn test_duplicate_key_warning_truncates_long_lists() {
        let keys: Vec<String> = (0..8).map(|i| format!("k{}", i)).collect();
        let warning = PipelineWarning::DuplicateKey {
            module: "employment".to_string(),
            key_count: 8,
            keys,
        };

        assert!(warning.describe().contains("(+3 more)"));
    }

    #[test]
    fn test_key_error_message_names_quarter_and_row() {
        let err = MergeError::KeyConstruction {
            module: "roster".to_string(),
            quarter: Some(3),
            row: 1,
            field: "HH_NO".to_string(),
            reason: "is missing".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "key construction failed in module 'roster' (quarter 3, row 1): field 'HH_NO' is missing"
        );
    }

    #[test]
    fn test_schema_conflict_message_names_quarters() {
        let err = MergeError::SchemaConflict {
            module: "roster".to_string(),
            column: "HR_AGE".to_string(),
            first_quarter: 1,
            first_type: "numeric".to_string(),
            conflicting_quarter: 3,
            conflicting_type: "text".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("roster"));
        assert!(msg.contains("quarter 1"));
        assert!(msg.contains("quarter 3"));
    }
}
