// ✅ Quality Checker - Post-merge integrity checks
//
// Two independent, non-fatal checks on the cleaned master table:
//   1. Uniqueness: one row per person key
//   2. Key presence: every required key column is still there

use crate::config::PipelineConfig;
use crate::keys::KeyBuilder;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// CHECK RESULT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: String,
    pub passed: bool,
    pub detail: String,

    /// Offending key count (uniqueness) or missing column count (presence)
    pub offending: usize,
}

impl CheckResult {
    fn pass(check: &str, detail: String) -> Self {
        CheckResult {
            check: check.to_string(),
            passed: true,
            detail,
            offending: 0,
        }
    }

    fn fail(check: &str, detail: String, offending: usize) -> Self {
        CheckResult {
            check: check.to_string(),
            passed: false,
            detail,
            offending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub uniqueness: CheckResult,
    pub key_presence: CheckResult,
}

impl QualityReport {
    pub fn all_passed(&self) -> bool {
        self.uniqueness.passed && self.key_presence.passed
    }

    pub fn checks(&self) -> [&CheckResult; 2] {
        [&self.uniqueness, &self.key_presence]
    }

    pub fn summary(&self) -> String {
        self.checks()
            .iter()
            .map(|c| {
                format!(
                    "{} {}: {}",
                    if c.passed { "✓" } else { "✗" },
                    c.check,
                    c.detail
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// QUALITY CHECKER
// ============================================================================

pub struct QualityChecker<'a> {
    config: &'a PipelineConfig,
}

impl<'a> QualityChecker<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        QualityChecker { config }
    }

    pub fn check(&self, master: &Table) -> QualityReport {
        QualityReport {
            uniqueness: self.check_uniqueness(master),
            key_presence: self.check_key_presence(master),
        }
    }

    /// Group rows by person key; any group larger than one is a failure
    pub fn check_uniqueness(&self, master: &Table) -> CheckResult {
        const CHECK: &str = "person_key_uniqueness";

        let keys = match self.person_keys(master) {
            Ok(keys) => keys,
            Err(reason) => return CheckResult::fail(CHECK, reason, 0),
        };

        let mut counts: HashMap<&str, usize> = HashMap::with_capacity(keys.len());
        for key in &keys {
            *counts.entry(key.as_str()).or_default() += 1;
        }

        let offending = counts.values().filter(|&&n| n > 1).count();
        if offending == 0 {
            CheckResult::pass(CHECK, format!("{} rows, all person keys unique", keys.len()))
        } else {
            let extra_rows: usize = counts.values().filter(|&&n| n > 1).map(|n| n - 1).sum();
            CheckResult::fail(
                CHECK,
                format!(
                    "{} person key(s) appear more than once ({} surplus rows)",
                    offending, extra_rows
                ),
                offending,
            )
        }
    }

    /// Every household key field plus the base person-line field must exist
    pub fn check_key_presence(&self, master: &Table) -> CheckResult {
        const CHECK: &str = "key_variable_presence";

        let mut required: Vec<&str> = self.config.keys.household_fields().to_vec();
        required.push(self.config.base_line_field());

        let missing: Vec<&str> = required
            .into_iter()
            .filter(|field| !master.has_column(field))
            .collect();

        if missing.is_empty() {
            CheckResult::pass(CHECK, "all key variables present".to_string())
        } else {
            CheckResult::fail(
                CHECK,
                format!("missing key variable(s): {}", missing.join(", ")),
                missing.len(),
            )
        }
    }

    /// Existing person-key column, or keys rebuilt from the key fields
    fn person_keys(&self, master: &Table) -> std::result::Result<Vec<String>, String> {
        let column = &self.config.keys.person_key_column;
        if master.has_column(column) {
            return Ok((0..master.len())
                .map(|i| {
                    master
                        .get(i, column)
                        .and_then(|v| v.canonical())
                        .unwrap_or_default()
                })
                .collect());
        }

        let builder = KeyBuilder::new(&self.config.keys).map_err(|e| e.to_string())?;
        builder
            .person_keys(master, self.config.base_line_field(), "master")
            .map_err(|e| format!("person keys could not be built: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn master(rows: &[&str]) -> Table {
        let rows = rows
            .iter()
            .map(|hh| {
                vec![
                    Value::from(2023),
                    Value::from(1),
                    Value::from("001"),
                    Value::from("01"),
                    Value::from(*hh),
                    Value::from("01"),
                ]
            })
            .collect();
        Table::from_rows("master", &["YEAR", "QUARTER", "PSU", "EA", "HH_NO", "HR_LN"], rows)
            .unwrap()
    }

    #[test]
    fn test_unique_keys_pass() {
        let config = PipelineConfig::default();
        let report = QualityChecker::new(&config).check(&master(&["0001", "0002"]));

        println!("{}", report.summary());
        assert!(report.all_passed());
    }

    #[test]
    fn test_duplicate_keys_fail_with_count() {
        let config = PipelineConfig::default();
        let result = QualityChecker::new(&config)
            .check_uniqueness(&master(&["0001", "0001", "0001", "0002", "0002", "0003"]));

        assert!(!result.passed);
        assert_eq!(result.offending, 2);
        assert!(result.detail.contains("3 surplus rows"));
    }

    #[test]
    fn test_uniqueness_uses_person_key_column_when_present() {
        let config = PipelineConfig::default();
        let table = Table::from_rows(
            "master",
            &["PERSON_KEY"],
            vec![vec![Value::from("a")], vec![Value::from("a")]],
        )
        .unwrap();

        let result = QualityChecker::new(&config).check_uniqueness(&table);
        assert!(!result.passed);
        assert_eq!(result.offending, 1);
    }

    #[test]
    fn test_missing_key_variable_fails() {
        let config = PipelineConfig::default();
        let table = master(&["0001"]).select_columns(|c| c != "EA" && c != "HR_LN");

        let result = QualityChecker::new(&config).check_key_presence(&table);
        assert!(!result.passed);
        assert_eq!(result.offending, 2);
        assert!(result.detail.contains("EA"));
        assert!(result.detail.contains("HR_LN"));
    }
}
