// ⚖️ Benchmark Validator - Compare merged weighted ratios to published figures
//
//   A = Σw(youth, unemployed) / Σw(youth, employed ∪ unemployed) × 100
//   B = Σw(unemployed, youth) / Σw(unemployed)                   × 100
//
// Only working-age rows whose quarter selects a usable weight take part.
// Sums run in row order, so the same table always yields the same bits.

use crate::config::{Benchmark, BenchmarkSet, ValidationConfig};
use crate::error::Result;
use crate::table::{Record, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const YOUTH_UNEMPLOYMENT_RATE: &str = "youth_unemployment_rate";
pub const YOUTH_SHARE_OF_UNEMPLOYED: &str = "youth_share_of_unemployed";

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticResult {
    pub statistic_name: String,

    /// None when the denominator had no weight at all
    pub calculated_value: Option<f64>,
    pub published_value: f64,
    pub absolute_difference: Option<f64>,
    pub tolerance: f64,
    pub pass_flag: bool,
}

impl StatisticResult {
    fn evaluate(name: &str, calculated: Option<f64>, benchmark: Benchmark) -> Self {
        let absolute_difference = calculated.map(|v| (v - benchmark.published).abs());
        StatisticResult {
            statistic_name: name.to_string(),
            calculated_value: calculated,
            published_value: benchmark.published,
            absolute_difference,
            tolerance: benchmark.tolerance,
            pass_flag: absolute_difference.map_or(false, |d| d < benchmark.tolerance),
        }
    }

    pub fn summary(&self) -> String {
        match (self.calculated_value, self.absolute_difference) {
            (Some(value), Some(diff)) => format!(
                "{} {}: calculated {:.2}, published {:.1}, difference {:.2} (tolerance {:.1})",
                if self.pass_flag { "✓" } else { "✗" },
                self.statistic_name,
                value,
                self.published_value,
                diff,
                self.tolerance
            ),
            _ => format!(
                "✗ {}: no weighted rows in denominator, published {:.1}",
                self.statistic_name, self.published_value
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub dataset_year: u32,
    pub statistics: Vec<StatisticResult>,

    /// Logical AND of every statistic's pass flag
    pub overall_pass: bool,

    /// Working-age rows that contributed
    pub included_rows: usize,

    /// Working-age rows dropped for an unusable quarter or missing weight
    pub excluded_rows: usize,

    pub computed_at: DateTime<Utc>,
}

impl ValidationReport {
    pub fn statistic(&self, name: &str) -> Option<&StatisticResult> {
        self.statistics.iter().find(|s| s.statistic_name == name)
    }

    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self.statistics.iter().map(|s| s.summary()).collect();
        lines.push(format!(
            "Validation {} ({} rows used, {} excluded)",
            if self.overall_pass { "PASSED" } else { "FAILED" },
            self.included_rows,
            self.excluded_rows
        ));
        lines.join("\n")
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Weighted running sums for both statistics
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    youth_unemployed: f64,
    youth_labor_force: f64,
    unemployed_youth: f64,
    unemployed_all: f64,
}

pub struct Validator {
    config: ValidationConfig,
    benchmarks: BenchmarkSet,
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Result<Self> {
        Ok(Validator {
            benchmarks: config.active_benchmarks()?,
            config: config.clone(),
        })
    }

    /// Compute both statistics on `master`; the table is only read
    pub fn validate(&self, master: &Table) -> ValidationReport {
        let cfg = &self.config;
        let mut tally = Tally::default();
        let mut included_rows = 0;
        let mut excluded_rows = 0;

        for record in master.records() {
            let Some(age) = record.get(&cfg.age_field).and_then(|v| v.as_f64()) else {
                continue;
            };
            if age < cfg.working_age_min {
                continue;
            }

            let Some(weight) = self.weight_of(&record) else {
                excluded_rows += 1;
                continue;
            };
            included_rows += 1;

            let status = record.get(&cfg.status_field).and_then(|v| v.canonical());
            let employed = status.as_deref() == Some(cfg.employed_code.as_str());
            let unemployed = status.as_deref() == Some(cfg.unemployed_code.as_str());
            let youth = age >= cfg.youth_min && age <= cfg.youth_max;

            if youth && (employed || unemployed) {
                tally.youth_labor_force += weight;
                if unemployed {
                    tally.youth_unemployed += weight;
                }
            }
            if unemployed {
                tally.unemployed_all += weight;
                if youth {
                    tally.unemployed_youth += weight;
                }
            }
        }

        let statistics = vec![
            StatisticResult::evaluate(
                YOUTH_UNEMPLOYMENT_RATE,
                percentage(tally.youth_unemployed, tally.youth_labor_force),
                self.benchmarks.youth_unemployment_rate,
            ),
            StatisticResult::evaluate(
                YOUTH_SHARE_OF_UNEMPLOYED,
                percentage(tally.unemployed_youth, tally.unemployed_all),
                self.benchmarks.youth_share_of_unemployed,
            ),
        ];
        let overall_pass = statistics.iter().all(|s| s.pass_flag);

        ValidationReport {
            dataset_year: cfg.dataset_year,
            statistics,
            overall_pass,
            included_rows,
            excluded_rows,
            computed_at: Utc::now(),
        }
    }

    /// Quarter 1..=4 selects weight field 1..=4; anything else has no weight
    fn weight_of(&self, record: &Record<'_>) -> Option<f64> {
        let quarter = record.get(&self.config.quarter_field)?.as_f64()?;
        if quarter.fract() != 0.0 || !(1.0..=4.0).contains(&quarter) {
            return None;
        }
        let field = &self.config.weight_fields[quarter as usize - 1];
        record.get(field)?.as_f64()
    }
}

fn percentage(part: f64, whole: f64) -> Option<f64> {
    if whole > 0.0 {
        Some(part / whole * 100.0)
    } else {
        None
    }
}
