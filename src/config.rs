// ⚙️ Pipeline Configuration - Layout as Data
// Key layout, per-module join settings and benchmark constants, loaded from JSON
//
// Every name the pipeline relies on lives here, so pointing the merge at a
// different survey round means editing a file, not the code.

use crate::error::{MergeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// KEY LAYOUT
// ============================================================================

/// Field names of the composite person / household key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLayout {
    pub year_field: String,
    pub quarter_field: String,
    pub psu_field: String,
    pub ea_field: String,
    pub household_field: String,

    /// Single character placed between key components
    pub delimiter: String,

    /// Output column holding the person key on the master table
    pub person_key_column: String,

    /// Output column holding the household key on the master table
    pub household_key_column: String,

    /// Optional zero-padding of key components (off unless configured)
    pub padding: KeyPadding,
}

impl Default for KeyLayout {
    fn default() -> Self {
        KeyLayout {
            year_field: "YEAR".to_string(),
            quarter_field: "QUARTER".to_string(),
            psu_field: "PSU".to_string(),
            ea_field: "EA".to_string(),
            household_field: "HH_NO".to_string(),
            delimiter: "_".to_string(),
            person_key_column: "PERSON_KEY".to_string(),
            household_key_column: "HH_KEY".to_string(),
            padding: KeyPadding::default(),
        }
    }
}

impl KeyLayout {
    /// Household-level key fields, in key order
    pub fn household_fields(&self) -> [&str; 5] {
        [
            &self.year_field,
            &self.quarter_field,
            &self.psu_field,
            &self.ea_field,
            &self.household_field,
        ]
    }

    pub fn delimiter_char(&self) -> Result<char> {
        let mut chars = self.delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(MergeError::Config(format!(
                "key delimiter must be exactly one character, got {:?}",
                self.delimiter
            ))),
        }
    }
}

/// Fixed widths for zero-padding digit-only key components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPadding {
    pub year: Option<usize>,
    pub quarter: Option<usize>,
    pub psu: Option<usize>,
    pub ea: Option<usize>,
    pub household: Option<usize>,
    pub person_line: Option<usize>,
}

impl KeyPadding {
    /// Widths aligned with `KeyLayout::household_fields` followed by the person line
    pub fn widths(&self) -> [Option<usize>; 6] {
        [
            self.year,
            self.quarter,
            self.psu,
            self.ea,
            self.household,
            self.person_line,
        ]
    }
}

// ============================================================================
// MODULES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Keyed by person (household key + person line)
    Person,
    /// Keyed by household only
    Household,
}

/// One survey module: how its files are named, how it is keyed, and which
/// duplicate columns to drop once it has been joined
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    pub kind: ModuleKind,

    /// Person-line field (person modules only)
    #[serde(default)]
    pub line_field: Option<String>,

    /// Suffix appended to colliding column names when joined
    #[serde(default)]
    pub suffix: String,

    /// File name with a `{quarter}` placeholder
    pub file_pattern: String,

    /// Suffixed duplicates removed by the reconciler
    #[serde(default)]
    pub always_drop: Vec<String>,
}

impl ModuleConfig {
    pub fn file_name(&self, quarter: u8) -> String {
        self.file_pattern.replace("{quarter}", &quarter.to_string())
    }
}

// ============================================================================
// VALIDATION / BENCHMARKS
// ============================================================================

/// A published reference value and the accepted absolute deviation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub published: f64,
    pub tolerance: f64,
}

/// Published statistics for one survey round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSet {
    pub youth_unemployment_rate: Benchmark,
    pub youth_share_of_unemployed: Benchmark,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub age_field: String,
    pub quarter_field: String,

    /// Weight field per quarter (index 0 → quarter 1)
    pub weight_fields: [String; 4],

    pub status_field: String,
    pub employed_code: String,
    pub unemployed_code: String,
    pub working_age_min: f64,
    pub youth_min: f64,
    pub youth_max: f64,

    /// Selects the active entry of `benchmarks`
    pub dataset_year: u32,
    pub benchmarks: BTreeMap<u32, BenchmarkSet>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let mut benchmarks = BTreeMap::new();
        benchmarks.insert(
            2023,
            BenchmarkSet {
                youth_unemployment_rate: Benchmark {
                    published: 7.2,
                    tolerance: 0.1,
                },
                youth_share_of_unemployed: Benchmark {
                    published: 78.9,
                    tolerance: 0.2,
                },
            },
        );

        ValidationConfig {
            age_field: "HR_AGE".to_string(),
            quarter_field: "QUARTER".to_string(),
            weight_fields: [
                "WGT_Q1".to_string(),
                "WGT_Q2".to_string(),
                "WGT_Q3".to_string(),
                "WGT_Q4".to_string(),
            ],
            status_field: "LF_STATUS".to_string(),
            employed_code: "1".to_string(),
            unemployed_code: "2".to_string(),
            working_age_min: 15.0,
            youth_min: 15.0,
            youth_max: 29.0,
            dataset_year: 2023,
            benchmarks,
        }
    }
}

impl ValidationConfig {
    pub fn active_benchmarks(&self) -> Result<BenchmarkSet> {
        self.benchmarks
            .get(&self.dataset_year)
            .copied()
            .ok_or_else(|| {
                MergeError::Config(format!(
                    "no published benchmarks configured for dataset year {}",
                    self.dataset_year
                ))
            })
    }
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub keys: KeyLayout,

    /// Base module first, then the joined modules in join order
    pub modules: Vec<ModuleConfig>,

    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let keys = KeyLayout::default();
        let modules = vec![
            ModuleConfig {
                name: "roster".to_string(),
                kind: ModuleKind::Person,
                line_field: Some("HR_LN".to_string()),
                suffix: String::new(),
                file_pattern: "roster_q{quarter}.csv".to_string(),
                always_drop: Vec::new(),
            },
            ModuleConfig {
                name: "employment".to_string(),
                kind: ModuleKind::Person,
                line_field: Some("EMP_HRLN".to_string()),
                suffix: "_emp".to_string(),
                file_pattern: "employment_q{quarter}.csv".to_string(),
                always_drop: default_drop_list(&keys, "_emp"),
            },
            ModuleConfig {
                name: "migration".to_string(),
                kind: ModuleKind::Person,
                line_field: Some("MGT_LN".to_string()),
                suffix: "_mig".to_string(),
                file_pattern: "migration_q{quarter}.csv".to_string(),
                always_drop: default_drop_list(&keys, "_mig"),
            },
            ModuleConfig {
                name: "household".to_string(),
                kind: ModuleKind::Household,
                line_field: None,
                suffix: "_hh".to_string(),
                file_pattern: "household_q{quarter}.csv".to_string(),
                always_drop: default_drop_list(&keys, "_hh"),
            },
        ];

        PipelineConfig {
            keys,
            modules,
            validation: ValidationConfig::default(),
        }
    }
}

/// Key fields re-contributed by a joined module, plus the geography and
/// weight columns every module repeats
fn default_drop_list(keys: &KeyLayout, suffix: &str) -> Vec<String> {
    let repeated = [
        "REGION", "DISTRICT", "URBRUR", "WGT_Q1", "WGT_Q2", "WGT_Q3", "WGT_Q4",
    ];

    keys.household_fields()
        .iter()
        .copied()
        .chain(repeated)
        .map(|field| format!("{}{}", field, suffix))
        .collect()
}

impl PipelineConfig {
    /// Load configuration from a JSON file; absent sections fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            MergeError::Config(format!(
                "failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn base_module(&self) -> &ModuleConfig {
        &self.modules[0]
    }

    pub fn joined_modules(&self) -> &[ModuleConfig] {
        &self.modules[1..]
    }

    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Person-line field of the base module
    pub fn base_line_field(&self) -> &str {
        self.base_module().line_field.as_deref().unwrap_or_default()
    }

    /// Reject layouts the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.keys.delimiter_char()?;

        if self.modules.len() != 4 {
            return Err(MergeError::Config(format!(
                "expected 4 modules (base + 3 joined), found {}",
                self.modules.len()
            )));
        }

        let kinds: Vec<ModuleKind> = self.modules.iter().map(|m| m.kind).collect();
        if kinds
            != [
                ModuleKind::Person,
                ModuleKind::Person,
                ModuleKind::Person,
                ModuleKind::Household,
            ]
        {
            return Err(MergeError::Config(
                "module order must be: person base, two person modules, household module"
                    .to_string(),
            ));
        }

        for module in &self.modules {
            if module.kind == ModuleKind::Person
                && module.line_field.as_deref().map_or(true, str::is_empty)
            {
                return Err(MergeError::Config(format!(
                    "person module '{}' has no line_field",
                    module.name
                )));
            }
            if !module.file_pattern.contains("{quarter}") {
                return Err(MergeError::Config(format!(
                    "file_pattern of module '{}' lacks a {{quarter}} placeholder",
                    module.name
                )));
            }
        }

        let mut suffixes: Vec<&str> = self
            .joined_modules()
            .iter()
            .map(|m| m.suffix.as_str())
            .collect();
        if suffixes.iter().any(|s| s.is_empty()) {
            return Err(MergeError::Config(
                "every joined module needs a non-empty suffix".to_string(),
            ));
        }
        suffixes.sort_unstable();
        suffixes.dedup();
        if suffixes.len() != self.joined_modules().len() {
            return Err(MergeError::Config(
                "joined module suffixes must be distinct".to_string(),
            ));
        }

        if self.validation.youth_min > self.validation.youth_max {
            return Err(MergeError::Config(
                "youth_min must not exceed youth_max".to_string(),
            ));
        }

        self.validation.active_benchmarks()?;
        Ok(())
    }
}
