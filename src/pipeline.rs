// 🏭 Merge Pipeline - Stack → Join → Reconcile → Check → Validate
//
// Each stage receives the previous stage's table and returns a new one.
// Structural errors abort the run; warnings are gathered into the summary.

use crate::config::PipelineConfig;
use crate::error::{MergeError, PipelineWarning, Result};
use crate::joiner::{JoinStepReport, Joiner, StackedModules};
use crate::loader;
use crate::quality::{QualityChecker, QualityReport};
use crate::reconciler::{ColumnReconciler, ReconcileReport};
use crate::stacker::{self, Partition};
use crate::table::Table;
use crate::validator::{ValidationReport, Validator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// INPUTS
// ============================================================================

/// Quarterly partitions per module name
#[derive(Debug, Clone, Default)]
pub struct ModuleInputs {
    partitions: BTreeMap<String, Vec<Partition>>,
}

impl ModuleInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: impl Into<String>, partitions: Vec<Partition>) {
        self.partitions.insert(module.into(), partitions);
    }

    pub fn with(mut self, module: impl Into<String>, partitions: Vec<Partition>) -> Self {
        self.insert(module, partitions);
        self
    }

    /// Load all sixteen partitions named by the configuration
    pub fn from_dir(dir: &Path, config: &PipelineConfig) -> Result<Self> {
        let mut inputs = ModuleInputs::new();
        for module in &config.modules {
            inputs.insert(module.name.clone(), loader::load_module(dir, module)?);
        }
        Ok(inputs)
    }

    fn take(&mut self, module: &str) -> Result<Vec<Partition>> {
        self.partitions.remove(module).ok_or_else(|| {
            MergeError::Config(format!("no input partitions supplied for module '{}'", module))
        })
    }
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCount {
    pub stage: String,
    pub rows_in: usize,
    pub rows_out: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageCount>,
    pub joins: Vec<JoinStepReport>,
    pub reconcile: ReconcileReport,
    pub quality: QualityReport,
    pub validation: ValidationReport,
    pub warnings: Vec<PipelineWarning>,

    /// SHA-256 of the master table's canonical CSV rendering
    pub master_fingerprint: String,
    pub master_rows: usize,
    pub master_columns: usize,

    /// Validation verdict for downstream consumers
    pub overall_pass: bool,
}

impl RunSummary {
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Run {}\n", self.run_id));
        out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        for stage in &self.stages {
            out.push_str(&format!(
                "  {:<24} {:>8} → {:>8}\n",
                stage.stage, stage.rows_in, stage.rows_out
            ));
        }
        out.push_str(&format!(
            "  master: {} rows × {} columns ({} duplicate columns dropped)\n",
            self.master_rows,
            self.master_columns,
            self.reconcile.dropped.len()
        ));
        out.push_str(&format!("  fingerprint: {}\n\n", self.master_fingerprint));

        out.push_str(&self.quality.summary());
        out.push_str("\n\n");

        if self.warnings.is_empty() {
            out.push_str("No warnings\n\n");
        } else {
            out.push_str(&format!("{} warning(s):\n", self.warnings.len()));
            for warning in &self.warnings {
                out.push_str(&format!("  ⚠️  {}\n", warning));
            }
            out.push('\n');
        }

        out.push_str(&self.validation.summary());
        out
    }
}

/// Final table plus everything learned while producing it
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub master: Table,
    pub summary: RunSummary,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, mut inputs: ModuleInputs) -> Result<PipelineOutput> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut stages = Vec::new();
        let mut warnings = Vec::new();

        info!(run_id = %run_id, "starting merge");

        // 1. Stack every module before any join is attempted
        let mut stacked_tables = Vec::with_capacity(self.config.modules.len());
        for module in &self.config.modules {
            let partitions = inputs.take(&module.name)?;
            let rows_in: usize = partitions.iter().map(|p| p.table.len()).sum();
            let table = stacker::stack(&module.name, &partitions)?;
            info!(module = %module.name, rows = table.len(), columns = table.columns().len(), "stacked");
            stages.push(StageCount {
                stage: format!("stack {}", module.name),
                rows_in,
                rows_out: table.len(),
            });
            stacked_tables.push(table);
        }

        let base = stacked_tables.remove(0);
        let base_rows = base.len();
        let stacked = StackedModules {
            base,
            joined: stacked_tables,
        };

        // 2. Left-join sequence
        let joined = Joiner::new(&self.config)?.join(&stacked)?;
        drop(stacked);

        for step in &joined.steps {
            stages.push(StageCount {
                stage: format!("join {}", step.module),
                rows_in: step.rows_in,
                rows_out: step.rows_out,
            });
            if !step.duplicate_keys.is_empty() {
                warnings.push(PipelineWarning::DuplicateKey {
                    module: step.module.clone(),
                    key_count: step.duplicate_keys.len(),
                    keys: step.duplicate_keys.clone(),
                });
            }
        }
        ensure_base_preserved(base_rows, &joined.master, &joined.steps)?;

        // 3. Drop redundant duplicate columns
        let (master, reconcile) = ColumnReconciler::from_config(&self.config).reconcile(&joined.master);
        let joins = joined.steps;
        stages.push(StageCount {
            stage: "reconcile".to_string(),
            rows_in: master.len(),
            rows_out: master.len(),
        });
        if !reconcile.unknown_duplicates.is_empty() {
            warnings.push(PipelineWarning::UnknownSuffixedColumns {
                columns: reconcile.unknown_duplicates.clone(),
            });
        }

        // 4. Side-channel diagnostics
        let quality = QualityChecker::new(&self.config).check(&master);
        for check in quality.checks() {
            if !check.passed {
                warnings.push(PipelineWarning::QualityCheckFailed {
                    check: check.check.clone(),
                    detail: check.detail.clone(),
                });
            }
        }

        // 5. Benchmark validation
        let validation = Validator::new(&self.config.validation)?.validate(&master);
        if validation.excluded_rows > 0 {
            warnings.push(PipelineWarning::MissingWeight {
                excluded_rows: validation.excluded_rows,
            });
        }

        for warning in &warnings {
            warn!("{}", warning);
        }
        info!(
            overall_pass = validation.overall_pass,
            rows = master.len(),
            "merge finished"
        );

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stages,
            joins,
            reconcile,
            quality,
            overall_pass: validation.overall_pass,
            validation,
            warnings,
            master_fingerprint: fingerprint(&master),
            master_rows: master.len(),
            master_columns: master.columns().len(),
        };

        Ok(PipelineOutput { master, summary })
    }
}

/// Every roster row must survive; only fan-out may add rows
fn ensure_base_preserved(base_rows: usize, master: &Table, steps: &[JoinStepReport]) -> Result<()> {
    let fanned_out = steps.iter().any(|s| !s.duplicate_keys.is_empty());

    if master.len() < base_rows || (!fanned_out && master.len() != base_rows) {
        return Err(MergeError::Invariant(format!(
            "roster had {} rows but the merged table has {}",
            base_rows,
            master.len()
        )));
    }
    Ok(())
}

/// SHA-256 over columns and canonical cell text, unit-separated
pub fn fingerprint(table: &Table) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table.columns().join("\u{1f}"));
    for row in table.rows() {
        hasher.update(b"\n");
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                hasher.update(b"\x1f");
            }
            if let Some(text) = value.canonical() {
                hasher.update(text.as_bytes());
            }
        }
    }
    format!("{:x}", hasher.finalize())
}
