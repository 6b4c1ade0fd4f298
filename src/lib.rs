// Survey Merge - Core Library
// Merges the quarterly labour-force survey modules into one person-level
// file and checks it against published benchmark statistics.

pub mod config;
pub mod error;
pub mod joiner;
pub mod keys;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod quality;
pub mod reconciler;
pub mod stacker;
pub mod table;
pub mod validator;
pub mod writer;

// Re-export commonly used types
pub use config::{
    Benchmark, BenchmarkSet, KeyLayout, KeyPadding, ModuleConfig, ModuleKind, PipelineConfig,
    ValidationConfig,
};
pub use error::{MergeError, PipelineWarning, Result};
pub use joiner::{left_join, JoinResult, JoinStepReport, Joiner, StackedModules};
pub use keys::KeyBuilder;
pub use loader::{load_csv_table, load_module};
pub use pipeline::{ModuleInputs, Pipeline, PipelineOutput, RunSummary, StageCount};
pub use quality::{CheckResult, QualityChecker, QualityReport};
pub use reconciler::{ColumnReconciler, ReconcileReport};
pub use stacker::{stack, Partition};
pub use table::{ColumnType, Record, Table, Value};
pub use validator::{StatisticResult, ValidationReport, Validator};
pub use writer::{write_csv, write_report, write_sqlite};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
