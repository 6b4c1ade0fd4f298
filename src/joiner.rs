// 🔗 Joiner - Left-join sequence onto the roster base
//
//   roster ⟕ employment (person key)
//          ⟕ migration  (person key)
//          ⟕ household  (household key derived from each row)
//
// Every left row survives. Duplicate right-side keys fan out rather than
// being resolved here; they are reported back so the caller can warn.

use crate::config::{ModuleConfig, ModuleKind, PipelineConfig};
use crate::error::{MergeError, Result};
use crate::keys::KeyBuilder;
use crate::table::{Table, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

// ============================================================================
// JOIN REPORTS
// ============================================================================

/// What one left-join did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinStepReport {
    pub module: String,
    pub rows_in: usize,
    pub rows_out: usize,

    /// Left rows that found at least one partner
    pub matched_rows: usize,

    /// Right-side keys held by more than one row, sorted
    pub duplicate_keys: Vec<String>,

    /// (original, renamed) for every right column that collided
    pub renamed_columns: Vec<(String, String)>,
}

impl JoinStepReport {
    pub fn fanned_out(&self) -> bool {
        self.rows_out > self.rows_in
    }
}

/// Stacked modules in configuration order (base first)
#[derive(Debug, Clone)]
pub struct StackedModules {
    pub base: Table,
    pub joined: Vec<Table>,
}

#[derive(Debug, Clone)]
pub struct JoinResult {
    pub master: Table,
    pub steps: Vec<JoinStepReport>,
}

// ============================================================================
// LEFT JOIN
// ============================================================================

/// Left-join `right` onto `left` where `left[left_key_column]` equals the
/// precomputed `right_keys[i]` of right row `i`.
///
/// Right columns whose names are already taken get `suffix` appended
/// (repeatedly, until free). Unmatched left rows receive Missing for all
/// right-hand columns.
pub fn left_join(
    left: &Table,
    left_key_column: &str,
    right: &Table,
    right_keys: &[String],
    module: &str,
    suffix: &str,
) -> Result<(Table, JoinStepReport)> {
    let key_idx = left.column_index(left_key_column).ok_or_else(|| {
        MergeError::Config(format!(
            "left table '{}' has no key column '{}'",
            left.name(),
            left_key_column
        ))
    })?;

    let mut index: HashMap<&str, Vec<usize>> = HashMap::with_capacity(right.len());
    for (row, key) in right_keys.iter().enumerate() {
        index.entry(key.as_str()).or_default().push(row);
    }

    let mut duplicate_keys: Vec<String> = index
        .iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(key, _)| key.to_string())
        .collect();
    duplicate_keys.sort();

    // Output columns: left as-is, then right with collision suffixes
    let mut taken: HashSet<String> = left.columns().iter().cloned().collect();
    let mut columns: Vec<String> = left.columns().to_vec();
    let mut renamed_columns = Vec::new();
    for column in right.columns() {
        let mut name = column.clone();
        while taken.contains(&name) {
            name.push_str(suffix);
        }
        if &name != column {
            renamed_columns.push((column.clone(), name.clone()));
        }
        taken.insert(name.clone());
        columns.push(name);
    }

    let mut joined = Table::new(left.name(), columns)?;
    let right_width = right.columns().len();
    let mut matched_rows = 0;

    for left_row in left.rows() {
        let key = left_row[key_idx].canonical();
        let partners = key.as_deref().and_then(|k| index.get(k));

        match partners {
            Some(rows) => {
                matched_rows += 1;
                for &r in rows {
                    let mut row = left_row.clone();
                    row.extend(right.rows()[r].iter().cloned());
                    joined.push_row(row);
                }
            }
            None => {
                let mut row = left_row.clone();
                row.extend(std::iter::repeat(Value::Missing).take(right_width));
                joined.push_row(row);
            }
        }
    }

    let report = JoinStepReport {
        module: module.to_string(),
        rows_in: left.len(),
        rows_out: joined.len(),
        matched_rows,
        duplicate_keys,
        renamed_columns,
    };
    Ok((joined, report))
}

/// Copy of `table` with one extra trailing column
fn with_column(table: &Table, column: &str, values: Vec<String>) -> Result<Table> {
    let mut columns = table.columns().to_vec();
    columns.push(column.to_string());

    let mut out = Table::new(table.name(), columns)?;
    for (row, value) in table.rows().iter().zip(values) {
        let mut row = row.clone();
        row.push(Value::Text(value));
        out.push_row(row);
    }
    Ok(out)
}

// ============================================================================
// JOINER
// ============================================================================

pub struct Joiner<'a> {
    config: &'a PipelineConfig,
    keys: KeyBuilder,
}

impl<'a> Joiner<'a> {
    pub fn new(config: &'a PipelineConfig) -> Result<Self> {
        Ok(Joiner {
            config,
            keys: KeyBuilder::new(&config.keys)?,
        })
    }

    /// Run the three left-joins in configuration order
    pub fn join(&self, stacked: &StackedModules) -> Result<JoinResult> {
        let joined_modules = self.config.joined_modules();
        if stacked.joined.len() != joined_modules.len() {
            return Err(MergeError::Config(format!(
                "expected {} joined module tables, got {}",
                joined_modules.len(),
                stacked.joined.len()
            )));
        }

        let base = self.config.base_module();
        let layout = &self.config.keys;

        let base_keys =
            self.keys
                .person_keys(&stacked.base, self.config.base_line_field(), &base.name)?;
        let mut current = with_column(&stacked.base, &layout.person_key_column, base_keys)?
            .with_name("master");

        let mut steps = Vec::with_capacity(joined_modules.len());
        for (module, right) in joined_modules.iter().zip(&stacked.joined) {
            let (next, report) = self.join_module(&current, module, right)?;
            info!(
                module = %module.name,
                rows_in = report.rows_in,
                rows_out = report.rows_out,
                matched = report.matched_rows,
                "left join complete"
            );
            current = next;
            steps.push(report);
        }

        Ok(JoinResult {
            master: current,
            steps,
        })
    }

    fn join_module(
        &self,
        left: &Table,
        module: &ModuleConfig,
        right: &Table,
    ) -> Result<(Table, JoinStepReport)> {
        let layout = &self.config.keys;

        match module.kind {
            ModuleKind::Person => {
                let line_field = module.line_field.as_deref().unwrap_or_default();
                let right_keys = self.keys.person_keys(right, line_field, &module.name)?;
                left_join(
                    left,
                    &layout.person_key_column,
                    right,
                    &right_keys,
                    &module.name,
                    &module.suffix,
                )
            }
            ModuleKind::Household => {
                let base_name = &self.config.base_module().name;
                let left_keys = self.keys.household_keys(left, base_name)?;
                let keyed = with_column(left, &layout.household_key_column, left_keys)?;
                let right_keys = self.keys.household_keys(right, &module.name)?;
                left_join(
                    &keyed,
                    &layout.household_key_column,
                    right,
                    &right_keys,
                    &module.name,
                    &module.suffix,
                )
            }
        }
    }
}
