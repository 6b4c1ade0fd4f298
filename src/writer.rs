// 💾 Data Writer - Master table to CSV / SQLite, run summary to JSON

use crate::error::Result;
use crate::table::{ColumnType, Table, Value};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Header row, then one line per row; Missing is an empty cell
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|v| v.canonical().unwrap_or_default()))?;
    }
    wtr.flush()?;

    info!(path = %path.display(), rows = table.len(), "wrote CSV");
    Ok(())
}

/// Store the table in SQLite (WAL mode), replacing any table of that name
pub fn write_sqlite(table: &Table, path: &Path, table_name: &str) -> Result<()> {
    let mut conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;

    let definitions: Vec<String> = table
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(c), sql_type(table, c)))
        .collect();
    let placeholders = vec!["?"; table.columns().len()].join(", ");

    let tx = conn.transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table_name)), [])?;
    tx.execute(
        &format!(
            "CREATE TABLE {} ({})",
            quote_ident(table_name),
            definitions.join(", ")
        ),
        [],
    )?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            quote_ident(table_name),
            placeholders
        ))?;
        for row in table.rows() {
            stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
        }
    }
    tx.commit()?;

    info!(path = %path.display(), table = table_name, rows = table.len(), "wrote SQLite");
    Ok(())
}

/// Pretty JSON of any serializable report
pub fn write_report<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(table: &Table, column: &str) -> &'static str {
    match table.column_type(column) {
        Some(ColumnType::Numeric) => "REAL",
        _ => "TEXT",
    }
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Int(i) => Sql::Integer(*i),
        Value::Float(f) if f.is_nan() => Sql::Null,
        Value::Float(f) => Sql::Real(*f),
        Value::Text(s) => Sql::Text(s.clone()),
        Value::Missing => Sql::Null,
    }
}
