// 🔑 Key Builder - Canonical person and household identifiers
//
// PersonKey    = year _ quarter _ psu _ ea _ household_no _ person_line
// HouseholdKey = year _ quarter _ psu _ ea _ household_no
//
// Components are rendered in their canonical string form. Zero-padding is
// applied only when a width is configured, and only to digit-only values.

use crate::config::{KeyLayout, KeyPadding};
use crate::error::{MergeError, Result};
use crate::table::{Record, Table};

pub struct KeyBuilder {
    household_fields: [String; 5],
    delimiter: char,
    padding: KeyPadding,
}

impl KeyBuilder {
    pub fn new(layout: &KeyLayout) -> Result<Self> {
        Ok(KeyBuilder {
            household_fields: layout.household_fields().map(str::to_string),
            delimiter: layout.delimiter_char()?,
            padding: layout.padding.clone(),
        })
    }

    /// Key of one person: household fields followed by `line_field`
    pub fn person_key(&self, record: &Record<'_>, line_field: &str, module: &str) -> Result<String> {
        let widths = self.padding.widths();
        let mut parts = Vec::with_capacity(6);
        for (field, width) in self.household_fields.iter().zip(widths) {
            parts.push(self.component(record, field, width, module)?);
        }
        parts.push(self.component(record, line_field, widths[5], module)?);
        Ok(self.join(&parts))
    }

    /// Key of one household (no person line)
    pub fn household_key(&self, record: &Record<'_>, module: &str) -> Result<String> {
        let widths = self.padding.widths();
        let mut parts = Vec::with_capacity(5);
        for (field, width) in self.household_fields.iter().zip(widths) {
            parts.push(self.component(record, field, width, module)?);
        }
        Ok(self.join(&parts))
    }

    /// Person keys for every row, in row order. Fails on the first bad row.
    pub fn person_keys(&self, table: &Table, line_field: &str, module: &str) -> Result<Vec<String>> {
        table
            .records()
            .map(|record| self.person_key(&record, line_field, module))
            .collect()
    }

    /// Household keys for every row, in row order
    pub fn household_keys(&self, table: &Table, module: &str) -> Result<Vec<String>> {
        table
            .records()
            .map(|record| self.household_key(&record, module))
            .collect()
    }

    fn join(&self, parts: &[String]) -> String {
        let mut buf = [0u8; 4];
        parts.join(&*self.delimiter.encode_utf8(&mut buf))
    }

    fn component(
        &self,
        record: &Record<'_>,
        field: &str,
        width: Option<usize>,
        module: &str,
    ) -> Result<String> {
        let (quarter, row) = match record.origin() {
            Some((quarter, offset)) => (Some(quarter), offset + 1),
            None => (None, record.row_index() + 1),
        };
        let fail = |reason: &str| MergeError::KeyConstruction {
            module: module.to_string(),
            quarter,
            row,
            field: field.to_string(),
            reason: reason.to_string(),
        };

        let value = record
            .get(field)
            .ok_or_else(|| fail("is not a column of this table"))?;
        let text = value.canonical().ok_or_else(|| fail("is missing"))?;

        if text.is_empty() {
            return Err(fail("is empty"));
        }
        if text.contains(self.delimiter) {
            return Err(fail("contains the key delimiter"));
        }

        Ok(match width {
            Some(w) if text.len() < w && text.bytes().all(|b| b.is_ascii_digit()) => {
                format!("{:0>width$}", text, width = w)
            }
            _ => text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacker::{stack, Partition};
    use crate::table::Value;

    fn roster_row(hh: Value, line: Value) -> Table {
        Table::from_rows(
            "roster",
            &["YEAR", "QUARTER", "PSU", "EA", "HH_NO", "HR_LN"],
            vec![vec![
                Value::from(2023),
                Value::from(1),
                Value::from("001"),
                Value::from("01"),
                hh,
                line,
            ]],
        )
        .unwrap()
    }

    #[test]
    fn test_person_key_fixed_order() {
        let builder = KeyBuilder::new(&KeyLayout::default()).unwrap();
        let table = roster_row(Value::from("0001"), Value::from("01"));

        let key = builder.person_key(&table.record(0), "HR_LN", "roster").unwrap();
        assert_eq!(key, "2023_1_001_01_0001_01");
    }

    #[test]
    fn test_household_key_drops_person_line() {
        let builder = KeyBuilder::new(&KeyLayout::default()).unwrap();
        let table = roster_row(Value::from("0001"), Value::from("01"));

        let key = builder.household_key(&table.record(0), "roster").unwrap();
        assert_eq!(key, "2023_1_001_01_0001");
    }

    #[test]
    fn test_no_padding_by_default() {
        let builder = KeyBuilder::new(&KeyLayout::default()).unwrap();
        let table = roster_row(Value::from(1), Value::from(1.0));

        let key = builder.person_key(&table.record(0), "HR_LN", "roster").unwrap();
        assert_eq!(key, "2023_1_001_01_1_1");
    }

    #[test]
    fn test_configured_padding_normalizes_numbers() {
        let mut layout = KeyLayout::default();
        layout.padding = KeyPadding {
            psu: Some(3),
            ea: Some(2),
            household: Some(4),
            person_line: Some(2),
            ..KeyPadding::default()
        };
        let builder = KeyBuilder::new(&layout).unwrap();

        let padded = roster_row(Value::from(1), Value::from(1));
        let already = roster_row(Value::from("0001"), Value::from("01"));

        let a = builder.person_key(&padded.record(0), "HR_LN", "roster").unwrap();
        let b = builder.person_key(&already.record(0), "HR_LN", "roster").unwrap();
        assert_eq!(a, "2023_1_001_01_0001_01");
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_field_is_key_construction_error() {
        let builder = KeyBuilder::new(&KeyLayout::default()).unwrap();
        let table = roster_row(Value::Missing, Value::from("01"));

        let err = builder
            .person_key(&table.record(0), "HR_LN", "roster")
            .unwrap_err();
        match err {
            MergeError::KeyConstruction { module, field, .. } => {
                assert_eq!(module, "roster");
                assert_eq!(field, "HH_NO");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_key_error_located_within_its_quarter() {
        let builder = KeyBuilder::new(&KeyLayout::default()).unwrap();
        let columns = ["YEAR", "QUARTER", "PSU", "EA", "HH_NO", "HR_LN"];
        let row = |q: i64, hh: Value| {
            vec![Value::from(2023), Value::from(q), Value::from(1), Value::from(1), hh, Value::from(1)]
        };
        let partitions = vec![
            Partition::new(
                1,
                Table::from_rows("roster", &columns, vec![row(1, Value::from(1)), row(1, Value::from(2))])
                    .unwrap(),
            ),
            Partition::new(
                2,
                Table::from_rows("roster", &columns, vec![row(2, Value::from(1)), row(2, Value::Missing)])
                    .unwrap(),
            ),
        ];
        let stacked = stack("roster", &partitions).unwrap();

        let err = builder.person_keys(&stacked, "HR_LN", "roster").unwrap_err();
        match err {
            MergeError::KeyConstruction { quarter, row, field, .. } => {
                assert_eq!(quarter, Some(2));
                assert_eq!(row, 2);
                assert_eq!(field, "HH_NO");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unstacked_table_reports_table_row() {
        let builder = KeyBuilder::new(&KeyLayout::default()).unwrap();
        let table = roster_row(Value::Missing, Value::from("01"));

        let err = builder.household_key(&table.record(0), "roster").unwrap_err();
        assert!(matches!(err, MergeError::KeyConstruction { quarter: None, row: 1, .. }));
    }

    #[test]
    fn test_absent_line_column_is_key_construction_error() {
        let builder = KeyBuilder::new(&KeyLayout::default()).unwrap();
        let table = roster_row(Value::from("0001"), Value::from("01"));

        let err = builder.person_key(&table.record(0), "EMP_HRLN", "employment");
        assert!(matches!(err, Err(MergeError::KeyConstruction { .. })));
    }

    #[test]
    fn test_delimiter_inside_value_rejected() {
        let builder = KeyBuilder::new(&KeyLayout::default()).unwrap();
        let table = roster_row(Value::from("00_1"), Value::from("01"));

        assert!(builder.household_key(&table.record(0), "roster").is_err());
    }
}
