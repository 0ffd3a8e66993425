//! Records and batches handed to the bulk writer

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::security::{split_table_name, validate_identifier};
use crate::types::Value;

/// One logical row: ordered `(column, value)` pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field, builder style
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Add or replace a field
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Value of a column, if present
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Mutable value of a column, if present
    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Whether the record carries a column
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Number of fields
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in insertion order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    /// Fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Values in insertion order, mutable
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.fields.iter_mut().map(|(_, v)| v)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

/// Records bound for one table, with the columns to write and the conflict
/// key that identifies a logical row.
///
/// Table and column names end up in statement text. They must come from the
/// caller's own code, never from end-user input; `validate` only rejects
/// names that are not plain identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    table: String,
    columns: Vec<String>,
    conflict_keys: Vec<String>,
    records: Vec<Record>,
}

impl Batch {
    /// Create an empty batch
    pub fn new<C, K>(table: impl Into<String>, columns: C, conflict_keys: K) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            conflict_keys: conflict_keys.into_iter().map(Into::into).collect(),
            records: Vec::new(),
        }
    }

    /// Append a record
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Append records, builder style
    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    /// Target table (`table` or `schema.table`)
    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns written, in statement order
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Columns whose equality identifies the same logical row
    #[inline]
    pub fn conflict_keys(&self) -> &[String] {
        &self.conflict_keys
    }

    /// Columns that are written but are not part of the conflict key
    pub fn non_key_columns(&self) -> impl Iterator<Item = &String> {
        self.columns
            .iter()
            .filter(|c| !self.conflict_keys.contains(c))
    }

    /// Records in order
    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records in order, mutable
    #[inline]
    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    /// Number of records
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch has no records
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check the batch invariants: identifiers are plain names, columns are
    /// non-empty and unique, conflict keys are a subset of the columns, and
    /// every record carries exactly the batch's column set.
    pub fn validate(&self) -> Result<()> {
        split_table_name(&self.table)?;

        if self.columns.is_empty() {
            return Err(Error::invalid_batch(format!(
                "batch for '{}' has no columns",
                self.table
            )));
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            validate_identifier(column)?;
            if !seen.insert(column.as_str()) {
                return Err(Error::invalid_batch(format!(
                    "column '{}' listed twice",
                    column
                )));
            }
        }

        let mut keys = HashSet::with_capacity(self.conflict_keys.len());
        for key in &self.conflict_keys {
            if !seen.contains(key.as_str()) {
                return Err(Error::invalid_batch(format!(
                    "conflict key '{}' is not one of the written columns",
                    key
                )));
            }
            if !keys.insert(key.as_str()) {
                return Err(Error::invalid_batch(format!(
                    "conflict key '{}' listed twice",
                    key
                )));
            }
        }

        for (idx, record) in self.records.iter().enumerate() {
            if record.len() != self.columns.len()
                || !record.columns().all(|c| seen.contains(c))
            {
                return Err(Error::invalid_batch(format!(
                    "record {} does not match the batch columns {:?}",
                    idx, self.columns
                )));
            }
        }

        Ok(())
    }

    /// Project every record onto the column list, in column order
    pub fn parameter_rows(&self) -> Vec<Vec<Value>> {
        self.records
            .iter()
            .map(|record| {
                self.columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(store: i32, pct: f64) -> Record {
        Record::new().with("store_id", store).with("fill_pct", pct)
    }

    #[test]
    fn test_record_set_replaces() {
        let mut record = fill(7, 42.5);
        record.set("fill_pct", 55.0);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("fill_pct"), Some(&Value::Float64(55.0)));
        assert_eq!(record.columns().collect::<Vec<_>>(), ["store_id", "fill_pct"]);
    }

    #[test]
    fn test_record_from_iter() {
        let record: Record = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(record.get("b"), Some(&Value::Int32(2)));
        assert!(!record.contains("c"));
    }

    #[test]
    fn test_validate_ok() {
        let batch = Batch::new("shelf_fill_events", ["store_id", "fill_pct"], ["store_id"])
            .with_records([fill(7, 42.5), fill(8, 10.0)]);
        assert!(batch.validate().is_ok());
        assert_eq!(batch.non_key_columns().collect::<Vec<_>>(), ["fill_pct"]);
    }

    #[test]
    fn test_validate_rejects_empty_columns() {
        let batch = Batch::new("t", Vec::<String>::new(), Vec::<String>::new());
        assert!(batch.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_key_outside_columns() {
        let batch = Batch::new("t", ["fill_pct"], ["store_id"]);
        let err = batch.validate().unwrap_err();
        assert!(err.to_string().contains("store_id"));
    }

    #[test]
    fn test_validate_rejects_duplicate_column() {
        let batch = Batch::new("t", ["a", "a"], Vec::<String>::new());
        assert!(batch.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_mismatched_record() {
        let batch = Batch::new("t", ["store_id", "fill_pct"], ["store_id"])
            .with_records([Record::new().with("store_id", 7)]);
        assert!(batch.validate().is_err());

        let batch = Batch::new("t", ["store_id", "fill_pct"], ["store_id"])
            .with_records([Record::new().with("store_id", 7).with("other", 1)]);
        assert!(batch.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        let batch = Batch::new("t; DROP TABLE x", ["a"], Vec::<String>::new());
        assert!(batch.validate().is_err());

        let batch = Batch::new("t", ["a b"], Vec::<String>::new());
        assert!(batch.validate().is_err());
    }

    #[test]
    fn test_parameter_rows_follow_column_order() {
        let batch = Batch::new("t", ["fill_pct", "store_id"], ["store_id"])
            .with_records([fill(7, 42.5)]);
        assert_eq!(
            batch.parameter_rows(),
            vec![vec![Value::Float64(42.5), Value::Int32(7)]]
        );
    }
}
