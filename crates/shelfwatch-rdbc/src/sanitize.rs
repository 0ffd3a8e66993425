//! Batch normalization before binding.
//!
//! Producers hand over data from heterogeneous sources (dataframes, CSV,
//! detector output), so "no value" arrives as many spellings: textual
//! markers such as `"nan"` or `"<NA>"`, empty strings, float NaN and, for
//! metric columns, a literal zero. The sanitizer collapses all of them to
//! [`Value::Null`].
//!
//! Two passes run in this order:
//! 1. every null-like marker (and float NaN) becomes `Null`
//! 2. when `zero_as_null` is set, numeric zeros become `Null` in every
//!    numeric column, i.e. a column whose non-null values are all numeric
//!
//! Running the marker pass first is what makes the whole thing idempotent:
//! a column is judged numeric only after its textual nulls are gone, so a
//! second run never finds anything new to collapse. It also means a column
//! such as `[0, "nan"]` counts as numeric and its zero becomes `Null`.

use crate::record::Batch;
use crate::types::Value;

/// Textual spellings of "no value" collapsed to `Null`
pub const DEFAULT_NULL_MARKERS: &[&str] = &["None", "nan", "<NA>", "NaT", "NaN", ""];

/// Sanitizer settings
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeOptions {
    /// Treat numeric zero as "no value" in numeric columns
    pub zero_as_null: bool,
    /// Exact string values treated as "no value"
    pub null_markers: Vec<String>,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            zero_as_null: true,
            null_markers: DEFAULT_NULL_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SanitizeOptions {
    /// Enable/disable the numeric-zero rule
    pub fn with_zero_as_null(mut self, enabled: bool) -> Self {
        self.zero_as_null = enabled;
        self
    }

    /// Add a null marker
    pub fn with_null_marker(mut self, marker: impl Into<String>) -> Self {
        self.null_markers.push(marker.into());
        self
    }
}

/// Collapses null-like values in a batch to [`Value::Null`]
#[derive(Debug, Clone, Default)]
pub struct ValueSanitizer {
    options: SanitizeOptions,
}

impl ValueSanitizer {
    /// Create a sanitizer
    pub fn new(options: SanitizeOptions) -> Self {
        Self { options }
    }

    /// Current options
    pub fn options(&self) -> &SanitizeOptions {
        &self.options
    }

    /// Whether a single value is a null-like marker
    pub fn is_null_like(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Float32(_) | Value::Float64(_) => value.is_nan(),
            Value::String(s) => self.options.null_markers.iter().any(|m| m == s),
            _ => false,
        }
    }

    /// Sanitize a batch in place
    pub fn sanitize(&self, batch: &mut Batch) {
        for record in batch.records_mut() {
            for value in record.values_mut() {
                if !value.is_null() && self.is_null_like(value) {
                    *value = Value::Null;
                }
            }
        }

        if !self.options.zero_as_null {
            return;
        }

        let numeric: Vec<String> = batch
            .columns()
            .iter()
            .filter(|column| is_numeric_column(batch, column))
            .cloned()
            .collect();

        for record in batch.records_mut() {
            for column in &numeric {
                if let Some(value) = record.get_mut(column) {
                    if value.is_zero() {
                        *value = Value::Null;
                    }
                }
            }
        }
    }

    /// Sanitized copy of a batch
    pub fn sanitized(&self, batch: &Batch) -> Batch {
        let mut copy = batch.clone();
        self.sanitize(&mut copy);
        copy
    }
}

// An all-null column is not numeric: there is nothing to collapse in it.
fn is_numeric_column(batch: &Batch, column: &str) -> bool {
    let mut present = batch
        .records()
        .iter()
        .filter_map(|r| r.get(column))
        .filter(|v| !v.is_null())
        .peekable();
    present.peek().is_some() && present.all(Value::is_numeric)
}
