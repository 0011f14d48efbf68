//! Storage schema contract for the wide metrics table.
//!
//! The backend stores one row per sample: a millisecond timestamp, the metric
//! name split into its own column, the remaining labels as a string-keyed
//! map, and the sample value as a 64-bit float.

use std::collections::BTreeMap;

/// Table holding all metric samples
pub const METRICS_TABLE: &str = "metrics";

/// Standard column names
pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const METRIC_NAME_COLUMN: &str = "metric_name";
pub const LABELS_COLUMN: &str = "labels";
pub const VALUE_COLUMN: &str = "value";

/// Reserved label key carrying the metric name on the wire.
///
/// Never stored inside the `labels` map; always split out to the
/// `metric_name` column on write and merged back on read.
pub const NAME_LABEL: &str = "__name__";

/// One wide storage row per sample.
///
/// Labels are canonicalized into a sorted map, which also makes the
/// (metric name, label set) pair usable as an exact series identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub timestamp_ms: i64,
    pub metric_name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl SampleRow {
    /// Look up a label value, treating an absent label as the empty string.
    ///
    /// `__name__` resolves to the metric name column. The empty-string
    /// fallback mirrors Prometheus matcher semantics for missing labels.
    pub fn label_value(&self, name: &str) -> &str {
        if name == NAME_LABEL {
            &self.metric_name
        } else {
            self.labels.get(name).map(String::as_str).unwrap_or("")
        }
    }
}
