//! Decoded protocol types exchanged with the wire codec layer.
//!
//! The snappy/protobuf envelope is handled outside this crate; the codec
//! layer hands the core these plain decoded shapes and serializes the
//! responses it gets back.

use crate::error::{Error, Result};
use crate::schema::{SampleRow, NAME_LABEL};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decoded remote-write payload: an ordered sequence of time series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteRequest {
    pub timeseries: Vec<TimeSeries>,
}

/// One series in a write payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: Vec<Label>,
    pub samples: Vec<Sample>,
}

/// Label key-value pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Sample with millisecond timestamp and value
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl TimeSeries {
    /// Flatten into storage rows, splitting `__name__` out of the label set.
    ///
    /// Returns `Error::MissingMetricName` when the series carries no name
    /// label (or an empty one); the ingester drops such series and keeps
    /// going with the rest of the request.
    pub fn into_rows(self) -> Result<Vec<SampleRow>> {
        let mut labels: BTreeMap<String, String> = self
            .labels
            .into_iter()
            .map(|label| (label.name, label.value))
            .collect();

        let metric_name = labels.remove(NAME_LABEL).unwrap_or_default();
        if metric_name.is_empty() {
            return Err(Error::MissingMetricName);
        }

        Ok(self
            .samples
            .into_iter()
            .map(|sample| SampleRow {
                timestamp_ms: sample.timestamp_ms,
                metric_name: metric_name.clone(),
                labels: labels.clone(),
                value: sample.value,
            })
            .collect())
    }
}

/// Matcher operators supported by the read protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOp {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`
    Regex,
    /// `!~`
    NotRegex,
}

/// A label-selection predicate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matcher {
    pub name: String,
    pub op: MatchOp,
    pub value: String,
}

impl Matcher {
    pub fn new(name: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op,
            value: value.into(),
        }
    }

    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, MatchOp::Equal, value)
    }
}

/// Decoded remote-read payload: an ordered sequence of queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadRequest {
    pub queries: Vec<ReadQuery>,
}

/// One query in a read payload. A bound of 0 means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadQuery {
    pub start_timestamp_ms: i64,
    pub end_timestamp_ms: i64,
    pub matchers: Vec<Matcher>,
    /// Result-size hint; bounds the number of returned rows
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Read response: one result per query, in request order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadResponse {
    pub results: Vec<QueryResult>,
}

/// Reconstructed series for a single query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub timeseries: Vec<Series>,
}

/// A unique (metric name, label set) combination with its ordered samples.
///
/// Labels include the reinstated `__name__` key; samples are ascending by
/// timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub labels: BTreeMap<String, String>,
    pub samples: Vec<SamplePoint>,
}

/// One (timestamp, value) pair in a reconstructed series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub timestamp_ms: i64,
    pub value: f64,
}
