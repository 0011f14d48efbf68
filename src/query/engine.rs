//! Query adapter: instant and range evaluation over the storage backend.
//!
//! A composition point, not a planner: selector parsing feeds the predicate
//! translator, the storage client executes the filter, and the series
//! reconstructor shapes the result. Each call constructs its own filter and
//! owns its own result set; cancellation is the caller dropping the future.

use crate::error::{Error, Result};
use crate::model::{Matcher, SamplePoint, Series};
use crate::query::filter::translate;
use crate::query::promql::parse_selector;
use crate::query::series::collect_series;
use crate::storage::StorageClient;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for the query adapter
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Staleness lookback: how far back a sample may be and still answer an
    /// evaluation timestamp
    pub lookback: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(300),
        }
    }
}

/// One series' value at a single evaluation timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct InstantSample {
    pub labels: BTreeMap<String, String>,
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Engine-native query result
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Instant query: one sample per matching series
    Vector(Vec<InstantSample>),
    /// Range query: stepped samples per matching series
    Matrix(Vec<Series>),
}

/// Storage-backed instant/range query capability.
///
/// Holds no state beyond the storage reference; safe to share across
/// concurrent calls.
pub struct QueryEngine {
    storage: Arc<dyn StorageClient>,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(storage: Arc<dyn StorageClient>, config: QueryConfig) -> Self {
        Self { storage, config }
    }

    /// Evaluate a selector at one timestamp, returning the most recent
    /// sample per series within the lookback window.
    pub async fn instant_query(&self, expr: &str, at_ms: i64) -> Result<QueryValue> {
        let matchers = parse_selector(expr)?;
        let start_ms = at_ms - self.lookback_ms();
        let series = self.select_series(&matchers, start_ms, at_ms).await?;

        let mut vector = Vec::with_capacity(series.len());
        for series in series {
            // Samples are ascending, so the last one is the most recent.
            if let Some(sample) = series.samples.last() {
                vector.push(InstantSample {
                    labels: series.labels,
                    timestamp_ms: at_ms,
                    value: sample.value,
                });
            }
        }

        debug!(expr, at_ms, series = vector.len(), "instant query evaluated");
        Ok(QueryValue::Vector(vector))
    }

    /// Evaluate a selector over a time range with a step interval.
    ///
    /// Each step reports the most recent raw sample within the lookback
    /// window; steps with no sample in range are skipped.
    pub async fn range_query(
        &self,
        expr: &str,
        start_ms: i64,
        end_ms: i64,
        step_ms: i64,
    ) -> Result<QueryValue> {
        if step_ms <= 0 {
            return Err(Error::Query(format!("step must be positive, got {step_ms}")));
        }
        if end_ms < start_ms {
            return Err(Error::Query(format!(
                "range end {end_ms} precedes start {start_ms}"
            )));
        }

        let matchers = parse_selector(expr)?;
        let select_start = start_ms - self.lookback_ms();
        let series = self.select_series(&matchers, select_start, end_ms).await?;

        let mut matrix = Vec::with_capacity(series.len());
        for series in series {
            let stepped = self.step_samples(&series.samples, start_ms, end_ms, step_ms);
            if !stepped.is_empty() {
                matrix.push(Series {
                    labels: series.labels,
                    samples: stepped,
                });
            }
        }

        debug!(
            expr,
            start_ms,
            end_ms,
            step_ms,
            series = matrix.len(),
            "range query evaluated"
        );
        Ok(QueryValue::Matrix(matrix))
    }

    /// Distinct values of one label among series matching `matchers`.
    pub async fn label_values(
        &self,
        label: &str,
        matchers: &[Matcher],
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let filter = translate(matchers, 0, 0, limit)?;
        self.storage.label_values(label, &filter).await
    }

    /// Distinct label names among series matching `matchers`.
    pub async fn label_names(
        &self,
        matchers: &[Matcher],
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let filter = translate(matchers, 0, 0, limit)?;
        self.storage.label_names(&filter).await
    }

    async fn select_series(
        &self,
        matchers: &[Matcher],
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Series>> {
        let filter = translate(matchers, start_ms, end_ms, None)?;
        let rows = self.storage.select(&filter).await?;
        collect_series(rows)
    }

    /// Resolve each step timestamp to the most recent sample within the
    /// lookback window. Samples are ascending, so one forward cursor serves
    /// all steps.
    fn step_samples(
        &self,
        samples: &[SamplePoint],
        start_ms: i64,
        end_ms: i64,
        step_ms: i64,
    ) -> Vec<SamplePoint> {
        let lookback_ms = self.lookback_ms();
        let mut stepped = Vec::new();
        let mut cursor = 0usize;

        let mut step = start_ms;
        while step <= end_ms {
            while cursor < samples.len() && samples[cursor].timestamp_ms <= step {
                cursor += 1;
            }
            if cursor > 0 {
                let candidate = samples[cursor - 1];
                if step - candidate.timestamp_ms <= lookback_ms {
                    stepped.push(SamplePoint {
                        timestamp_ms: step,
                        value: candidate.value,
                    });
                }
            }
            step += step_ms;
        }

        stepped
    }

    fn lookback_ms(&self) -> i64 {
        self.config.lookback.as_millis() as i64
    }
}
