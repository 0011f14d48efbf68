//! Series reconstruction from the flat storage row stream.
//!
//! Storage returns one un-grouped row per sample. Reconstruction groups rows
//! by their exact (metric name, label set) identity, merges the metric name
//! back under `__name__`, and orders each series' samples ascending by
//! timestamp regardless of storage return order.

use crate::error::Result;
use crate::model::{SamplePoint, Series};
use crate::schema::{SampleRow, NAME_LABEL};

use std::collections::BTreeMap;
use std::collections::HashMap;

/// Exact series identity: metric name plus canonicalized label set.
///
/// The grouping map hashes this key, but equality is what decides identity,
/// so distinct label sets can never collapse into one series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    metric_name: String,
    labels: BTreeMap<String, String>,
}

/// Incremental reconstructor over a row stream.
///
/// Series come out in first-occurrence order, keeping the output
/// deterministic for a given row stream.
#[derive(Debug, Default)]
pub struct SeriesBuilder {
    index: HashMap<SeriesKey, usize>,
    series: Vec<Series>,
}

impl SeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one row into its series, materializing the series on first sight.
    pub fn push_row(&mut self, row: SampleRow) {
        let key = SeriesKey {
            metric_name: row.metric_name,
            labels: row.labels,
        };

        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let mut labels = key.labels.clone();
                labels.insert(NAME_LABEL.to_string(), key.metric_name.clone());
                self.series.push(Series {
                    labels,
                    samples: Vec::new(),
                });
                let idx = self.series.len() - 1;
                self.index.insert(key, idx);
                idx
            }
        };

        self.series[idx].samples.push(SamplePoint {
            timestamp_ms: row.timestamp_ms,
            value: row.value,
        });
    }

    /// Finish reconstruction: sort each series ascending by timestamp and
    /// collapse duplicate timestamps, keeping the last-encountered value.
    pub fn finish(mut self) -> Vec<Series> {
        for series in &mut self.series {
            // Stable sort preserves encounter order among equal timestamps,
            // so the dedup below keeps the last write.
            series.samples.sort_by_key(|s| s.timestamp_ms);
            series.samples.dedup_by(|current, kept| {
                if current.timestamp_ms == kept.timestamp_ms {
                    kept.value = current.value;
                    true
                } else {
                    false
                }
            });
        }
        self.series
    }
}

/// Reconstruct series from a fallible row stream.
///
/// The first row-scan error aborts the whole query; no partial series set is
/// returned. An empty stream yields an empty series list.
pub fn collect_series<I>(rows: I) -> Result<Vec<Series>>
where
    I: IntoIterator<Item = Result<SampleRow>>,
{
    let mut builder = SeriesBuilder::new();
    for row in rows {
        builder.push_row(row?);
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn row(metric: &str, labels: &[(&str, &str)], ts: i64, value: f64) -> SampleRow {
        SampleRow {
            timestamp_ms: ts,
            metric_name: metric.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        }
    }

    #[test]
    fn groups_rows_by_exact_label_set() {
        let rows = vec![
            Ok(row("cpu", &[("host", "a")], 1000, 1.0)),
            Ok(row("cpu", &[("host", "b")], 1000, 2.0)),
            Ok(row("cpu", &[("host", "a")], 500, 3.0)),
        ];

        let series = collect_series(rows).unwrap();
        assert_eq!(series.len(), 2, "two label sets must yield two series");

        // First-occurrence order: host=a before host=b
        assert_eq!(series[0].labels.get("host").map(String::as_str), Some("a"));
        assert_eq!(
            series[0].labels.get(NAME_LABEL).map(String::as_str),
            Some("cpu"),
            "metric name must be reinstated under __name__"
        );
        assert_eq!(
            series[0].samples,
            vec![
                SamplePoint {
                    timestamp_ms: 500,
                    value: 3.0
                },
                SamplePoint {
                    timestamp_ms: 1000,
                    value: 1.0
                },
            ],
            "samples must be ascending by timestamp"
        );
    }

    #[test]
    fn same_labels_different_metric_are_distinct_series() {
        let rows = vec![
            Ok(row("cpu", &[("host", "a")], 1, 1.0)),
            Ok(row("mem", &[("host", "a")], 1, 2.0)),
        ];

        let series = collect_series(rows).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn duplicate_timestamps_keep_last_write() {
        let rows = vec![
            Ok(row("cpu", &[("host", "a")], 1000, 1.0)),
            Ok(row("cpu", &[("host", "a")], 1000, 2.0)),
            Ok(row("cpu", &[("host", "a")], 500, 9.0)),
        ];

        let series = collect_series(rows).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(
            series[0].samples,
            vec![
                SamplePoint {
                    timestamp_ms: 500,
                    value: 9.0
                },
                SamplePoint {
                    timestamp_ms: 1000,
                    value: 2.0
                },
            ]
        );
    }

    #[test]
    fn empty_stream_yields_empty_set() {
        let series = collect_series(Vec::new()).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn scan_error_aborts_reconstruction() {
        let rows = vec![
            Ok(row("cpu", &[("host", "a")], 1000, 1.0)),
            Err(Error::Scan("bad value".to_string())),
            Ok(row("cpu", &[("host", "a")], 2000, 2.0)),
        ];

        let err = collect_series(rows).unwrap_err();
        assert!(
            matches!(err, Error::Scan(_)),
            "a scan failure must abort the whole query"
        );
    }
}
