//! In-memory storage client for development and tests.
//!
//! Evaluates translated filters directly against the typed conditions, so
//! it shares matcher semantics (anchored regex, absent label = empty string)
//! with the SQL rendering.

use crate::error::{Error, Result};
use crate::query::filter::SampleFilter;
use crate::schema::{SampleRow, NAME_LABEL};
use crate::storage::{FlushFailure, RowBatch, StorageClient};

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory columnar store standing in for the real backend.
///
/// Cloning creates a new open connection handle to the same backing store,
/// so the write path can own and close its connection while readers keep
/// their own.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    rows: Arc<RwLock<Vec<SampleRow>>>,
    closed: Arc<AtomicBool>,
}

impl Clone for InMemoryStorage {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row, for assertions in tests.
    pub async fn rows(&self) -> Vec<SampleRow> {
        self.rows.read().await.clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Storage("connection is closed".to_string()));
        }
        Ok(())
    }
}

struct MemoryBatch {
    store: Arc<RwLock<Vec<SampleRow>>>,
    closed: Arc<AtomicBool>,
    rows: Vec<SampleRow>,
}

#[async_trait]
impl RowBatch for MemoryBatch {
    fn append(&mut self, row: SampleRow) {
        self.rows.push(row);
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    async fn send(self: Box<Self>) -> std::result::Result<(), FlushFailure> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FlushFailure {
                error: Error::Storage("connection is closed".to_string()),
                rows: self.rows,
            });
        }
        if self.rows.is_empty() {
            return Ok(());
        }

        let mut rows = self.store.write().await;
        debug!(
            appended = self.rows.len(),
            total = rows.len() + self.rows.len(),
            "committed batch"
        );
        rows.extend(self.rows);
        Ok(())
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    async fn prepare_batch(&self) -> Result<Box<dyn RowBatch>> {
        self.ensure_open()?;
        Ok(Box::new(MemoryBatch {
            store: Arc::clone(&self.rows),
            closed: Arc::clone(&self.closed),
            rows: Vec::new(),
        }))
    }

    async fn select(&self, filter: &SampleFilter) -> Result<Vec<Result<SampleRow>>> {
        self.ensure_open()?;
        let rows = self.rows.read().await;
        let mut matched: Vec<Result<SampleRow>> = Vec::new();
        for row in rows.iter() {
            if filter.matches(row) {
                matched.push(Ok(row.clone()));
                if let Some(limit) = filter.limit() {
                    if matched.len() >= limit {
                        break;
                    }
                }
            }
        }
        Ok(matched)
    }

    async fn label_values(&self, label: &str, filter: &SampleFilter) -> Result<Vec<String>> {
        self.ensure_open()?;
        let rows = self.rows.read().await;
        let mut values: BTreeSet<String> = BTreeSet::new();
        for row in rows.iter().filter(|row| filter.matches(row)) {
            let value = if label == NAME_LABEL {
                row.metric_name.as_str()
            } else {
                match row.labels.get(label) {
                    Some(value) => value.as_str(),
                    None => continue,
                }
            };
            values.insert(value.to_string());
        }

        let mut values: Vec<String> = values.into_iter().collect();
        if let Some(limit) = filter.limit() {
            values.truncate(limit);
        }
        Ok(values)
    }

    async fn label_names(&self, filter: &SampleFilter) -> Result<Vec<String>> {
        self.ensure_open()?;
        let rows = self.rows.read().await;
        let mut names: BTreeSet<String> = BTreeSet::new();
        for row in rows.iter().filter(|row| filter.matches(row)) {
            names.extend(row.labels.keys().cloned());
        }

        let mut names: Vec<String> = names.into_iter().collect();
        if let Some(limit) = filter.limit() {
            names.truncate(limit);
        }
        Ok(names)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::translate;

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

    #[tokio::test]
    async fn batch_commits_on_send() {
        let store = InMemoryStorage::new();
        let mut batch = store.prepare_batch().await.unwrap();
        batch.append(row("cpu", &[("host", "a")], 1000, 1.0));
        batch.append(row("cpu", &[("host", "a")], 2000, 2.0));
        assert_eq!(batch.row_count(), 2);

        batch.send().await.unwrap();
        assert_eq!(store.rows().await.len(), 2);
    }

    #[tokio::test]
    async fn select_applies_filter_and_limit() {
        let store = InMemoryStorage::new();
        let mut batch = store.prepare_batch().await.unwrap();
        for ts in [1000, 2000, 3000] {
            batch.append(row("cpu", &[("host", "a")], ts, 1.0));
        }
        batch.append(row("mem", &[("host", "a")], 1000, 1.0));
        batch.send().await.unwrap();

        let filter = translate(
            &[crate::model::Matcher::equal(NAME_LABEL, "cpu")],
            0,
            0,
            Some(2),
        )
        .unwrap();
        let rows = store.select(&filter).await.unwrap();
        assert_eq!(rows.len(), 2, "limit must bound returned rows");
    }

    #[tokio::test]
    async fn operations_fail_after_close() {
        let store = InMemoryStorage::new();
        store.close().await.unwrap();

        assert!(matches!(
            store.prepare_batch().await,
            Err(Error::Storage(_))
        ));

        let filter = translate(&[], 0, 0, None).unwrap();
        assert!(matches!(store.select(&filter).await, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn send_after_close_returns_rows_for_retry() {
        let store = InMemoryStorage::new();
        let mut batch = store.prepare_batch().await.unwrap();
        batch.append(row("cpu", &[], 1000, 1.0));
        store.close().await.unwrap();

        let failure = batch.send().await.unwrap_err();
        assert_eq!(failure.rows.len(), 1, "failed rows must be handed back");
    }
}
