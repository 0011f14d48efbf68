//! Ingestion batching engine.
//!
//! Decouples bursty remote-write calls from storage write latency: producers
//! enqueue decoded write requests onto a bounded channel without blocking,
//! and a single background worker drains the queue, extracts sample rows,
//! and commits them in bulk on a size or timer trigger.
//!
//! The worker is the sole user of the write-path storage connection, so all
//! bulk inserts are serialized by construction.

use crate::error::{Error, Result};
use crate::model::WriteRequest;
use crate::schema::SampleRow;
use crate::storage::{FlushFailure, RowBatch, StorageClient};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the batcher
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Rows buffered before a size-triggered flush. Also sets the ingest
    /// queue capacity (2x this value).
    pub max_batch_size: usize,
    /// Fixed wall-clock interval for timer-triggered flushes. The timer is
    /// not reset by size-triggered flushes.
    pub batch_timeout: Duration,
    /// Capacity of the flush-failure report channel
    pub error_queue_size: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            batch_timeout: Duration::from_secs(10),
            error_queue_size: 16,
        }
    }
}

/// Handle to a running ingestion batcher.
///
/// Constructed at composition time with [`Batcher::spawn`]; lifecycle is
/// owned by the caller via [`Batcher::stop`].
pub struct Batcher {
    tx: mpsc::Sender<WriteRequest>,
    shutdown: CancellationToken,
    worker: JoinHandle<Result<()>>,
}

impl Batcher {
    /// Start a batcher owning `storage` for the write path.
    ///
    /// Returns the handle and the flush-failure channel. The supervising
    /// component must consume failures and decide whether to retry the
    /// returned rows, drop them, or escalate; the worker itself never
    /// terminates on a storage error.
    pub fn spawn(
        config: BatcherConfig,
        storage: Arc<dyn StorageClient>,
    ) -> (Self, mpsc::Receiver<FlushFailure>) {
        let queue_capacity = config.max_batch_size.max(1) * 2;
        let (tx, rx) = mpsc::channel(queue_capacity);
        let (error_tx, error_rx) = mpsc::channel(config.error_queue_size.max(1));
        let shutdown = CancellationToken::new();

        let worker = Worker {
            config,
            storage,
            rx,
            error_tx,
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(worker.run());

        (
            Self {
                tx,
                shutdown,
                worker: handle,
            },
            error_rx,
        )
    }

    /// Enqueue a decoded write request without blocking.
    ///
    /// Returns `Error::Backpressure` immediately when the queue is full;
    /// previously queued data is never dropped.
    pub fn add(&self, request: WriteRequest) -> Result<()> {
        match self.tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::Backpressure),
            Err(TrySendError::Closed(_)) => {
                Err(Error::Internal("batcher worker has stopped".to_string()))
            }
        }
    }

    /// Stop the batcher: the worker drains already-accepted requests,
    /// flushes any non-empty pending batch, releases the storage
    /// connection, and exits. Surfaces the connection close error, if any.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        match self.worker.await {
            Ok(result) => result,
            Err(e) => Err(Error::Internal(format!("batcher worker panicked: {e}"))),
        }
    }
}

struct Worker {
    config: BatcherConfig,
    storage: Arc<dyn StorageClient>,
    rx: mpsc::Receiver<WriteRequest>,
    error_tx: mpsc::Sender<FlushFailure>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(mut self) -> Result<()> {
        let mut pending = self.open_batch().await;

        // interval_at skips the immediate first tick
        let start = Instant::now() + self.config.batch_timeout;
        let mut ticker = tokio::time::interval_at(start, self.config.batch_timeout);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                request = self.rx.recv() => match request {
                    Some(request) => self.ingest(&mut pending, request).await,
                    None => break,
                },
                _ = ticker.tick() => self.flush(&mut pending).await,
            }
        }

        // Drain-then-close: everything already accepted gets flushed before
        // the connection is released, so no acknowledged sample is lost.
        self.rx.close();
        while let Ok(request) = self.rx.try_recv() {
            self.ingest(&mut pending, request).await;
        }
        self.flush(&mut pending).await;

        info!("ingestion batcher worker shut down");
        self.storage.close().await
    }

    /// Unpack one write request into the pending batch, flushing whenever
    /// the row counter reaches the configured maximum.
    async fn ingest(&self, pending: &mut Option<Box<dyn RowBatch>>, request: WriteRequest) {
        for series in request.timeseries {
            let rows = match series.into_rows() {
                Ok(rows) => rows,
                Err(Error::MissingMetricName) => {
                    debug!("dropping series without a metric name");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "dropping undecodable series");
                    continue;
                }
            };

            for row in rows {
                self.append_row(pending, row).await;
            }
        }
    }

    async fn append_row(&self, pending: &mut Option<Box<dyn RowBatch>>, row: SampleRow) {
        if pending.is_none() {
            *pending = self.open_batch().await;
        }

        let full = match pending.as_mut() {
            Some(batch) => {
                batch.append(row);
                batch.row_count() >= self.config.max_batch_size
            }
            None => {
                warn!("no open batch, dropping sample");
                false
            }
        };

        if full {
            self.flush(pending).await;
        }
    }

    /// Commit the pending batch and open a fresh one.
    ///
    /// A timer flush with zero buffered rows keeps the current handle open
    /// instead of committing an empty insert.
    async fn flush(&self, pending: &mut Option<Box<dyn RowBatch>>) {
        let Some(batch) = pending.take() else {
            // A previous open failed; retry so the next cycle has a handle.
            *pending = self.open_batch().await;
            return;
        };

        let rows = batch.row_count();
        if rows == 0 {
            *pending = Some(batch);
            return;
        }

        debug!(rows, "flushing batch");
        if let Err(failure) = batch.send().await {
            warn!(
                error = %failure.error,
                rows = failure.rows.len(),
                "bulk insert failed, reporting to supervisor"
            );
            self.report(failure);
        }
        *pending = self.open_batch().await;
    }

    async fn open_batch(&self) -> Option<Box<dyn RowBatch>> {
        match self.storage.prepare_batch().await {
            Ok(batch) => Some(batch),
            Err(e) => {
                error!(error = %e, "could not open bulk-insert handle");
                self.report(FlushFailure {
                    error: e,
                    rows: Vec::new(),
                });
                None
            }
        }
    }

    /// Hand a failure to the supervisor. The report channel is bounded and
    /// the worker must not block on a slow supervisor, so an overflowing
    /// report is logged and dropped.
    fn report(&self, failure: FlushFailure) {
        if let Err(e) = self.error_tx.try_send(failure) {
            error!(error = %e, "flush failure report dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Label, Sample, TimeSeries};
    use crate::schema::NAME_LABEL;
    use crate::storage::InMemoryStorage;

    fn write_request(metric: &str, host: &str, samples: &[(i64, f64)]) -> WriteRequest {
        WriteRequest {
            timeseries: vec![TimeSeries {
                labels: vec![Label::new(NAME_LABEL, metric), Label::new("host", host)],
                samples: samples
                    .iter()
                    .map(|&(timestamp_ms, value)| Sample {
                        timestamp_ms,
                        value,
                    })
                    .collect(),
            }],
        }
    }

    #[tokio::test]
    async fn stop_flushes_accepted_samples() {
        let store = InMemoryStorage::new();
        let (batcher, _errors) = Batcher::spawn(
            BatcherConfig::default(),
            Arc::new(store.clone()) as Arc<dyn StorageClient>,
        );

        batcher
            .add(write_request("cpu", "a", &[(1000, 1.0), (2000, 2.0)]))
            .unwrap();
        batcher.stop().await.unwrap();

        let rows = store.rows().await;
        assert_eq!(rows.len(), 2, "accepted samples must survive shutdown");
    }

    #[tokio::test]
    async fn nameless_series_never_reach_storage() {
        let store = InMemoryStorage::new();
        let (batcher, _errors) = Batcher::spawn(
            BatcherConfig::default(),
            Arc::new(store.clone()) as Arc<dyn StorageClient>,
        );

        batcher
            .add(WriteRequest {
                timeseries: vec![TimeSeries {
                    labels: vec![Label::new("host", "a")],
                    samples: vec![Sample {
                        timestamp_ms: 1000,
                        value: 1.0,
                    }],
                }],
            })
            .unwrap();
        batcher
            .add(write_request("cpu", "a", &[(2000, 2.0)]))
            .unwrap();
        batcher.stop().await.unwrap();

        let rows = store.rows().await;
        assert_eq!(rows.len(), 1, "nameless series must be dropped");
        assert_eq!(rows[0].metric_name, "cpu");
    }
}
