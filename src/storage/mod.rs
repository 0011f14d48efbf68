//! Narrow async client abstraction over the columnar backend.
//!
//! The core never speaks the backend's wire protocol; it opens bulk-insert
//! handles for the write path and executes translated filters for the read
//! path. Connection bootstrapping lives with the backend implementation.

mod memory;

pub use memory::InMemoryStorage;

use crate::error::{Error, Result};
use crate::query::filter::SampleFilter;
use crate::schema::SampleRow;

use async_trait::async_trait;

/// A failed bulk insert, reported to the supervising component.
///
/// Carries the rows that failed to commit when the backend can return them,
/// so the supervisor can retry, drop, or escalate.
#[derive(Debug)]
pub struct FlushFailure {
    pub error: Error,
    pub rows: Vec<SampleRow>,
}

/// An open bulk-insert operation against the metrics table.
///
/// Exactly one is open per batcher at a time; appends are cheap and local,
/// `send` commits the accumulated rows in one backend round trip.
#[async_trait]
pub trait RowBatch: Send {
    /// Buffer one row into the pending insert.
    fn append(&mut self, row: SampleRow);

    /// Number of rows buffered so far.
    fn row_count(&self) -> usize;

    /// Commit the buffered rows. Committing zero rows is a no-op.
    async fn send(self: Box<Self>) -> std::result::Result<(), FlushFailure>;
}

/// Async client for the columnar sample store.
///
/// Reads are safe to issue concurrently on independent calls; the write path
/// serializes all bulk inserts through a single owner. Dropping the future
/// of any method cancels the underlying call.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Open a new bulk-insert handle.
    async fn prepare_batch(&self) -> Result<Box<dyn RowBatch>>;

    /// Execute a translated filter, returning the flat un-grouped row
    /// stream. Row order is not guaranteed to be time-ordered. Individual
    /// rows may fail to scan; reconstruction aborts on the first such error.
    async fn select(&self, filter: &SampleFilter) -> Result<Vec<Result<SampleRow>>>;

    /// Distinct values of one label among matching rows.
    async fn label_values(&self, label: &str, filter: &SampleFilter) -> Result<Vec<String>>;

    /// Distinct label names among matching rows.
    async fn label_names(&self, filter: &SampleFilter) -> Result<Vec<String>>;

    /// Release the connection. Close failures are surfaced, not swallowed.
    async fn close(&self) -> Result<()>;
}
