//! Remote-read entry point.
//!
//! Translates each query's matchers and time bounds, executes them against
//! storage, and reconstructs the series set. Queries fail whole: a storage
//! or scan error surfaces to the caller with no partial results.

use crate::error::Result;
use crate::model::{QueryResult, ReadQuery, ReadRequest, ReadResponse, Series};
use crate::query::filter::translate;
use crate::query::series::collect_series;
use crate::storage::StorageClient;

use std::sync::Arc;
use tracing::debug;

/// Storage-backed remote-read capability
pub struct Reader {
    storage: Arc<dyn StorageClient>,
}

impl Reader {
    pub fn new(storage: Arc<dyn StorageClient>) -> Self {
        Self { storage }
    }

    /// Answer a decoded read request, one result per query in order.
    pub async fn read(&self, request: &ReadRequest) -> Result<ReadResponse> {
        let mut results = Vec::with_capacity(request.queries.len());
        for query in &request.queries {
            let timeseries = self.query(query).await?;
            debug!(series = timeseries.len(), "read query answered");
            results.push(QueryResult { timeseries });
        }
        Ok(ReadResponse { results })
    }

    async fn query(&self, query: &ReadQuery) -> Result<Vec<Series>> {
        let filter = translate(
            &query.matchers,
            query.start_timestamp_ms,
            query.end_timestamp_ms,
            query.limit,
        )?;
        let rows = self.storage.select(&filter).await?;
        collect_series(rows)
    }
}
