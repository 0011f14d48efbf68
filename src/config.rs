//! Environment-based configuration and component factory.
//!
//! Recognized knobs:
//! - `STORAGE_BACKEND`: "memory" (default) for the in-memory store;
//!   anything else is a configuration error
//! - `MAX_BATCH_SIZE`: rows per bulk insert (default 1000); also sets the
//!   ingest queue capacity (2x)
//! - `BATCH_TIMEOUT_SECS`: timer flush interval in seconds (default 10)
//! - `QUERY_LOOKBACK_SECS`: staleness lookback for instant/range queries
//!   (default 300)

use crate::ingester::BatcherConfig;
use crate::query::QueryConfig;
use crate::storage::{InMemoryStorage, StorageClient};
use crate::{Error, Result};

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Top-level configuration assembled from the environment
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub batcher: BatcherConfig,
    pub query: QueryConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut batcher = BatcherConfig::default();
        if let Some(size) = parse_env_usize("MAX_BATCH_SIZE")? {
            if size == 0 {
                return Err(Error::Config(
                    "MAX_BATCH_SIZE must be positive".to_string(),
                ));
            }
            batcher.max_batch_size = size;
        }
        if let Some(secs) = parse_env_u64("BATCH_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(Error::Config(
                    "BATCH_TIMEOUT_SECS must be positive".to_string(),
                ));
            }
            batcher.batch_timeout = Duration::from_secs(secs);
        }

        let mut query = QueryConfig::default();
        if let Some(secs) = parse_env_u64("QUERY_LOOKBACK_SECS")? {
            query.lookback = Duration::from_secs(secs);
        }

        Ok(Self { batcher, query })
    }
}

pub struct ComponentFactory;

impl ComponentFactory {
    /// Create a storage client from the environment.
    ///
    /// The write path and the read path should each call this once; the
    /// batcher exclusively owns its connection.
    pub fn create_storage_client() -> Result<Arc<dyn StorageClient>> {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".to_string());

        match backend.as_str() {
            "memory" => {
                info!("Using in-memory storage client (development mode)");
                Ok(Arc::new(InMemoryStorage::new()))
            }
            other => Err(Error::Config(format!(
                "Unknown STORAGE_BACKEND: {}. Use 'memory'",
                other
            ))),
        }
    }
}

fn parse_env_usize(name: &str) -> Result<Option<usize>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<usize>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{name} must be an integer: {e}")))
}

fn parse_env_u64(name: &str) -> Result<Option<u64>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{name} must be an integer: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.batcher.max_batch_size, 1000);
        assert_eq!(config.batcher.batch_timeout, Duration::from_secs(10));
        assert_eq!(config.query.lookback, Duration::from_secs(300));
    }

    #[test]
    fn factory_defaults_to_memory_backend() {
        let client = ComponentFactory::create_storage_client();
        assert!(client.is_ok());
    }
}
