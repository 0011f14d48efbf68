//! # prombridge
//!
//! A bridge between the Prometheus remote-write/remote-read protocol and a
//! columnar time-series store.
//!
//! Samples arrive as decoded write requests, are buffered in a bounded
//! queue, and are committed in bulk on a size or timer trigger. On the read
//! side, label matchers are translated into storage-native filters and the
//! flat result rows are reassembled into time series.
//!
//! ## Architecture
//!
//! - **Ingester**: bounded queue + single background worker; fail-fast
//!   backpressure, size/timer flush triggers, drain-then-close shutdown
//! - **Query**: predicate translation, series reconstruction, and an
//!   instant/range query adapter
//! - **Storage**: narrow async client abstraction over the backend, with an
//!   in-memory implementation for development and tests
//!
//! The wire envelope (snappy/protobuf), HTTP routing, and process lifecycle
//! live outside this crate and speak to it through the decoded types in
//! [`model`].

pub mod config;
pub mod ingester;
pub mod model;
pub mod query;
pub mod schema;
pub mod storage;
pub mod telemetry;

mod error;

pub use config::Config;
pub use error::{Error, Result};
