//! Query engine for prombridge
//!
//! The read path is stateless per call: matchers are translated into a
//! storage-native filter, the backend returns flat rows, and the
//! reconstructor reassembles them into time series.

pub mod filter;
pub mod promql;
pub mod series;

mod engine;
mod read;

pub use engine::{InstantSample, QueryConfig, QueryEngine, QueryValue};
pub use filter::{translate, SampleFilter};
pub use read::Reader;
pub use series::{collect_series, SeriesBuilder};
