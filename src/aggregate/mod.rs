//! Aggregation
//!
//! Single-operator aggregates with optional grouping and date truncation,
//! plus fixed rollups: per-type statistics, store-wide statistics, and a
//! creation-date time series.

mod aggregator;
mod simple;
mod stats;

pub use aggregator::Aggregator;
pub use simple::SimpleAggregate;
pub use stats::{ContentTypeStats, StoreStats, TimeBucket};
