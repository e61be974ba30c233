//! Pre-built rollups

use std::collections::BTreeMap;

use serde::Serialize;

/// Status-bucketed statistics of one content type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeStats {
    pub content_type: String,
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    /// Updated within the configured recent window
    pub recently_updated: u64,
    /// Scheduled for a future time
    pub scheduled: u64,
}

/// Statistics across every content type of a tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub content_types: u64,
    pub total_entries: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
    pub recently_updated: u64,
    pub scheduled: u64,
    pub revisions: u64,
}

/// One bucket of a creation-date time series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    /// Truncated timestamp, RFC 3339
    pub bucket: String,
    pub count: u64,
}
