//! Executor result types

use serde::Serialize;
use serde_json::{Map, Value};

use crate::store::Document;

/// One page of documents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub entries: Vec<Document>,
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl QueryResult {
    pub fn new(entries: Vec<Document>, page: u64, page_size: u64, total_items: u64) -> Self {
        Self {
            entries,
            page,
            page_size,
            total_items,
            total_pages: total_pages(total_items, page_size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Ceiling division; zero when the page size is zero
pub fn total_pages(total_items: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        0
    } else {
        total_items.div_ceil(page_size)
    }
}

/// One grouped aggregate row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    /// Group key name to value; empty without grouping
    pub group_key: Map<String, Value>,
    /// Aggregate alias to value
    pub values: Map<String, Value>,
}

impl AggregateResult {
    /// Value of an aggregate alias
    pub fn value(&self, alias: &str) -> Option<&Value> {
        self.values.get(alias)
    }

    pub fn key(&self, name: &str) -> Option<&Value> {
        self.group_key.get(name)
    }
}
