//! Document store interface
//!
//! The engine compiles queries; a `DocumentStore` runs them. Every call
//! receives the caller's `QueryContext` and must honour its cancellation
//! flag and deadline before doing work.
//!
//! List and count run as two independent calls. Under concurrent writes the
//! page and its total may disagree; stores are not expected to wrap them in
//! a transaction.

mod context;
mod document;
mod errors;
pub(crate) mod eval;
mod fixtures;
mod memory;

pub use context::{CancelHandle, QueryContext};
pub use document::{Document, RelationEdge, ScoredDocument};
pub use errors::{StoreError, StoreResult};
pub use fixtures::Fixtures;
pub use memory::{MemoryStore, Revision};

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::builder::{AggregatePlan, Column, Scope, StoreQuery};

/// Backing store for compiled queries
pub trait DocumentStore: Send + Sync {
    /// Documents matching the query, ordered and windowed
    fn find(&self, ctx: &QueryContext, query: &StoreQuery) -> StoreResult<Vec<Document>>;

    /// Number of documents matching the query's scope and condition
    fn count(&self, ctx: &QueryContext, query: &StoreQuery) -> StoreResult<u64>;

    /// Distinct non-null values of `column` under the query's condition
    fn distinct(&self, ctx: &QueryContext, query: &StoreQuery, column: &Column) -> StoreResult<Vec<Value>>;

    /// Grouped aggregate rows keyed by group names and aggregate aliases,
    /// after `having`, ordering, and limit
    fn aggregate(&self, ctx: &QueryContext, plan: &AggregatePlan) -> StoreResult<Vec<Map<String, Value>>>;

    /// Edges of one relation field for a batch of sources, ordered by
    /// source and then by edge order
    fn relation_edges(&self, ctx: &QueryContext, source_ids: &[Uuid], field: &str) -> StoreResult<Vec<RelationEdge>>;

    /// Documents with the given ids inside `scope`, in no particular order
    fn find_by_ids(&self, ctx: &QueryContext, scope: &Scope, ids: &[Uuid]) -> StoreResult<Vec<Document>>;

    /// Ranked full-text query; `query.rank` must be set
    fn search(&self, ctx: &QueryContext, query: &StoreQuery) -> StoreResult<Vec<ScoredDocument>>;

    /// Number of stored revisions of documents inside `scope`
    fn count_revisions(&self, ctx: &QueryContext, scope: &Scope) -> StoreResult<u64>;

    /// Content types that hold at least one document inside `scope`
    fn content_types(&self, ctx: &QueryContext, scope: &Scope) -> StoreResult<Vec<String>>;
}
