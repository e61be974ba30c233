//! Query executor
//!
//! Runs validated queries against a `DocumentStore` and assembles paginated
//! results. Validation always happens before the store sees a query; list
//! and count are independent store calls.

mod errors;
mod executor;
mod result;

pub use errors::{ExecutorError, ExecutorResult, Operation, StoreResultExt};
pub use executor::QueryExecutor;
pub(crate) use executor::reshape;
pub use result::{total_pages, AggregateResult, QueryResult};
