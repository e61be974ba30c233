//! Query compilation
//!
//! Turns a validated `Query` into a store-native `StoreQuery`: resolved
//! columns with type casts, a typed condition tree, ordering, window, and
//! projection. `sql` renders compiled queries as PostgreSQL for stores
//! backed by a relational database with JSONB documents.

mod builder;
mod condition;
mod plan;
pub mod sql;

pub use builder::{QueryBuilder, DEFAULT_SEARCH_LANGUAGE};
pub use condition::{escape_like, Cast, Column, CompareOp, Condition};
pub use plan::{
    AggregateExpr, AggregatePlan, GroupKey, OrderTerm, OutputOrder, Projection, RankSpec, Scope, StoreQuery,
};
pub use sql::SqlStatement;
