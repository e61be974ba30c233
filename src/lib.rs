//! aeroquery - dynamic filter and query engine for schema-less document content
//!
//! Two query grammars (URL parameters and JSON bodies) parse into one query
//! tree, which is validated against a field schema and compiled into a
//! store-native query. The engine runs the compiled queries through a
//! `DocumentStore`, populates relations in batches, aggregates, and searches.
//!
//! ```ignore
//! use aeroquery::{parser, executor::QueryExecutor, store::QueryContext};
//!
//! let query = parser::parse_query_string("filter[price]=gte.100&sort=-createdAt")?;
//! let page = QueryExecutor::new(&store, &schemas, &config)
//!     .execute(&QueryContext::new(), "article", &query)?;
//! ```

pub mod aggregate;
pub mod builder;
pub mod cli;
pub mod config;
pub mod executor;
pub mod http_server;
pub mod observability;
pub mod parser;
pub mod populate;
pub mod query;
pub mod schema;
pub mod search;
pub mod store;
