//! Query parsing
//!
//! Two surface syntaxes, one AST:
//!
//! - URL parameters: `filter[price]=gte.10&sort=-createdAt&page=2`
//! - JSON bodies: `{"filter": {"price": {"$gte": 10}}, "sort": "-createdAt"}`
//!
//! Both produce a `crate::query::Query`. Unknown operators are rejected
//! here, so everything downstream works with the closed operator set.

mod errors;
mod json;
mod url;

pub use errors::{ParseError, ParseResult};
pub use json::{parse_aggregate_json, parse_filters, parse_json, parse_json_value, parse_populate, parse_sort};
pub use url::{parse_query_string, parse_url_values, to_url_values, UrlValues};
