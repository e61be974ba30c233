//! Field schemas and query validation
//!
//! The engine never owns schemas; it reads them to resolve field names,
//! pick type casts, and reject queries that reference unknown fields or
//! give operators the wrong kind of operand.

mod errors;
mod registry;
mod types;
mod validator;

pub use errors::{FieldLocation, ValidationError, ValidationResult};
pub use registry::SchemaRegistry;
pub use types::{FieldDef, FieldSchema, FieldType, ResolvedField};
pub use validator::{validate, QueryValidator};
