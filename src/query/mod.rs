//! Canonical query representation
//!
//! Both surface syntaxes (URL parameters and JSON bodies) parse into the
//! types defined here:
//!
//! - `ast`: `Query`, `FilterGroup`, `FilterCondition`, sort, populate,
//!   pagination, and aggregate query shapes
//! - `operators`: the closed operator catalog and alias resolution
//! - `fields`: the system-field registry
//! - `value`: the tagged `FilterValue` operand

mod ast;
mod fields;
mod operators;
mod value;

pub use ast::{
    AggregateOperator, AggregateQuery, Aggregation, DateTrunc, FilterCondition, FilterGroup, LogicalOperator,
    Pagination, PopulateOption, Query, SortField, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use fields::{is_system_field, SystemField, SYSTEM_FIELDS, SYSTEM_FIELD_PREFIX};
pub use operators::{resolve_operator, FieldCategory, FilterOperator, ValueShape, OPERATORS};
pub use value::FilterValue;
