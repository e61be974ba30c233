//! Query validation errors
//!
//! Error codes:
//! - AERO_QUERY_UNKNOWN_FIELD
//! - AERO_QUERY_INVALID_OPERATOR
//! - AERO_QUERY_INVALID_AGGREGATION
//! - AERO_UNKNOWN_CONTENT_TYPE
//! - AERO_SCHEMA_MALFORMED
//!
//! Validation errors are raised before any store call is made.

use std::fmt;

use thiserror::Error;

/// Where in the query an offending field appeared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    Filter,
    Sort,
    Select,
    Populate,
    GroupBy,
    Aggregation,
    Having,
}

impl fmt::Display for FieldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldLocation::Filter => "filter",
            FieldLocation::Sort => "sort",
            FieldLocation::Select => "select",
            FieldLocation::Populate => "populate",
            FieldLocation::GroupBy => "groupBy",
            FieldLocation::Aggregation => "aggregation",
            FieldLocation::Having => "having",
        };
        write!(f, "{}", s)
    }
}

/// Result type for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Field is neither declared nor a system field
    #[error("Unknown field '{field}' in {location}")]
    UnknownField { field: String, location: FieldLocation },

    /// Operator cannot take the supplied value
    #[error("Invalid operator '{operator}' on field '{field}': {reason}")]
    InvalidOperator {
        field: String,
        operator: String,
        reason: String,
    },

    #[error("Invalid aggregation '{alias}': {reason}")]
    InvalidAggregation { alias: String, reason: String },

    #[error("Unknown content type '{0}'")]
    UnknownContentType(String),

    /// Schema definition itself could not be read
    #[error("Malformed schema '{source_name}': {reason}")]
    MalformedSchema { source_name: String, reason: String },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnknownField { .. } => "AERO_QUERY_UNKNOWN_FIELD",
            ValidationError::InvalidOperator { .. } => "AERO_QUERY_INVALID_OPERATOR",
            ValidationError::InvalidAggregation { .. } => "AERO_QUERY_INVALID_AGGREGATION",
            ValidationError::UnknownContentType(_) => "AERO_UNKNOWN_CONTENT_TYPE",
            ValidationError::MalformedSchema { .. } => "AERO_SCHEMA_MALFORMED",
        }
    }

    pub fn unknown_field(field: impl Into<String>, location: FieldLocation) -> Self {
        ValidationError::UnknownField {
            field: field.into(),
            location,
        }
    }

    pub fn invalid_operator(field: &str, operator: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidOperator {
            field: field.to_string(),
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed_schema(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::MalformedSchema {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// The offending field, if the error concerns one
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::UnknownField { field, .. } | ValidationError::InvalidOperator { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}
