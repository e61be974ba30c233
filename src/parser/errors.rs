//! Parse error types
//!
//! Error codes:
//! - AERO_QUERY_INVALID_JSON
//! - AERO_QUERY_INVALID_GROUP
//! - AERO_QUERY_UNKNOWN_OPERATOR
//! - AERO_QUERY_INVALID_PREDICATE
//! - AERO_QUERY_INVALID_SORT
//! - AERO_QUERY_INVALID_POPULATE
//! - AERO_QUERY_INVALID_QUERY_STRING
//!
//! Parse errors are always surfaced to the caller; nothing here is
//! recovered silently.

use thiserror::Error;

/// Result type for parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Malformed query input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Body is not valid JSON or not a JSON object
    #[error("Invalid JSON query: {0}")]
    InvalidJson(String),

    /// `$and`/`$or` not given an array, or `$not` not given an object
    #[error("Logical operator '{key}' expects {expected}")]
    InvalidGroup { key: String, expected: &'static str },

    /// `$op` key that is not in the operator catalog
    #[error("Unknown operator '{operator}' on field '{field}'")]
    UnknownOperator { field: String, operator: String },

    /// Structurally invalid predicate
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    #[error("Invalid populate: {0}")]
    InvalidPopulate(String),

    /// Raw query string could not be decoded
    #[error("Invalid query string: {0}")]
    InvalidQueryString(String),
}

impl ParseError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::InvalidJson(_) => "AERO_QUERY_INVALID_JSON",
            ParseError::InvalidGroup { .. } => "AERO_QUERY_INVALID_GROUP",
            ParseError::UnknownOperator { .. } => "AERO_QUERY_UNKNOWN_OPERATOR",
            ParseError::InvalidPredicate(_) => "AERO_QUERY_INVALID_PREDICATE",
            ParseError::InvalidSort(_) => "AERO_QUERY_INVALID_SORT",
            ParseError::InvalidPopulate(_) => "AERO_QUERY_INVALID_POPULATE",
            ParseError::InvalidQueryString(_) => "AERO_QUERY_INVALID_QUERY_STRING",
        }
    }

    pub(crate) fn group_expects_array(key: &str) -> Self {
        ParseError::InvalidGroup {
            key: key.to_string(),
            expected: "an array of predicate objects",
        }
    }

    pub(crate) fn group_expects_object(key: &str) -> Self {
        ParseError::InvalidGroup {
            key: key.to_string(),
            expected: "a predicate object",
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::InvalidJson(e.to_string())
    }
}
