//! Executor error types
//!
//! Parse and validation errors pass through unchanged. Store errors are
//! wrapped with the operation that failed. Codes come from the wrapped error
//! where there is one:
//! - AERO_QUERY_* (parse, validation)
//! - AERO_STORE_* / AERO_QUERY_CANCELLED / AERO_QUERY_TIMEOUT (store)
//! - AERO_DOCUMENT_NOT_FOUND
//! - AERO_QUERY_INVALID_AGGREGATION

use std::fmt;

use thiserror::Error;

use crate::observability::Event;
use crate::parser::ParseError;
use crate::schema::ValidationError;
use crate::store::StoreError;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Engine operations, as named in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Count,
    Exists,
    Get,
    Ids,
    Distinct,
    Aggregate,
    Stats,
    Populate,
    Search,
    Suggest,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Count => "count",
            Operation::Exists => "exists",
            Operation::Get => "get",
            Operation::Ids => "ids",
            Operation::Distinct => "distinct",
            Operation::Aggregate => "aggregate",
            Operation::Stats => "stats",
            Operation::Populate => "populate",
            Operation::Search => "search",
            Operation::Suggest => "suggest",
        }
    }

    /// Event logged when the operation succeeds
    pub fn event(&self) -> Event {
        match self {
            Operation::Aggregate | Operation::Stats => Event::AggregateExecuted,
            Operation::Populate => Event::PopulateCompleted,
            Operation::Search | Operation::Suggest => Event::SearchExecuted,
            _ => Event::QueryExecuted,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{operation} failed: {source}")]
    Store {
        operation: Operation,
        #[source]
        source: StoreError,
    },

    #[error("No '{content_type}' document with id '{id}'")]
    NotFound { content_type: String, id: String },

    #[error("Invalid aggregate: {0}")]
    InvalidAggregate(String),
}

impl ExecutorError {
    pub fn store(operation: Operation, source: StoreError) -> Self {
        ExecutorError::Store { operation, source }
    }

    pub fn not_found(content_type: &str, id: impl Into<String>) -> Self {
        ExecutorError::NotFound {
            content_type: content_type.to_string(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ExecutorError::Parse(e) => e.code(),
            ExecutorError::Validation(e) => e.code(),
            ExecutorError::Store { source, .. } => source.code(),
            ExecutorError::NotFound { .. } => "AERO_DOCUMENT_NOT_FOUND",
            ExecutorError::InvalidAggregate(_) => "AERO_QUERY_INVALID_AGGREGATION",
        }
    }

    /// Errors caused by the request itself rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExecutorError::Parse(_) | ExecutorError::Validation(_) | ExecutorError::InvalidAggregate(_)
        )
    }

    /// Operation that failed, for store errors
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ExecutorError::Store { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

/// Attaches the failing operation to store errors.
pub trait StoreResultExt<T> {
    fn during(self, operation: Operation) -> ExecutorResult<T>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn during(self, operation: Operation) -> ExecutorResult<T> {
        self.map_err(|e| ExecutorError::store(operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldLocation;

    #[test]
    fn test_store_error_names_operation() {
        let err: ExecutorResult<()> = Err(StoreError::backend("connection reset")).during(Operation::Count);
        let err = err.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::Count));
        assert_eq!(err.code(), "AERO_STORE_FAILED");
        assert_eq!(err.to_string(), "count failed: Store failure: connection reset");
    }

    #[test]
    fn test_wrapped_codes_pass_through() {
        let err: ExecutorError = ValidationError::unknown_field("colour", FieldLocation::Filter).into();
        assert_eq!(err.code(), "AERO_QUERY_UNKNOWN_FIELD");
        assert!(err.is_client_error());

        let err = ExecutorError::store(Operation::List, StoreError::Cancelled);
        assert_eq!(err.code(), "AERO_QUERY_CANCELLED");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_operation_events() {
        assert_eq!(Operation::Populate.event(), Event::PopulateCompleted);
        assert_eq!(Operation::List.event(), Event::QueryExecuted);
    }
}
