//! Store error types
//!
//! Error codes:
//! - AERO_QUERY_CANCELLED
//! - AERO_QUERY_TIMEOUT
//! - AERO_STORE_UNSUPPORTED
//! - AERO_STORE_FIXTURES_INVALID
//! - AERO_STORE_FAILED
//!
//! Store errors are never retried by the engine.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The caller cancelled the request
    #[error("Query cancelled")]
    Cancelled,

    /// The request deadline passed before the store call ran
    #[error("Query deadline exceeded")]
    DeadlineExceeded,

    /// The store cannot run this kind of query
    #[error("Unsupported store operation: {0}")]
    Unsupported(String),

    /// Seed data could not be loaded
    #[error("Invalid fixtures: {0}")]
    InvalidFixtures(String),

    /// Failure inside the backing store
    #[error("Store failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Cancelled => "AERO_QUERY_CANCELLED",
            StoreError::DeadlineExceeded => "AERO_QUERY_TIMEOUT",
            StoreError::Unsupported(_) => "AERO_STORE_UNSUPPORTED",
            StoreError::InvalidFixtures(_) => "AERO_STORE_FIXTURES_INVALID",
            StoreError::Backend(_) => "AERO_STORE_FAILED",
        }
    }

    /// Cancellation and deadline errors come from the caller, not the store
    pub fn is_interrupted(&self) -> bool {
        matches!(self, StoreError::Cancelled | StoreError::DeadlineExceeded)
    }

    pub fn backend(reason: impl Into<String>) -> Self {
        StoreError::Backend(reason.into())
    }
}
