//! HTTP error responses
//!
//! Every failure is returned as `{ "error", "code", "status" }`:
//! - parse and validation errors: 400
//! - unknown document: 404
//! - cancelled or timed-out queries: 408
//! - store failures: 500

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::executor::ExecutorError;
use crate::parser::ParseError;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub status: u16,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        let status = match &err {
            ExecutorError::NotFound { .. } => StatusCode::NOT_FOUND,
            ExecutorError::Store { source, .. } if source.is_interrupted() => StatusCode::REQUEST_TIMEOUT,
            ExecutorError::Store { source: StoreError::Unsupported(_), .. } => StatusCode::NOT_IMPLEMENTED,
            ExecutorError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<ParseError> for ApiError {
    fn from(err: ParseError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            code: self.code,
            status: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Result type for route handlers
pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Operation;
    use crate::schema::{FieldLocation, ValidationError};

    #[test]
    fn test_status_mapping() {
        let validation: ApiError = ExecutorError::from(ValidationError::unknown_field("colour", FieldLocation::Filter)).into();
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.code(), "AERO_QUERY_UNKNOWN_FIELD");

        let missing: ApiError = ExecutorError::not_found("article", "x").into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let cancelled: ApiError = ExecutorError::store(Operation::List, StoreError::Cancelled).into();
        assert_eq!(cancelled.status(), StatusCode::REQUEST_TIMEOUT);

        let failed: ApiError = ExecutorError::store(Operation::Count, StoreError::backend("down")).into();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.code(), "AERO_STORE_FAILED");
    }

    #[test]
    fn test_parse_error_is_bad_request() {
        let err: ApiError = ParseError::InvalidJson("eof".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "AERO_QUERY_INVALID_JSON");
    }
}
