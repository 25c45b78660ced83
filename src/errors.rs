//! Structured error types with machine-readable codes
//! Gives API clients stable error identifiers alongside human-readable messages

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire shape for every error body this API returns.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable identifier, e.g. `TASK_NOT_FOUND`
    pub code: String,

    /// Human-readable description
    pub message: String,

    /// Optional extra context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Filled in when a tracing middleware provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Everything a handler can fail with, grouped by HTTP class.
#[derive(Debug)]
pub enum AppError {
    // Validation Errors (400)
    InvalidInput { field: String, reason: String },
    InvalidUserId(String),
    InvalidConversationId(String),

    // Not Found Errors (404)
    TaskNotFound(i64),
    ConversationNotFound(String),

    // Internal Errors (500)
    StorageError(String),
    DatabaseError(String),

    // Service Errors (503)
    ServiceUnavailable(String),

    // Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl AppError {
    /// Status and stable code for each variant, in one table.
    fn classify(&self) -> (StatusCode, &'static str) {
        use StatusCode as S;
        match self {
            Self::InvalidInput { .. } => (S::BAD_REQUEST, "INVALID_INPUT"),
            Self::InvalidUserId(_) => (S::BAD_REQUEST, "INVALID_USER_ID"),
            Self::InvalidConversationId(_) => (S::BAD_REQUEST, "INVALID_CONVERSATION_ID"),
            Self::TaskNotFound(_) => (S::NOT_FOUND, "TASK_NOT_FOUND"),
            Self::ConversationNotFound(_) => (S::NOT_FOUND, "CONVERSATION_NOT_FOUND"),
            Self::StorageError(_) => (S::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            Self::DatabaseError(_) => (S::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Self::ServiceUnavailable(_) => (S::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (S::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    pub fn code(&self) -> &'static str {
        self.classify().1
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    /// Body sent to the client for this error.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            details: None,
            request_id: None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { field, reason } => {
                write!(f, "Invalid input for field '{field}': {reason}")
            }
            Self::InvalidUserId(msg) => write!(f, "Invalid user ID: {msg}"),
            Self::InvalidConversationId(msg) => write!(f, "Invalid conversation ID: {msg}"),
            Self::TaskNotFound(id) => write!(f, "Task not found: {id}"),
            Self::ConversationNotFound(id) => write!(f, "Conversation not found: {id}"),
            Self::StorageError(msg) => write!(f, "Storage error: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::ServiceUnavailable(msg) => write!(f, "Service unavailable: {msg}"),
            Self::Internal(err) => write!(f, "Internal error: {err}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.to_response())).into_response()
    }
}

/// Adapts anyhow-based validators to field-tagged 400s.
pub trait ValidationErrorExt<T> {
    fn map_validation_err(self, field: &str) -> Result<T>;
}

impl<T> ValidationErrorExt<T> for anyhow::Result<T> {
    fn map_validation_err(self, field: &str) -> Result<T> {
        self.map_err(|e| AppError::InvalidInput {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::InvalidUserId("test".to_string()).code(),
            "INVALID_USER_ID"
        );
        assert_eq!(AppError::TaskNotFound(123).code(), "TASK_NOT_FOUND");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::InvalidUserId("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::TaskNotFound(123).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::StorageError("failed".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::ServiceUnavailable("llm down".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_display_messages() {
        let err = AppError::InvalidInput {
            field: "title".to_string(),
            reason: "too long".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid input for field 'title': too long");
        assert_eq!(
            AppError::TaskNotFound(7).to_string(),
            "Task not found: 7"
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let err = AppError::ConversationNotFound("abc-123".to_string());
        let response = err.to_response();

        assert_eq!(response.code, "CONVERSATION_NOT_FOUND");
        assert!(response.message.contains("abc-123"));
    }

    #[test]
    fn test_validation_err_mapping() {
        let result: anyhow::Result<()> =
            Err(anyhow::anyhow!("Title must be between 1 and 200 characters"));
        let mapped = result.map_validation_err("title");

        match mapped {
            Err(AppError::InvalidInput { field, reason }) => {
                assert_eq!(field, "title");
                assert!(reason.contains("200"));
            }
            _ => panic!("expected InvalidInput"),
        }
    }
}
