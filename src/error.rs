/// Unified error types for Courtline
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the waitlist service
#[derive(Error, Debug)]
pub enum WaitlistError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Missing event, season or entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict errors (e.g. a waitlist slot taken by a concurrent enrollment)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unauthorized trigger of an operator endpoint
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Email delivery errors
    #[error("Email error: {0}")]
    Email(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert WaitlistError to HTTP response
impl IntoResponse for WaitlistError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            WaitlistError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            WaitlistError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            WaitlistError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            WaitlistError::Authorization(_) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized", self.to_string())
            }
            WaitlistError::Database(_)
            | WaitlistError::Migration(_)
            | WaitlistError::Internal(_)
            | WaitlistError::Io(_)
            | WaitlistError::Email(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for waitlist operations
pub type WaitlistResult<T> = Result<T, WaitlistError>;
