//! Custom error types for the auth service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::IdentityError;
use serde_json::json;
use thiserror::Error;

/// Error returned by the auth service's handlers
#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing or malformed credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Request body failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// No session monitor is running
    #[error("No active session")]
    NoSession,

    /// The identity backend failed
    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AuthError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AuthError::NoSession => (StatusCode::CONFLICT, "No active session".to_string()),
            AuthError::Identity(
                e @ (IdentityError::InvalidCredentials | IdentityError::NotSignedIn),
            ) => (StatusCode::UNAUTHORIZED, e.to_string()),
            AuthError::Identity(e @ IdentityError::AlreadyRegistered(_)) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            AuthError::Identity(_) => (
                StatusCode::BAD_GATEWAY,
                "Identity provider error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for auth service results
pub type AuthResult<T> = Result<T, AuthError>;
