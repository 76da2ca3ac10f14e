//! Error types and HTTP error response handling.
//!
//! Validation failures (unknown, banned, expired, mismatched keys) are not
//! errors: they are successful responses with `valid: false`. This module
//! only covers failures of the request itself.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::store::StoreError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Resource Errors**: Targeted key does not exist
/// - **Conflict Errors**: Key value already taken
/// - **Validation Errors**: Invalid request data
/// - **Authentication Errors**: Missing or wrong admin token
/// - **Storage Errors**: Database, I/O or serialization failure
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Returns HTTP 404 Not Found.
    #[error("Key not found")]
    KeyNotFound,

    /// A key with the same value exists. Returns HTTP 409 Conflict.
    #[error("Key value already exists")]
    DuplicateKeyValue,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request. The String says what was invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Admin token missing or wrong. Returns HTTP 401 Unauthorized.
    #[error("Invalid admin token")]
    InvalidAdminToken,

    /// First-use binding kept losing to concurrent writers.
    ///
    /// Returns HTTP 503 Service Unavailable; the client may retry.
    #[error("Key is being modified concurrently, retry")]
    Contention,

    /// Storage failed. Returns HTTP 500 and hides details from the client.
    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::KeyNotFound,
            StoreError::Conflict => AppError::DuplicateKeyValue,
            other => AppError::Store(other),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidRequest` → 400 Bad Request
/// - `InvalidAdminToken` → 401 Unauthorized
/// - `KeyNotFound` → 404 Not Found
/// - `DuplicateKeyValue` → 409 Conflict
/// - `Contention` → 503 Service Unavailable
/// - `Store` → 500 Internal Server Error
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::KeyNotFound => (StatusCode::NOT_FOUND, "key_not_found", self.to_string()),
            AppError::DuplicateKeyValue => {
                (StatusCode::CONFLICT, "duplicate_key_value", self.to_string())
            }
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::InvalidAdminToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_admin_token",
                self.to_string(),
            ),
            AppError::Contention => (
                StatusCode::SERVICE_UNAVAILABLE,
                "contention",
                self.to_string(),
            ),
            AppError::Store(ref err) => {
                tracing::error!(error = %err, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
