//! Client-facing validation endpoint.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    handlers::keys::json_body,
    models::validation::{ValidateRequest, ValidationResponse},
    state::AppState,
    store::KeyStore,
};

/// Validate a key for a hardware id.
///
/// # Endpoint
///
/// `POST /validate` (also mounted at `/api/validate`)
///
/// # Request Body
///
/// ```json
/// { "keyValue": "KEY-7QX2-M9KD-A4ZP", "hwid": "ABC" }
/// ```
///
/// # Response
///
/// - **200 OK**: `{ "valid": true, "message": "ok" }`, or `valid: false`
///   with one of `unknown key`, `banned`, `expired`, `hwid mismatch`
/// - **400 Bad Request**: `{ "valid": false, "message": "invalid request" }`
///   when `keyValue` or `hwid` is missing
///
/// A rejected key is a 200: clients must not confuse it with a transport
/// failure.
pub async fn validate_key<S: KeyStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let result = match json_body(payload) {
        Ok(request) => state.keys.validate(request).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(outcome) => Ok(Json(ValidationResponse::from(outcome)).into_response()),
        Err(AppError::InvalidRequest(reason)) => {
            tracing::debug!(%reason, "Malformed validation request");
            Ok((
                StatusCode::BAD_REQUEST,
                Json(ValidationResponse::invalid_request()),
            )
                .into_response())
        }
        Err(err) => Err(err),
    }
}
