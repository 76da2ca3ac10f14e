//! Key administration HTTP handlers.
//!
//! This module implements the operator-facing endpoints:
//! - GET /keys - List keys (optional `search` and `status` filters)
//! - POST /keys - Create a key
//! - GET /keys/{id} - Get one key
//! - PUT /keys/{id} - Partial update (rename, ban, reset hwid, expiry)
//! - DELETE /keys/{id} - Delete a key
//! - POST /keys/{id}/ban, /keys/{id}/unban, /keys/{id}/reset-hwid
//! - POST /keys/bulk-delete - Delete selected keys
//! - POST /keys/delete-used - Delete every bound key

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::license_key::{
        BulkDeleteReport, BulkDeleteRequest, CreateKeyRequest, KeyListQuery, LicenseKey,
        UpdateKeyRequest,
    },
    state::AppState,
    store::KeyStore,
};

/// Unwrap a JSON body, turning extractor rejections into 400s.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

/// Unwrap an `{id}` segment. No key can have an id that is not a UUID, so a
/// malformed one is reported as a missing key.
fn key_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected key id");
        AppError::KeyNotFound
    })
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

/// List keys, newest first.
///
/// # Endpoint
///
/// `GET /keys?search=<term>&status=<unused|used|banned>`
///
/// # Response
///
/// - **Success (200 OK)**: Array of key records (may be empty)
pub async fn list_keys<S: KeyStore>(
    State(state): State<AppState<S>>,
    query: Result<Query<KeyListQuery>, QueryRejection>,
) -> Result<Json<Vec<LicenseKey>>, AppError> {
    let query = query_params(query)?;
    let keys = state.keys.list_keys(&query).await?;
    Ok(Json(keys))
}

/// Create a new key.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "trial",
///   "duration": 7,
///   "unit": "days"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: The created record
/// - **Error (400)**: Missing name or invalid expiry
/// - **Error (409)**: Supplied value already exists
pub async fn create_key<S: KeyStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<CreateKeyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let key = state.keys.create_key(request).await?;

    Ok((StatusCode::CREATED, Json(key)))
}

pub async fn get_key<S: KeyStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<LicenseKey>, AppError> {
    let id = key_id(id)?;
    Ok(Json(state.keys.get_key(id).await?))
}

/// Apply a partial update.
///
/// # Request Body
///
/// Any subset of `name`, `isBanned`, `hwid` (null only), `expiresAt`.
///
/// # Response
///
/// - **Success (200 OK)**: The updated record
/// - **Error (400)**: Empty name or non-null hwid
/// - **Error (404)**: No key with this id
pub async fn update_key<S: KeyStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateKeyRequest>, JsonRejection>,
) -> Result<Json<LicenseKey>, AppError> {
    let id = key_id(id)?;
    let request = json_body(payload)?;
    Ok(Json(state.keys.update_key(id, request).await?))
}

/// Delete a key.
///
/// # Response
///
/// - **Success (204 No Content)**
/// - **Error (404)**: No key with this id
pub async fn delete_key<S: KeyStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = key_id(id)?;
    state.keys.delete_key(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn ban_key<S: KeyStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<LicenseKey>, AppError> {
    let id = key_id(id)?;
    Ok(Json(state.keys.set_banned(id, true).await?))
}

pub async fn unban_key<S: KeyStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<LicenseKey>, AppError> {
    let id = key_id(id)?;
    Ok(Json(state.keys.set_banned(id, false).await?))
}

/// Clear the hardware binding so the next validation binds afresh.
pub async fn reset_hwid<S: KeyStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<LicenseKey>, AppError> {
    let id = key_id(id)?;
    Ok(Json(state.keys.reset_binding(id).await?))
}

/// Delete the selected keys.
///
/// # Request Body
///
/// ```json
/// { "ids": ["550e8400-e29b-41d4-a716-446655440000"] }
/// ```
///
/// # Response (200 OK)
///
/// ```json
/// { "deleted": ["550e8400-..."], "notFound": [] }
/// ```
pub async fn bulk_delete<S: KeyStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> Result<Json<BulkDeleteReport>, AppError> {
    let request = json_body(payload)?;
    Ok(Json(state.keys.delete_many(&request.ids).await?))
}

/// Delete every key bound to a hardware id at the time of listing.
pub async fn delete_used<S: KeyStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<BulkDeleteReport>, AppError> {
    Ok(Json(state.keys.delete_used().await?))
}
