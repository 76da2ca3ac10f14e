//! HWID Key Server
//!
//! Issues license keys and validates them for end clients. On first
//! successful validation a key is permanently bound to the caller's hardware
//! id (HWID); later validations from other hardware are rejected.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Storage**: `KeyStore` trait, backed by PostgreSQL (sqlx) or a JSON document
//! - **Engine**: `KeyService`, the key lifecycle and validation rules
//! - **Format**: JSON requests/responses

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{middleware::auth::AdminAuth, state::AppState, store::KeyStore};

/// Build the HTTP router.
///
/// `/health` and `/validate` are public; every `/keys` route goes through
/// the admin token middleware.
pub fn build_router<S: KeyStore>(state: AppState<S>, admin_auth: AdminAuth) -> Router {
    use crate::handlers::{health, keys, validate};

    let admin_routes = Router::new()
        .route("/keys", get(keys::list_keys::<S>).post(keys::create_key::<S>))
        .route("/keys/bulk-delete", post(keys::bulk_delete::<S>))
        .route("/keys/delete-used", post(keys::delete_used::<S>))
        .route(
            "/keys/{id}",
            get(keys::get_key::<S>)
                .put(keys::update_key::<S>)
                .delete(keys::delete_key::<S>),
        )
        .route("/keys/{id}/ban", post(keys::ban_key::<S>))
        .route("/keys/{id}/unban", post(keys::unban_key::<S>))
        .route("/keys/{id}/reset-hwid", post(keys::reset_hwid::<S>))
        .route_layer(axum_middleware::from_fn_with_state(
            admin_auth,
            middleware::auth::admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check::<S>))
        .route("/validate", post(validate::validate_key::<S>))
        // Path used by already-deployed client scripts
        .route("/api/validate", post(validate::validate_key::<S>))
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
