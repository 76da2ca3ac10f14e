//! Admin token authentication middleware.
//!
//! Guards the `/keys` routes when an `ADMIN_TOKEN` is configured:
//! 1. Extract the token from the Authorization header
//! 2. Hash it and compare against the configured token's hash
//! 3. Reject mismatches with HTTP 401
//!
//! Without a configured token the routes are open.

use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

/// Admin credentials, shared with the middleware via state.
///
/// Only the SHA-256 digest of the token is kept, so the comparison runs
/// over fixed-length hex strings.
#[derive(Debug, Clone, Default)]
pub struct AdminAuth {
    token_hash: Option<String>,
}

impl AdminAuth {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token_hash: token.filter(|t| !t.is_empty()).map(hash_token),
        }
    }

    /// No token configured; every request passes.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.token_hash.is_some()
    }

    fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.token_hash, presented) {
            (None, _) => true,
            (Some(expected), Some(token)) => hash_token(token) == *expected,
            (Some(_), None) => false,
        }
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Admin authentication middleware function.
///
/// # Headers
///
/// Expected header format:
/// ```text
/// Authorization: Bearer <admin token>
/// ```
///
/// # Returns
///
/// - `Ok(Response)` if the token matches or no token is configured
/// - `Err(AppError::InvalidAdminToken)` otherwise (returns 401)
pub async fn admin_auth_middleware(
    State(auth): State<AdminAuth>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if !auth.accepts(presented) {
        tracing::warn!(
            uri = %request.uri(),
            header_present = presented.is_some(),
            "Rejected admin request"
        );
        return Err(AppError::InvalidAdminToken);
    }

    Ok(next.run(request).await)
}
