//! HTTP request handlers (route handlers).
//!
//! Handlers translate HTTP input into `KeyService` calls and format the
//! result; the lifecycle rules live in `services`.

/// Service health endpoint
pub mod health;
/// Key administration endpoints
pub mod keys;
/// Client validation endpoint
pub mod validate;
