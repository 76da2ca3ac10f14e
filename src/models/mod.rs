//! Data models representing stored entities and API bodies.

/// License key record and admin request types
pub mod license_key;
/// Client validation request/response types
pub mod validation;
