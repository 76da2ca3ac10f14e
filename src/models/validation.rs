//! Validation request/response types for end-client callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for `POST /validate`.
///
/// ```json
/// {
///   "keyValue": "KEY-7QX2-M9KD-A4ZP",
///   "hwid": "4C4C4544-0036-3010-8058-B4C04F4E4232"
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    #[serde(default)]
    pub key_value: Option<String>,

    #[serde(default)]
    pub hwid: Option<String>,
}

/// Why a presented key does not grant access.
///
/// These are normal outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    UnknownKey,
    Banned,
    Expired,
    HwidMismatch,
}

impl InvalidReason {
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidReason::UnknownKey => "unknown key",
            InvalidReason::Banned => "banned",
            InvalidReason::Expired => "expired",
            InvalidReason::HwidMismatch => "hwid mismatch",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of validating a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Access granted. `bound` is true when this call performed the first-use binding.
    Valid { bound: bool },
    Invalid(InvalidReason),
}

/// Response body for `POST /validate`.
///
/// ```json
/// { "valid": false, "message": "hwid mismatch" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub message: String,
}

impl ValidationResponse {
    /// Body returned with a 400 when `keyValue` or `hwid` is missing.
    pub fn invalid_request() -> Self {
        Self {
            valid: false,
            message: "invalid request".to_string(),
        }
    }
}

impl From<ValidationOutcome> for ValidationResponse {
    fn from(outcome: ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Valid { .. } => Self {
                valid: true,
                message: "ok".to_string(),
            },
            ValidationOutcome::Invalid(reason) => Self {
                valid: false,
                message: reason.to_string(),
            },
        }
    }
}
