//! License key model and administrative request/response types.
//!
//! This module defines:
//! - `LicenseKey`: the persisted record, also the JSON shape returned to the admin UI
//! - `CreateKeyRequest` / `UpdateKeyRequest`: admin request bodies
//! - `KeyListQuery` / `KeyStatus`: list filtering
//! - `BulkDeleteRequest` / `BulkDeleteReport`: bulk deletion input and aggregate outcome

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Represents an issued license key.
///
/// # Database Table
///
/// Maps to the `license_keys` table with columns:
/// - `id`: Unique identifier (UUID), immutable
/// - `value`: The credential clients present, unique across all keys
/// - `name`: Operator-supplied label
/// - `hwid`: Hardware fingerprint bound on first successful validation
/// - `is_banned`: Administrative block
/// - `expires_at`: Absolute expiry, NULL means never
/// - `created_at`: When the key was issued
///
/// # JSON Shape
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "trial",
///   "value": "KEY-7QX2-M9KD-A4ZP",
///   "hwid": null,
///   "isBanned": false,
///   "expiresAt": "2025-01-08T10:00:00Z",
///   "createdAt": "2025-01-01T10:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseKey {
    pub id: Uuid,

    pub name: String,

    pub value: String,

    /// Hardware fingerprint this key is locked to.
    ///
    /// Only moves from NULL to a concrete value (first-use binding) or back to
    /// NULL through an administrative reset.
    pub hwid: Option<String>,

    /// Blocks validation regardless of binding or expiry.
    pub is_banned: bool,

    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl LicenseKey {
    /// Whether the key is past its expiry at `now`.
    ///
    /// A key expiring exactly at `now` is still usable.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Whether a first-use binding may be written at `now`.
    ///
    /// Stores evaluate this under the same lock (or in the same statement)
    /// that writes the binding.
    pub fn is_bindable(&self, now: DateTime<Utc>) -> bool {
        self.hwid.is_none() && !self.is_banned && !self.is_expired(now)
    }

    /// Status as displayed by the admin panel. A ban outranks a binding.
    pub fn status(&self) -> KeyStatus {
        if self.is_banned {
            KeyStatus::Banned
        } else if self.hwid.is_some() {
            KeyStatus::Used
        } else {
            KeyStatus::Unused
        }
    }

    /// Case-insensitive substring match over name, value and hwid.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.value.to_lowercase().contains(&needle)
            || self
                .hwid
                .as_deref()
                .is_some_and(|hwid| hwid.to_lowercase().contains(&needle))
    }
}

/// Key status derived from ban and binding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Unused,
    Used,
    Banned,
}

/// Unit for computing an expiry relative to creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Months,
    Years,
    /// Never expires, `duration` is ignored.
    Unlimited,
}

/// Expiry as sent by clients: either a full RFC 3339 timestamp or a bare
/// `YYYY-MM-DD` date, which means midnight UTC of that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpiryInput {
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl ExpiryInput {
    /// Timestamps are truncated to microseconds, the precision PostgreSQL keeps.
    pub fn into_datetime(self) -> DateTime<Utc> {
        match self {
            ExpiryInput::Timestamp(ts) => ts.trunc_subsecs(6),
            ExpiryInput::Date(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }
}

/// Request body for creating a new key.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "trial",
///   "duration": 7,
///   "unit": "days"
/// }
/// ```
///
/// # Validation
///
/// - `name`: Required, non-empty after trimming
/// - `value`: Optional, generated when absent
/// - `expiresAt`: Optional explicit expiry, mutually exclusive with `unit`
/// - `duration` + `unit`: Optional relative expiry
///
/// Fields are optional at the serde level so that a missing `name` surfaces
/// as a 400 from the service instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub expires_at: Option<ExpiryInput>,

    #[serde(default)]
    pub duration: Option<u32>,

    #[serde(default)]
    pub unit: Option<DurationUnit>,
}

/// Request body for `PUT /keys/{id}`.
///
/// Absent fields are left untouched. `hwid` and `expiresAt` distinguish
/// "absent" from an explicit `null`:
///
/// ```json
/// { "hwid": null }            // reset the binding
/// { "isBanned": true }        // ban
/// { "name": "renamed" }       // rename
/// { "expiresAt": null }       // make the key unlimited
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKeyRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub is_banned: Option<bool>,

    #[serde(default, deserialize_with = "present")]
    pub hwid: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    pub expires_at: Option<Option<ExpiryInput>>,
}

/// Marks a field as present, keeping an explicit `null` as `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Query string for `GET /keys`.
#[derive(Debug, Default, Deserialize)]
pub struct KeyListQuery {
    #[serde(default)]
    pub search: Option<String>,

    #[serde(default)]
    pub status: Option<KeyStatus>,
}

/// Request body for `POST /keys/bulk-delete`.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

/// Aggregate outcome of a bulk deletion.
///
/// Each id lands in exactly one list; a missing id never aborts the batch.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteReport {
    pub deleted: Vec<Uuid>,
    pub not_found: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key(hwid: Option<&str>, is_banned: bool, expires_at: Option<DateTime<Utc>>) -> LicenseKey {
        LicenseKey {
            id: Uuid::new_v4(),
            name: "Trial Customer".to_string(),
            value: "KEY-AAAA-BBBB-CCCC".to_string(),
            hwid: hwid.map(str::to_string),
            is_banned,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn expiry_is_strictly_before_now() {
        let now = Utc::now();
        assert!(!key(None, false, Some(now)).is_expired(now));
        assert!(key(None, false, Some(now - Duration::seconds(1))).is_expired(now));
        assert!(!key(None, false, None).is_expired(now));
    }

    #[test]
    fn status_prefers_banned_over_used() {
        assert_eq!(key(None, false, None).status(), KeyStatus::Unused);
        assert_eq!(key(Some("ABC"), false, None).status(), KeyStatus::Used);
        assert_eq!(key(Some("ABC"), true, None).status(), KeyStatus::Banned);
    }

    #[test]
    fn search_covers_name_value_and_hwid() {
        let k = key(Some("hw-1234"), false, None);
        assert!(k.matches_search("customer"));
        assert!(k.matches_search("bbbb"));
        assert!(k.matches_search("HW-12"));
        assert!(!k.matches_search("nothing"));
    }

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let reset: UpdateKeyRequest = serde_json::from_str(r#"{"hwid": null}"#).unwrap();
        assert_eq!(reset.hwid, Some(None));

        let rename: UpdateKeyRequest = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(rename.hwid, None);
        assert!(rename.expires_at.is_none());
    }

    #[test]
    fn expiry_accepts_plain_dates() {
        let req: CreateKeyRequest =
            serde_json::from_str(r#"{"name": "a", "expiresAt": "2030-05-01"}"#).unwrap();
        let expires_at = req.expires_at.unwrap().into_datetime();
        assert_eq!(expires_at.to_rfc3339(), "2030-05-01T00:00:00+00:00");
    }

    #[test]
    fn record_serializes_camel_case_with_nulls() {
        let json = serde_json::to_value(key(None, false, None)).unwrap();
        assert!(json["hwid"].is_null());
        assert!(json["expiresAt"].is_null());
        assert_eq!(json["isBanned"], false);
        assert!(json.get("createdAt").is_some());
    }
}
