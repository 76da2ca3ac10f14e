//! Key validation for end clients.
//!
//! # Decision Order
//!
//! First match wins:
//! 1. No key with this value → invalid, "unknown key"
//! 2. Banned → invalid, "banned"
//! 3. Expired → invalid, "expired"
//! 4. Bound to a different HWID → invalid, "hwid mismatch"
//! 5. Unbound → bind the presented HWID, valid
//! 6. Bound to the presented HWID → valid
//!
//! # Atomicity
//!
//! Step 5 is a compare-and-swap in the store (`bind_hwid`), which re-checks
//! steps 2-4 under the same lock as the write. When the swap loses to a
//! concurrent writer (another bind, a ban, a delete) the record is read again
//! and the decision re-run, so two clients racing with different HWIDs can
//! never both be accepted.

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        license_key::LicenseKey,
        validation::{InvalidReason, ValidateRequest, ValidationOutcome},
    },
    services::key_service::KeyService,
    store::{KeyStore, StoreError},
};

/// Read-decide-bind rounds before reporting contention.
const MAX_BIND_ATTEMPTS: usize = 3;

/// What to do with a presented HWID, given the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Reject(InvalidReason),
    /// Already bound to this HWID.
    Accept,
    /// Unbound and otherwise valid: bind on first use.
    Bind,
}

/// Steps 2-6 of the decision order, without side effects.
pub fn decide(key: &LicenseKey, hwid: &str, now: DateTime<Utc>) -> Decision {
    if key.is_banned {
        return Decision::Reject(InvalidReason::Banned);
    }
    if key.is_expired(now) {
        return Decision::Reject(InvalidReason::Expired);
    }
    match key.hwid.as_deref() {
        Some(bound) if bound != hwid => Decision::Reject(InvalidReason::HwidMismatch),
        Some(_) => Decision::Accept,
        None => Decision::Bind,
    }
}

/// Pull non-empty `keyValue` and `hwid` out of a request.
fn required_fields(request: ValidateRequest) -> Result<(String, String), AppError> {
    let key_value = request.key_value.filter(|v| !v.is_empty());
    let hwid = request.hwid.filter(|h| !h.is_empty());

    match (key_value, hwid) {
        (Some(key_value), Some(hwid)) => Ok((key_value, hwid)),
        _ => Err(AppError::InvalidRequest(
            "keyValue and hwid are required".to_string(),
        )),
    }
}

impl<S: KeyStore> KeyService<S> {
    /// Validate a presented key and HWID, binding on first use.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: `keyValue` or `hwid` missing or empty
    /// - `Contention`: Binding lost the race too many times in a row
    /// - `Store`: Storage failure
    ///
    /// An invalid key is `Ok(ValidationOutcome::Invalid(_))`, not an error.
    pub async fn validate(&self, request: ValidateRequest) -> Result<ValidationOutcome, AppError> {
        let (key_value, hwid) = required_fields(request)?;
        let now = Utc::now();

        for attempt in 1..=MAX_BIND_ATTEMPTS {
            let key = match self.store.find_by_value(&key_value).await {
                Ok(key) => key,
                Err(StoreError::NotFound) => {
                    tracing::debug!("Validation rejected: unknown key");
                    return Ok(ValidationOutcome::Invalid(InvalidReason::UnknownKey));
                }
                Err(err) => return Err(err.into()),
            };

            match decide(&key, &hwid, now) {
                Decision::Reject(reason) => {
                    tracing::debug!(key_id = %key.id, %reason, "Validation rejected");
                    return Ok(ValidationOutcome::Invalid(reason));
                }
                Decision::Accept => return Ok(ValidationOutcome::Valid { bound: false }),
                Decision::Bind => {
                    if self.store.bind_hwid(key.id, &hwid, now).await?.is_some() {
                        tracing::info!(key_id = %key.id, "Key bound to hardware id on first use");
                        return Ok(ValidationOutcome::Valid { bound: true });
                    }
                    tracing::debug!(key_id = %key.id, attempt, "Binding lost a race, re-evaluating");
                }
            }
        }

        tracing::warn!("Giving up on validation after repeated binding conflicts");
        Err(AppError::Contention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::license_key::{CreateKeyRequest, ExpiryInput},
        store::FileKeyStore,
    };
    use chrono::Duration;
    use uuid::Uuid;

    fn record(hwid: Option<&str>, is_banned: bool, expires_at: Option<DateTime<Utc>>) -> LicenseKey {
        LicenseKey {
            id: Uuid::new_v4(),
            name: "k".to_string(),
            value: "KEY-1".to_string(),
            hwid: hwid.map(str::to_string),
            is_banned,
            expires_at,
            created_at: Utc::now(),
        }
    }

    fn request(key_value: &str, hwid: &str) -> ValidateRequest {
        ValidateRequest {
            key_value: Some(key_value.to_string()),
            hwid: Some(hwid.to_string()),
        }
    }

    #[test]
    fn ban_outranks_everything() {
        let now = Utc::now();
        let past = Some(now - Duration::days(1));
        assert_eq!(
            decide(&record(Some("OTHER"), true, past), "ABC", now),
            Decision::Reject(InvalidReason::Banned)
        );
    }

    #[test]
    fn expiry_outranks_mismatch() {
        let now = Utc::now();
        let past = Some(now - Duration::days(1));
        assert_eq!(
            decide(&record(Some("OTHER"), false, past), "ABC", now),
            Decision::Reject(InvalidReason::Expired)
        );
    }

    #[test]
    fn binding_state_decides_the_rest() {
        let now = Utc::now();
        assert_eq!(
            decide(&record(Some("OTHER"), false, None), "ABC", now),
            Decision::Reject(InvalidReason::HwidMismatch)
        );
        assert_eq!(decide(&record(Some("ABC"), false, None), "ABC", now), Decision::Accept);
        assert_eq!(decide(&record(None, false, None), "ABC", now), Decision::Bind);
    }

    #[test]
    fn missing_or_empty_fields_are_invalid_requests() {
        for req in [
            ValidateRequest::default(),
            request("", "ABC"),
            request("KEY-1", ""),
        ] {
            assert!(matches!(required_fields(req), Err(AppError::InvalidRequest(_))));
        }
    }

    #[tokio::test]
    async fn expired_unbound_key_is_never_bound() {
        let svc = KeyService::new(FileKeyStore::in_memory(), "KEY");
        let key = svc
            .create_key(CreateKeyRequest {
                name: Some("old".to_string()),
                expires_at: Some(ExpiryInput::Timestamp(Utc::now() - Duration::hours(1))),
                ..CreateKeyRequest::default()
            })
            .await
            .unwrap();

        let outcome = svc.validate(request(&key.value, "ABC")).await.unwrap();

        assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::Expired));
        assert!(svc.get_key(key.id).await.unwrap().hwid.is_none());
    }

    #[tokio::test]
    async fn first_use_binds_then_rejects_other_hardware() {
        let svc = KeyService::new(FileKeyStore::in_memory(), "KEY");
        let key = svc
            .create_key(CreateKeyRequest {
                name: Some("trial".to_string()),
                ..CreateKeyRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(
            svc.validate(request(&key.value, "ABC")).await.unwrap(),
            ValidationOutcome::Valid { bound: true }
        );
        assert_eq!(
            svc.validate(request(&key.value, "ABC")).await.unwrap(),
            ValidationOutcome::Valid { bound: false }
        );
        assert_eq!(
            svc.validate(request(&key.value, "XYZ")).await.unwrap(),
            ValidationOutcome::Invalid(InvalidReason::HwidMismatch)
        );
        assert_eq!(svc.get_key(key.id).await.unwrap().hwid.as_deref(), Some("ABC"));
    }
}
