//! Key lifecycle service: administrative mutations.
//!
//! This service handles:
//! - Key creation (name validation, value generation, expiry computation)
//! - Rename, ban/unban, binding reset and expiry changes
//! - Single and bulk deletion
//!
//! Validation lives in `validation_service`, on the same `KeyService`.
//!
//! # Consistency
//!
//! The store is the only source of truth; nothing here caches records
//! between calls. Every mutation is a single store call, atomic for the
//! record it touches. Bulk operations are a sequence of independent
//! per-record deletes, not a transaction.

use chrono::{SubsecRound, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::license_key::{
        BulkDeleteReport, CreateKeyRequest, ExpiryInput, KeyListQuery, LicenseKey,
        UpdateKeyRequest,
    },
    services::{expiry::compute_expiry, keygen::generate_key_value},
    store::{KeyPatch, KeyStore, StoreError},
};

/// Attempts at finding a free generated value before giving up.
const MAX_GENERATE_ATTEMPTS: usize = 3;

/// The key lifecycle engine, over an injected store.
#[derive(Debug, Clone)]
pub struct KeyService<S> {
    pub(crate) store: S,
    key_prefix: String,
}

impl<S: KeyStore> KeyService<S> {
    pub fn new(store: S, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a new key.
    ///
    /// # Process
    ///
    /// 1. Validate name is non-empty
    /// 2. Resolve expiry from `expiresAt` or `duration` + `unit`
    /// 3. Use the supplied value, or generate one
    /// 4. Insert with no binding and no ban
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: Missing name, empty value, or conflicting expiry inputs
    /// - `DuplicateKeyValue`: Supplied value already exists
    pub async fn create_key(&self, request: CreateKeyRequest) -> Result<LicenseKey, AppError> {
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::InvalidRequest("name is required".to_string()))?
            .to_string();

        // Storage keeps microseconds.
        let now = Utc::now().trunc_subsecs(6);
        let expires_at = match (request.expires_at, request.unit) {
            (Some(_), Some(_)) => {
                return Err(AppError::InvalidRequest(
                    "expiresAt and unit are mutually exclusive".to_string(),
                ));
            }
            (Some(explicit), None) => Some(explicit.into_datetime()),
            (None, Some(unit)) => compute_expiry(now, request.duration, unit)?,
            (None, None) => None,
        };

        let supplied = match request.value {
            Some(value) if value.trim().is_empty() => {
                return Err(AppError::InvalidRequest("value must not be empty".to_string()));
            }
            Some(value) => Some(value.trim().to_string()),
            None => None,
        };

        let mut key = LicenseKey {
            id: Uuid::new_v4(),
            name,
            value: String::new(),
            hwid: None,
            is_banned: false,
            expires_at,
            created_at: now,
        };

        if let Some(value) = supplied {
            key.value = value;
            self.store.insert(&key).await?;
        } else {
            self.insert_generated(&mut key).await?;
        }

        tracing::info!(key_id = %key.id, key_name = %key.name, expires_at = ?key.expires_at, "Key created");

        Ok(key)
    }

    async fn insert_generated(&self, key: &mut LicenseKey) -> Result<(), AppError> {
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            key.value = generate_key_value(&self.key_prefix);
            match self.store.insert(key).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict) => {
                    tracing::debug!(value = %key.value, "Generated key value collided, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AppError::DuplicateKeyValue)
    }

    pub async fn get_key(&self, id: Uuid) -> Result<LicenseKey, AppError> {
        Ok(self.store.get(id).await?)
    }

    /// List keys, newest first, optionally filtered by search term and status.
    pub async fn list_keys(&self, query: &KeyListQuery) -> Result<Vec<LicenseKey>, AppError> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty());

        let mut keys: Vec<LicenseKey> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|key| search.is_none_or(|term| key.matches_search(term)))
            .filter(|key| query.status.is_none_or(|status| key.status() == status))
            .collect();

        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(keys)
    }

    /// Apply a partial update from `PUT /keys/{id}`.
    ///
    /// The binding can only be reset (`"hwid": null`), never set: binding
    /// happens through validation alone.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: Empty name or a non-null hwid
    /// - `KeyNotFound`: No key with this id
    pub async fn update_key(
        &self,
        id: Uuid,
        request: UpdateKeyRequest,
    ) -> Result<LicenseKey, AppError> {
        let name = match request.name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::InvalidRequest("name must not be empty".to_string()));
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };

        let reset_hwid = match request.hwid {
            None => false,
            Some(None) => true,
            Some(Some(_)) => {
                return Err(AppError::InvalidRequest(
                    "hwid can only be reset to null".to_string(),
                ));
            }
        };

        let patch = KeyPatch {
            name,
            is_banned: request.is_banned,
            reset_hwid,
            expires_at: request
                .expires_at
                .map(|expiry| expiry.map(ExpiryInput::into_datetime)),
        };

        self.apply_patch(id, patch).await
    }

    pub async fn rename(&self, id: Uuid, name: &str) -> Result<LicenseKey, AppError> {
        self.update_key(
            id,
            UpdateKeyRequest {
                name: Some(name.to_string()),
                ..UpdateKeyRequest::default()
            },
        )
        .await
    }

    /// Ban or unban. Leaves the binding and expiry untouched.
    pub async fn set_banned(&self, id: Uuid, is_banned: bool) -> Result<LicenseKey, AppError> {
        self.apply_patch(
            id,
            KeyPatch {
                is_banned: Some(is_banned),
                ..KeyPatch::default()
            },
        )
        .await
    }

    /// Clear the binding so the next validation binds afresh.
    pub async fn reset_binding(&self, id: Uuid) -> Result<LicenseKey, AppError> {
        self.apply_patch(
            id,
            KeyPatch {
                reset_hwid: true,
                ..KeyPatch::default()
            },
        )
        .await
    }

    async fn apply_patch(&self, id: Uuid, patch: KeyPatch) -> Result<LicenseKey, AppError> {
        if patch.is_empty() {
            return self.get_key(id).await;
        }

        let key = self.store.update(id, &patch).await?;

        tracing::info!(
            key_id = %id,
            renamed = patch.name.is_some(),
            is_banned = ?patch.is_banned,
            reset_hwid = patch.reset_hwid,
            expiry_changed = patch.expires_at.is_some(),
            "Key updated"
        );

        Ok(key)
    }

    pub async fn delete_key(&self, id: Uuid) -> Result<(), AppError> {
        self.store.delete(id).await?;
        tracing::info!(key_id = %id, "Key deleted");
        Ok(())
    }

    /// Delete each id independently.
    ///
    /// Missing ids are reported, not fatal. Any other store failure stops the
    /// batch; deletions already made stay made.
    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<BulkDeleteReport, AppError> {
        let mut report = BulkDeleteReport::default();

        for &id in ids {
            match self.store.delete(id).await {
                Ok(()) => report.deleted.push(id),
                Err(StoreError::NotFound) => report.not_found.push(id),
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(
            deleted = report.deleted.len(),
            not_found = report.not_found.len(),
            "Bulk delete finished"
        );

        Ok(report)
    }

    /// Delete every key bound at the moment of listing.
    ///
    /// Keys bound after the listing are kept.
    pub async fn delete_used(&self) -> Result<BulkDeleteReport, AppError> {
        let used: Vec<Uuid> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|key| key.hwid.is_some())
            .map(|key| key.id)
            .collect();

        self.delete_many(&used).await
    }
}
