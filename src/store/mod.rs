//! Durable key storage.
//!
//! The service talks to storage only through [`KeyStore`]. Two backends exist:
//! - [`postgres::PgKeyStore`]: PostgreSQL via sqlx, for production
//! - [`file::FileKeyStore`]: a JSON document on local disk (or purely in memory)
//!
//! Every mutating call is durable before it returns `Ok`. Each call is atomic
//! for the single record it touches; nothing spans records.

use chrono::{DateTime, Utc};
use std::future::Future;
use uuid::Uuid;

use crate::models::license_key::LicenseKey;

pub mod file;
pub mod postgres;

pub use file::FileKeyStore;
pub use postgres::PgKeyStore;

/// Storage-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record with the given id (or value).
    #[error("Key not found")]
    NotFound,

    /// A record with the same `value` already exists.
    #[error("Key value already exists")]
    Conflict,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Field-level changes applied by [`KeyStore::update`].
///
/// `None` leaves a field untouched. The binding can only be cleared here;
/// setting it goes through [`KeyStore::bind_hwid`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPatch {
    pub name: Option<String>,
    pub is_banned: Option<bool>,
    pub reset_hwid: bool,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl KeyPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.is_banned.is_none()
            && !self.reset_hwid
            && self.expires_at.is_none()
    }

    /// Apply to an in-memory record.
    pub fn apply(&self, key: &mut LicenseKey) {
        if let Some(name) = &self.name {
            key.name = name.clone();
        }
        if let Some(is_banned) = self.is_banned {
            key.is_banned = is_banned;
        }
        if self.reset_hwid {
            key.hwid = None;
        }
        if let Some(expires_at) = self.expires_at {
            key.expires_at = expires_at;
        }
    }
}

/// Storage contract for license keys.
pub trait KeyStore: Clone + Send + Sync + 'static {
    fn get(&self, id: Uuid) -> impl Future<Output = Result<LicenseKey, StoreError>> + Send;

    fn find_by_value(
        &self,
        value: &str,
    ) -> impl Future<Output = Result<LicenseKey, StoreError>> + Send;

    /// All records, in no particular order.
    fn list_all(&self) -> impl Future<Output = Result<Vec<LicenseKey>, StoreError>> + Send;

    /// Fails with [`StoreError::Conflict`] if `key.value` is taken.
    fn insert(&self, key: &LicenseKey) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Apply `patch` atomically and return the updated record.
    fn update(
        &self,
        id: Uuid,
        patch: &KeyPatch,
    ) -> impl Future<Output = Result<LicenseKey, StoreError>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Compare-and-swap for first-use binding.
    ///
    /// Writes `hwid` only if the record exists and [`LicenseKey::is_bindable`]
    /// holds at `now`, checked atomically with the write. Returns the bound
    /// record, or `None` if the condition no longer held.
    fn bind_hwid(
        &self,
        id: Uuid,
        hwid: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<LicenseKey>, StoreError>> + Send;

    /// Connectivity check for the health endpoint.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
