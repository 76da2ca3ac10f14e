//! PostgreSQL-backed key store.
//!
//! Every operation is a single statement, so per-record atomicity comes from
//! PostgreSQL row locking:
//! - `update` is one `UPDATE ... RETURNING` with COALESCE/CASE per field
//! - `bind_hwid` is one conditional `UPDATE ... WHERE hwid IS NULL AND ...`
//! - `value` uniqueness is enforced by the `license_keys_value_unique` constraint

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{KeyPatch, KeyStore, StoreError};
use crate::{db::DbPool, models::license_key::LicenseKey};

const COLUMNS: &str = "id, name, value, hwid, is_banned, expires_at, created_at";

#[derive(Debug, Clone)]
pub struct PgKeyStore {
    pool: DbPool,
}

impl PgKeyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map a unique-constraint violation to `Conflict`, everything else to `Database`.
fn map_insert_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
        _ => StoreError::Database(err),
    }
}

impl KeyStore for PgKeyStore {
    async fn get(&self, id: Uuid) -> Result<LicenseKey, StoreError> {
        sqlx::query_as::<_, LicenseKey>(&format!(
            "SELECT {COLUMNS} FROM license_keys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn find_by_value(&self, value: &str) -> Result<LicenseKey, StoreError> {
        sqlx::query_as::<_, LicenseKey>(&format!(
            "SELECT {COLUMNS} FROM license_keys WHERE value = $1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn list_all(&self) -> Result<Vec<LicenseKey>, StoreError> {
        let keys = sqlx::query_as::<_, LicenseKey>(&format!("SELECT {COLUMNS} FROM license_keys"))
            .fetch_all(&self.pool)
            .await?;

        Ok(keys)
    }

    async fn insert(&self, key: &LicenseKey) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO license_keys (id, name, value, hwid, is_banned, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(key.id)
        .bind(&key.name)
        .bind(&key.value)
        .bind(&key.hwid)
        .bind(key.is_banned)
        .bind(key.expires_at)
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn update(&self, id: Uuid, patch: &KeyPatch) -> Result<LicenseKey, StoreError> {
        // $5 says whether expires_at is being set at all, $6 carries the
        // new value (which may itself be NULL).
        sqlx::query_as::<_, LicenseKey>(&format!(
            r#"
            UPDATE license_keys
            SET name = COALESCE($2, name),
                is_banned = COALESCE($3, is_banned),
                hwid = CASE WHEN $4 THEN NULL ELSE hwid END,
                expires_at = CASE WHEN $5 THEN $6 ELSE expires_at END
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.is_banned)
        .bind(patch.reset_hwid)
        .bind(patch.expires_at.is_some())
        .bind(patch.expires_at.flatten())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM license_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn bind_hwid(
        &self,
        id: Uuid,
        hwid: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LicenseKey>, StoreError> {
        // Same predicate as LicenseKey::is_bindable, evaluated under the row lock
        let bound = sqlx::query_as::<_, LicenseKey>(&format!(
            r#"
            UPDATE license_keys
            SET hwid = $2
            WHERE id = $1
              AND hwid IS NULL
              AND is_banned = FALSE
              AND (expires_at IS NULL OR expires_at >= $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(hwid)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bound)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
