//! JSON-document key store for single-node deployments without a database.
//!
//! All records live in memory behind an async `RwLock` and are written
//! through to one document on disk:
//!
//! ```json
//! { "keys": [ { "id": "...", "value": "...", ... } ] }
//! ```
//!
//! Mutations hold the write lock across the disk write, so they are
//! serialized and each one is durable before it returns. A document is
//! replaced by writing a sibling temp file, syncing it, and renaming it over
//! the original, then syncing the directory so the rename itself is durable.
//! If persisting fails the in-memory change is rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, io::AsyncWriteExt, sync::RwLock};
use uuid::Uuid;

use super::{KeyPatch, KeyStore, StoreError};
use crate::models::license_key::LicenseKey;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    keys: Vec<LicenseKey>,
}

#[derive(Debug, Default)]
struct Inner {
    keys: HashMap<Uuid, LicenseKey>,
    /// value -> id, backs the uniqueness constraint and `find_by_value`
    by_value: HashMap<String, Uuid>,
}

impl Inner {
    fn from_keys(keys: Vec<LicenseKey>) -> Result<Self, StoreError> {
        let mut inner = Inner::default();
        for key in keys {
            if inner.by_value.insert(key.value.clone(), key.id).is_some() {
                return Err(StoreError::Conflict);
            }
            inner.keys.insert(key.id, key);
        }
        Ok(inner)
    }

    fn to_document(&self) -> Document {
        let mut keys: Vec<LicenseKey> = self.keys.values().cloned().collect();
        keys.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Document { keys }
    }
}

/// Key store backed by a JSON document, or purely by memory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    inner: Arc<RwLock<Inner>>,
    location: Option<Arc<Location>>,
}

/// Where the document lives on disk.
#[derive(Debug)]
struct Location {
    path: PathBuf,
    tmp_path: PathBuf,
    dir: PathBuf,
}

impl Location {
    fn new(path: PathBuf) -> Result<Self, StoreError> {
        let Some(file_name) = path.file_name() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("key store path {} does not name a file", path.display()),
            )
            .into());
        };

        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        Ok(Self {
            path,
            tmp_path,
            dir,
        })
    }
}

impl FileKeyStore {
    /// Open (or create) the document at `path`.
    ///
    /// A missing file starts an empty store; a document with duplicate key
    /// values is rejected, as is a path with no file name (`..`, `/`).
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let location = Location::new(path.into())?;

        let inner = match fs::read(&location.path).await {
            Ok(bytes) => {
                let document: Document = serde_json::from_slice(&bytes)?;
                Inner::from_keys(document.keys)?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Inner::default(),
            Err(err) => return Err(err.into()),
        };

        tracing::info!(path = %location.path.display(), keys = inner.keys.len(), "Opened key store document");

        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
            location: Some(Arc::new(location)),
        })
    }

    /// Non-durable store, for tests and throwaway instances.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            location: None,
        }
    }

    async fn persist(&self, inner: &Inner) -> Result<(), StoreError> {
        let Some(location) = &self.location else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(&inner.to_document())?;
        write_atomically(location, &bytes).await?;
        Ok(())
    }
}

async fn write_atomically(location: &Location, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(&location.tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&location.tmp_path, &location.path).await?;
    sync_dir(&location.dir).await
}

/// Flush the directory entry so a completed rename survives a crash.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl KeyStore for FileKeyStore {
    async fn get(&self, id: Uuid) -> Result<LicenseKey, StoreError> {
        let inner = self.inner.read().await;
        inner.keys.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_by_value(&self, value: &str) -> Result<LicenseKey, StoreError> {
        let inner = self.inner.read().await;
        inner
            .by_value
            .get(value)
            .and_then(|id| inner.keys.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_all(&self) -> Result<Vec<LicenseKey>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.keys.values().cloned().collect())
    }

    async fn insert(&self, key: &LicenseKey) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.by_value.contains_key(&key.value) || inner.keys.contains_key(&key.id) {
            return Err(StoreError::Conflict);
        }

        inner.by_value.insert(key.value.clone(), key.id);
        inner.keys.insert(key.id, key.clone());

        if let Err(err) = self.persist(&inner).await {
            inner.by_value.remove(&key.value);
            inner.keys.remove(&key.id);
            return Err(err);
        }

        Ok(())
    }

    async fn update(&self, id: Uuid, patch: &KeyPatch) -> Result<LicenseKey, StoreError> {
        let mut inner = self.inner.write().await;
        let previous = inner.keys.get(&id).cloned().ok_or(StoreError::NotFound)?;

        let mut updated = previous.clone();
        patch.apply(&mut updated);
        inner.keys.insert(id, updated.clone());

        if let Err(err) = self.persist(&inner).await {
            inner.keys.insert(id, previous);
            return Err(err);
        }

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let removed = inner.keys.remove(&id).ok_or(StoreError::NotFound)?;
        inner.by_value.remove(&removed.value);

        if let Err(err) = self.persist(&inner).await {
            inner.by_value.insert(removed.value.clone(), id);
            inner.keys.insert(id, removed);
            return Err(err);
        }

        Ok(())
    }

    async fn bind_hwid(
        &self,
        id: Uuid,
        hwid: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LicenseKey>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(key) = inner.keys.get_mut(&id) else {
            return Ok(None);
        };
        if !key.is_bindable(now) {
            return Ok(None);
        }

        key.hwid = Some(hwid.to_string());
        let bound = key.clone();

        if let Err(err) = self.persist(&inner).await {
            if let Some(key) = inner.keys.get_mut(&id) {
                key.hwid = None;
            }
            return Err(err);
        }

        Ok(Some(bound))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if let Some(location) = &self.location {
            fs::metadata(&location.dir).await?;
        }
        Ok(())
    }
}
