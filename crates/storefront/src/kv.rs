//! Device-local key-value persistence.
//!
//! Values are JSON strings. The file store keeps one file per key and replaces
//! it atomically (write to a temporary file, then rename), so a crash leaves
//! either the old or the new value.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shopfront_core::StoreId;
use tokio::sync::RwLock;

use crate::error::EngineError;

/// Key holding the last device token the backend accepted.
pub const FCM_TOKEN_REGISTERED: &str = "fcm_token_registered";

/// Key holding a device token waiting for the shopper to sign in.
pub const PENDING_FCM_TOKEN: &str = "pending_fcm_token";

/// Key of the anonymous cart for a store.
#[must_use]
pub fn cart_key(store_id: StoreId) -> String {
    format!("cart_{store_id}")
}

/// Durable string storage on the shopper's device.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError>;
    async fn put(&self, key: &str, value: String) -> Result<(), EngineError>;
    /// Delete a key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), EngineError>;
}

/// Read and decode a JSON value.
///
/// # Errors
///
/// Returns `EngineError::Corrupt` if the stored value does not decode.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, EngineError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| EngineError::Corrupt {
            key: key.to_string(),
            source,
        })
}

/// Encode and store a JSON value.
///
/// # Errors
///
/// Returns an error if the underlying store fails.
pub async fn write_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), EngineError> {
    let raw = serde_json::to_string(value).map_err(|source| EngineError::Corrupt {
        key: key.to_string(),
        source,
    })?;
    store.put(key, raw).await
}

// =============================================================================
// FileKeyValueStore
// =============================================================================

/// One JSON file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    /// Store files under `root`, which is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, EngineError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(EngineError::Storage(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key '{key}'"),
            )));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<(), EngineError> {
        let path = self.path_for(key)?;
        let temp = path.with_extension("json.tmp");
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&temp, value).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), EngineError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// MemoryKeyValueStore
// =============================================================================

/// Volatile store for tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), EngineError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), EngineError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
