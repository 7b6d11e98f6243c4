//! Local key/value persistence
//!
//! Handles the best-effort cache of the last known transaction count. Values
//! are plain strings keyed by name, like browser local storage.

use crate::error::{SessionError, SessionResult};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Key under which the last known transaction count is stored
pub const TRANSACTION_COUNT_KEY: &str = "@transactionCount";

#[cfg_attr(test, automock)]
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> SessionResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> SessionResult<()>;
}

/// Store kept as a JSON object in a single file
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> SessionResult<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                SessionError::Storage(format!("Corrupt store {:?}: {}", self.path, e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(SessionError::Storage(format!(
                "Failed to read {:?}: {}",
                self.path, e
            ))),
        }
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        let _guard = self.lock.lock().await;

        let mut entries = match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("Discarding corrupt store {:?}: {}", self.path, e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read {:?}: {}",
                    self.path, e
                )))
            }
        };
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Storage(format!("Failed to create {:?}: {}", parent, e)))?;
        }

        let bytes = serde_json::to_vec_pretty(&entries)
            .map_err(|e| SessionError::Storage(e.to_string()))?;

        // Replace the file in one step so readers never see a partial write
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to write {:?}: {}", staging, e)))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to replace {:?}: {}", self.path, e)))?;

        debug!("Stored {} in {:?}", key, self.path);
        Ok(())
    }
}

/// Store that lives for the process only
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileStore::new(&path);
        assert_eq!(store.get(TRANSACTION_COUNT_KEY).await.unwrap(), None);
        store.set(TRANSACTION_COUNT_KEY, "3").await.unwrap();
        store.set("other", "x").await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get(TRANSACTION_COUNT_KEY).await.unwrap().as_deref(),
            Some("3")
        );
        assert_eq!(reopened.get("other").await.unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_file_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));

        store.set(TRANSACTION_COUNT_KEY, "1").await.unwrap();
        store.set(TRANSACTION_COUNT_KEY, "2").await.unwrap();
        assert_eq!(
            store.get(TRANSACTION_COUNT_KEY).await.unwrap().as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_file_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get(TRANSACTION_COUNT_KEY).await,
            Err(SessionError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_set_recovers_from_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{\"@transactionCount\": ").unwrap();

        let store = FileStore::new(&path);
        store.set(TRANSACTION_COUNT_KEY, "4").await.unwrap();

        assert_eq!(
            store.get(TRANSACTION_COUNT_KEY).await.unwrap().as_deref(),
            Some("4")
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
