//! Credential stores keyed by node id.
//!
//! The host normally owns credential storage; these stores cover hosts that do
//! not, and every store doubles as a [`CredentialSink`].

use crate::credentials::CredentialSet;
use crate::persist::CredentialSink;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Errors from credential stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File system error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored document is not valid JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage for credential sets.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the credential set stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<CredentialSet>, StoreError>;

    /// Store a credential set under `key`, replacing any previous one.
    async fn save(&self, key: &str, credentials: &CredentialSet) -> Result<(), StoreError>;

    /// Remove the credential set stored under `key`.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, CredentialSet>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sets.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, key: &str) -> Result<Option<CredentialSet>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn save(&self, key: &str, credentials: &CredentialSet) -> Result<(), StoreError> {
        self.entries
            .write()
            .insert(key.to_string(), credentials.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Credential store backed by one JSON file.
///
/// The file holds an object mapping keys to credential sets. Writes go to a
/// sibling temp file that is then renamed over the original.
#[derive(Debug)]
pub struct JsonFileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCredentialStore {
    /// Create a store at the given path. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, CredentialSet>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &HashMap<String, CredentialSet>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), entries = entries.len(), "Wrote credential store");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for JsonFileCredentialStore {
    async fn load(&self, key: &str) -> Result<Option<CredentialSet>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn save(&self, key: &str, credentials: &CredentialSet) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), credentials.clone());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialSink for MemoryCredentialStore {
    async fn persist(&self, key: &str, credentials: &CredentialSet) -> anyhow::Result<()> {
        Ok(self.save(key, credentials).await?)
    }
}

#[async_trait]
impl CredentialSink for JsonFileCredentialStore {
    async fn persist(&self, key: &str, credentials: &CredentialSet) -> anyhow::Result<()> {
        Ok(self.save(key, credentials).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert!(store.is_empty());

        let creds = CredentialSet::new("tok").with_refresh_token("r");
        store.save("node-1", &creds).await.unwrap();

        assert_eq!(store.load("node-1").await.unwrap(), Some(creds));
        assert_eq!(store.load("node-2").await.unwrap(), None);
        assert_eq!(store.len(), 1);

        store.remove("node-1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let creds = CredentialSet::new("tok")
            .with_refresh_token("r")
            .with_client("cid", "secret");

        let store = JsonFileCredentialStore::new(&path);
        assert_eq!(store.load("box").await.unwrap(), None);
        store.save("box", &creds).await.unwrap();
        store.save("fitbit", &CredentialSet::new("other")).await.unwrap();

        let reopened = JsonFileCredentialStore::new(&path);
        assert_eq!(reopened.load("box").await.unwrap(), Some(creds));

        reopened.remove("box").await.unwrap();
        assert_eq!(store.load("box").await.unwrap(), None);
        assert!(store.load("fitbit").await.unwrap().is_some());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileCredentialStore::new(&path);
        assert!(matches!(
            store.load("box").await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_store_as_sink() {
        let store = MemoryCredentialStore::new();
        store
            .persist("node-1", &CredentialSet::new("NEW"))
            .await
            .unwrap();
        assert_eq!(
            store.load("node-1").await.unwrap().map(|c| c.access_token),
            Some("NEW".to_string())
        );
    }
}
