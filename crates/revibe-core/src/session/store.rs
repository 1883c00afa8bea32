//! Durable key-value backends for the session cache.
//!
//! Provides three backends:
//! - [`KeyringStore`]: the platform credential store (Secret Service,
//!   Keychain, Credential Manager)
//! - [`FileStore`]: one file per key in a directory
//! - [`MemoryStore`]: process memory only

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

/// Error type for cache backend operations.
///
/// These never escape the session cache; they are logged and absorbed.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Failed to read or write a cache file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking backend task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for cache backend operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// String key-value storage that survives restarts.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value; `None` if the key is absent.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Writes a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Removes a key. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> CacheResult<()>;
}

/// Backend using the system keyring.
///
/// Keyring calls block, so they run on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Creates a store whose entries are filed under `service`.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> CacheResult<Entry> {
        Ok(Entry::new(&self.service, key)?)
    }
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entry = self.entry(key)?;
        let key = key.to_string();
        tokio::task::spawn_blocking(move || match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                debug!("No keyring entry for {key}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        })
        .await?
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let entry = self.entry(key)?;
        let value = value.to_string();
        tokio::task::spawn_blocking(move || entry.set_password(&value)).await??;
        debug!("Stored keyring entry {key}");
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let entry = self.entry(key)?;
        match tokio::task::spawn_blocking(move || entry.delete_credential()).await? {
            Ok(()) => debug!("Deleted keyring entry {key}"),
            Err(keyring::Error::NoEntry) => debug!("No keyring entry {key} to delete"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Backend storing each key as a file in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write then rename so readers never see a partial value.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Stored cache file {}", path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Backend keeping values in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
