//! Blob store trait and implementations.
//!
//! A blob is written whole or not at all: [`FileStore`] writes to a
//! temporary sibling and renames it into place so a power loss mid-write
//! leaves the previous blob intact.

#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Key-value blob storage abstraction.
///
/// Implementations must be cheaply cloneable: each manager in the network
/// client (queue, trust, token, diagnostics) holds its own handle to the
/// same underlying store.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future` (Edition 2024 RPITIT). Use generic type parameters:
///
/// ```no_run
/// use gatenode_storage::{BlobStore, StorageResult};
///
/// async fn save_snapshot<S: BlobStore>(store: &S, data: &[u8]) -> StorageResult<()> {
///     store.write("snapshot", data).await
/// }
/// ```
pub trait BlobStore: Clone + Send + Sync {
    /// Read a blob, returning `None` when the key has never been written
    /// or has been removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the read fails.
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write a blob, replacing any previous value atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the write fails.
    async fn write(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Remove a blob. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Whether a blob exists for the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    async fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.read(key).await?.is_some())
    }
}

/// Reject keys that could escape the store directory or collide with the
/// temporary-file suffix.
fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.contains(['/', '\\'])
        || key.starts_with('.')
        || key.ends_with(".tmp")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Directory-backed blob store for gateway hosts.
///
/// One file per key under a fixed root directory. Writes go through a
/// `<key>.tmp` sibling followed by a rename, matching the "write the whole
/// structure, then close" discipline the single-writer model expects.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "blob store opened");
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobStore for FileStore {
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        let tmp = self.root.join(format!("{key}.tmp"));
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key, bytes = data.len(), "blob written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(key, error = %e, "blob removal failed");
                Err(e.into())
            }
        }
    }
}

/// In-memory blob store for tests and emulation.
///
/// Supports fail injection so tests can exercise the client's
/// `StorageError` paths without touching a filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with
    /// [`StorageError::Unavailable`] until called again with `false`.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("fail injection".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // Single-writer by construction; a poisoned lock means a test
        // already panicked, so propagating the panic is fine.
        self.blobs.lock().expect("memory store lock poisoned")
    }
}

impl BlobStore for MemoryStore {
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check_available()?;
        validate_key(key)?;
        Ok(self.lock().get(key).cloned())
    }

    async fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        self.check_available()?;
        validate_key(key)?;
        self.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_available()?;
        validate_key(key)?;
        self.lock().remove(key);
        Ok(())
    }
}
