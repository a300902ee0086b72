//! Key-value persistence behind [`ResponseCache`](super::ResponseCache).
//!
//! The cache needs four operations over string keys: read, write, delete
//! and list. Anything offering them can back the cache; two backends ship
//! with the crate:
//!
//! - [`FileStore`]: one JSON file per key in a directory. Writes go to a
//!   temporary file first and are renamed into place, so a crash mid-write
//!   never leaves a half-written record behind.
//! - [`MemoryStore`]: a process-local map, for tests and ephemeral caches.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::{MuninnError, Result};

/// Storage surface for cache records.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Read a record. `Ok(None)` when the key does not exist.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace a record.
    async fn write(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a record. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All keys currently stored.
    async fn list(&self) -> Result<Vec<String>>;
}

// ============================================================================
// FileStore
// ============================================================================

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Directory-backed store.
///
/// Layout: `{root}/{key}.json`. Keys must be valid file names; the cache
/// only uses hex digests and a fixed index key.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Use `root` as the cache directory. It is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(MuninnError::InvalidInput(format!(
                "invalid store key '{key}'"
            )));
        }
        Ok(self.root.join(format!("{key}.{RECORD_EXTENSION}")))
    }
}

#[async_trait]
impl CacheStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.record_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MuninnError::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.record_path(key)?;
        fs::create_dir_all(&self.root).await.map_err(|e| {
            MuninnError::Storage(format!(
                "failed to create dir {}: {e}",
                self.root.display()
            ))
        })?;

        let tmp = path.with_extension(TEMP_EXTENSION);
        fs::write(&tmp, value).await.map_err(|e| {
            MuninnError::Storage(format!("failed to write {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            MuninnError::Storage(format!("failed to rename into {}: {e}", path.display()))
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MuninnError::Storage(format!(
                "failed to delete {}: {e}",
                path.display()
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(MuninnError::Storage(format!(
                    "failed to read dir {}: {e}",
                    self.root.display()
                )));
            }
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MuninnError::Storage(format!("failed to read entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_owned());
            }
        }
        Ok(keys)
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store. Contents are lost when it is dropped.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.records.read().await.keys().cloned().collect())
    }
}
