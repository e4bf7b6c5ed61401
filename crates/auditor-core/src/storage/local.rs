//! Local filesystem blob store

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use super::BlobStore;
use crate::error::{Error, Result};

/// Stores blobs as files under a root directory
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new local store
    ///
    /// Creates the root directory if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| {
                Error::Storage(format!(
                    "Failed to create uploads directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
            info!("Created uploads directory: {}", root.display());
        }

        Ok(Self { root })
    }

    /// Get the root directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path, rejecting keys that leave the root
    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(Error::Storage(format!("Invalid blob key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    fn name(&self) -> &str {
        "local"
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!(key, size = bytes.len(), "Stored blob");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(key)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("Blob not found: {}", key)));
        }
        Ok(fs::read(&path)?)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key)?;
        if path.exists() {
            fs::remove_file(&path)?;
            debug!(key, "Deleted blob");
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.blob_path(key).map(|p| p.exists()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path().join("uploads")).unwrap();

        store.put("user-1/abc-sales.csv", b"Revenue\n10\n").unwrap();
        assert!(store.exists("user-1/abc-sales.csv"));
        assert_eq!(store.get("user-1/abc-sales.csv").unwrap(), b"Revenue\n10\n");

        store.delete("user-1/abc-sales.csv").unwrap();
        assert!(!store.exists("user-1/abc-sales.csv"));
        // Deleting twice is fine
        store.delete("user-1/abc-sales.csv").unwrap();
    }

    #[test]
    fn test_get_missing() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).unwrap();
        assert!(matches!(store.get("nope/x.csv"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).unwrap();

        assert!(store.put("../outside.csv", b"x").is_err());
        assert!(store.put("/abs/path.csv", b"x").is_err());
        assert!(store.put("", b"x").is_err());
    }
}
