//! Flat-directory blob storage for dataset files and profile pictures.
//!
//! Storage has no transactional coupling to the database: callers write the
//! file first and remove it again if the database work that follows fails.

pub mod naming;

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub use naming::{dataset_filename, file_type_for, format_bytes, profile_picture_filename};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One directory of stored files, addressed by bare file name
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write `bytes` under `filename`, replacing any existing file
    async fn put(&self, filename: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn read(&self, filename: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove `filename`; removing a file that is already gone succeeds
    async fn remove(&self, filename: &str) -> Result<(), StorageError>;
}

/// `FileStore` backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Create the store, making the directory if it is missing
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| StorageError::Io { path: root.clone(), source })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let valid = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\', '\0']);
        if !valid {
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        Ok(self.root.join(filename))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, filename: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(filename)?;
        if let Err(source) = tokio::fs::write(&path, bytes).await {
            // a failed write may leave a truncated file behind
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Could not remove partial file {}: {}", path.display(), e);
                }
            }
            return Err(StorageError::Io { path, source });
        }
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    async fn read(&self, filename: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(filename)?;
        tokio::fs::read(&path).await.map_err(|source| match source.kind() {
            ErrorKind::NotFound => StorageError::NotFound(filename.to_string()),
            _ => StorageError::Io { path, source },
        })
    }

    async fn remove(&self, filename: &str) -> Result<(), StorageError> {
        let path = self.path_for(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_read_remove_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::open(dir.path().join("uploads")).await.unwrap();

        store.put("a.csv", b"x,y\n1,2\n").await.unwrap();
        assert!(store.root().join("a.csv").exists());
        assert_eq!(store.read("a.csv").await.unwrap(), b"x,y\n1,2\n");

        store.remove("a.csv").await.unwrap();
        assert!(!store.root().join("a.csv").exists());
        // already gone is not an error
        store.remove("a.csv").await.unwrap();
    }

    #[tokio::test]
    async fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::open(dir.path().join("uploads")).await.unwrap();
        std::fs::remove_dir(store.root()).unwrap();

        let err = store.put("a.csv", b"1,2\n").await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(!store.root().join("a.csv").exists());
    }

    #[tokio::test]
    async fn missing_file_reads_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::open(dir.path()).await.unwrap();
        assert!(matches!(store.read("nope.bin").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::open(dir.path()).await.unwrap();
        for name in ["../escape.txt", "nested/file.txt", "..", ""] {
            assert!(
                matches!(store.put(name, b"x").await, Err(StorageError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }
}
