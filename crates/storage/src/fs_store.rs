//! Filesystem document store.
//!
//! Reads and writes documents with `tokio::fs`. Parent directories are created
//! on write so callers only deal with document paths.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{DocumentStore, FileStat, Result, StorageError};

/// Document store backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: Option<PathBuf>,
}

impl FsDocumentStore {
    /// Store that uses paths exactly as given.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Store that resolves relative paths against `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: Some(root.as_ref().to_path_buf()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Default for FsDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read_file(&self, path: &Path) -> Result<String> {
        let path = self.resolve(path);
        fs::read_to_string(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let path = self.resolve(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        fs::write(&path, content.as_bytes())
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let path = self.resolve(path);
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(path));
        }
        let mtime = meta
            .modified()
            .map(chrono::DateTime::<chrono::Utc>::from)
            .unwrap_or_else(|_| chrono::Utc::now());
        Ok(FileStat {
            mtime,
            size: meta.len(),
        })
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = self.resolve(path);
        fs::remove_file(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        let path = self.resolve(path);
        fs::create_dir_all(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        fs::rename(&from, &to)
            .await
            .map_err(|e| StorageError::io(&from, e))
    }
}
