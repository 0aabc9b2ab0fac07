//! Document store trait abstraction.

use async_trait::async_trait;
use modspec_core::{ModuleError, Time};
use std::path::{Path, PathBuf};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Document does not exist
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// I/O error
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    /// Wrap an I/O error, mapping `NotFound` to [`StorageError::NotFound`].
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_path_buf())
        } else {
            StorageError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Whether the document was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<StorageError> for ModuleError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(path) => ModuleError::NotFound {
                path: path.display().to_string(),
            },
            StorageError::Io { path, source } => ModuleError::FileSystem {
                path: path.display().to_string(),
                message: source.to_string(),
            },
            StorageError::Other(message) => ModuleError::FileSystem {
                path: String::new(),
                message,
            },
        }
    }
}

/// File facts returned by [`DocumentStore::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Last modification time
    pub mtime: Time,

    /// Size in bytes
    pub size: u64,
}

/// Storage abstraction for design documents.
///
/// Paths are absolute or relative to the store's own root; the store does
/// not interpret them beyond reading and writing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document as UTF-8 text.
    async fn read_file(&self, path: &Path) -> Result<String>;

    /// Create or replace a document.
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Stat a document.
    async fn stat(&self, path: &Path) -> Result<FileStat>;

    /// Delete a document.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Create a directory and its parents.
    async fn create_directory(&self, path: &Path) -> Result<()>;

    /// Whether a document exists.
    async fn exists(&self, path: &Path) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Move a document. The default copies then deletes the source.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let content = self.read_file(from).await?;
        self.write_file(to, &content).await?;
        self.delete(from).await
    }
}
