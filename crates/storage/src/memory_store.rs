//! In-memory document store.

use async_trait::async_trait;
use modspec_core::Time;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{DocumentStore, FileStat, Result, StorageError};

#[derive(Debug, Clone)]
struct Document {
    content: String,
    modified: Time,
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<PathBuf, Document>,
    failing_writes: HashSet<PathBuf>,
    failing_reads: HashSet<PathBuf>,
}

/// Document store kept entirely in memory.
///
/// Cloning shares the underlying documents. Individual paths can be made to
/// fail, which is how partial-failure behavior is exercised.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `path` fail with an I/O error.
    pub async fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.state.lock().await.failing_writes.insert(path.into());
    }

    /// Make every read of `path` fail with an I/O error.
    pub async fn fail_reads_of(&self, path: impl Into<PathBuf>) {
        self.state.lock().await.failing_reads.insert(path.into());
    }

    /// Paths of all stored documents.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.state.lock().await.documents.keys().cloned().collect();
        paths.sort();
        paths
    }
}

fn injected(path: &Path, op: &str) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, format!("injected {} failure", op)),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn read_file(&self, path: &Path) -> Result<String> {
        let state = self.state.lock().await;
        if state.failing_reads.contains(path) {
            return Err(injected(path, "read"));
        }
        state
            .documents
            .get(path)
            .map(|d| d.content.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.failing_writes.contains(path) {
            return Err(injected(path, "write"));
        }
        state.documents.insert(
            path.to_path_buf(),
            Document {
                content: content.to_string(),
                modified: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let state = self.state.lock().await;
        state
            .documents
            .get(path)
            .map(|d| FileStat {
                mtime: d.modified,
                size: d.content.len() as u64,
            })
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .documents
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }

    async fn create_directory(&self, _path: &Path) -> Result<()> {
        // Directories are implicit.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_stat() {
        let store = InMemoryDocumentStore::new();
        let path = Path::new("/specs/f/requirements.md");

        store.write_file(path, "hello").await.unwrap();
        assert_eq!(store.read_file(path).await.unwrap(), "hello");
        assert_eq!(store.stat(path).await.unwrap().size, 5);
        assert!(store.exists(path).await.unwrap());

        store.delete(path).await.unwrap();
        assert!(store.read_file(path).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryDocumentStore::new();
        let path = PathBuf::from("/specs/f/design-frontend.md");
        store.fail_writes_to(path.clone()).await;

        let err = store.write_file(&path, "x").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(store.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_default_rename() {
        let store = InMemoryDocumentStore::new();
        store.write_file(Path::new("/a"), "content").await.unwrap();
        store.rename(Path::new("/a"), Path::new("/b")).await.unwrap();
        assert_eq!(store.paths().await, vec![PathBuf::from("/b")]);
    }
}
