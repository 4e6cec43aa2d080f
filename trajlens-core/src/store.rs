//! Log store access
//!
//! The parser and the aggregator both consume logs through the [`LogStore`]
//! trait, so the transport is swappable (tests use an in-memory store). The
//! shipped implementation reads `*.log` files from a directory.

use crate::error::{Error, Result};
use crate::types::LogFile;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Source of evaluation logs.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Enumerate available log files.
    async fn list(&self) -> Result<Vec<LogFile>>;

    /// Fetch one log's full text. [`Error::NotFound`] when the store has no
    /// such file.
    async fn fetch(&self, filename: &str) -> Result<String>;
}

/// Directory-backed log store. Only `*.log` files directly under the root
/// are visible.
#[derive(Debug, Clone)]
pub struct FsLogStore {
    root: PathBuf,
}

impl FsLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl LogStore for FsLogStore {
    async fn list(&self) -> Result<Vec<LogFile>> {
        let pattern = self.root.join("*.log");
        let pattern = pattern.to_string_lossy();
        let paths =
            glob::glob(&pattern).map_err(|e| Error::Store(format!("bad glob pattern: {e}")))?;

        let mut files = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| Error::Store(format!("unreadable entry: {e}")))?;
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let metadata = std::fs::metadata(&path)?;
            files.push(LogFile {
                filename: name.to_string(),
                size_bytes: metadata.len(),
            });
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    async fn fetch(&self, filename: &str) -> Result<String> {
        // Names come from untrusted input; never let them walk the tree.
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(Error::Store(format!("invalid log filename: {filename}")));
        }
        let path = self.root.join(filename);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(filename.to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Fetch with a deadline. A slow store surfaces as [`Error::Store`] rather
/// than hanging the caller.
pub async fn fetch_timed(
    store: &dyn LogStore,
    filename: &str,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, store.fetch(filename)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Store(format!("timed out fetching {filename}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_sorted_log_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_task-2.log"), "two").unwrap();
        std::fs::write(dir.path().join("a_task-1.log"), "one").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = FsLogStore::new(dir.path());
        let files = store.list().await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "a_task-1.log");
        assert_eq!(files[1].filename, "b_task-2.log");
        assert_eq!(files[1].size_bytes, 3);
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsLogStore::new(dir.path());
        let err = store.fetch("ghost.log").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(name) if name == "ghost.log"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsLogStore::new(dir.path());
        let err = store.fetch("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn test_fetch_timed_deadline() {
        struct SlowStore;

        #[async_trait]
        impl LogStore for SlowStore {
            async fn list(&self) -> Result<Vec<LogFile>> {
                Ok(Vec::new())
            }
            async fn fetch(&self, _filename: &str) -> Result<String> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            }
        }

        let err = fetch_timed(&SlowStore, "x.log", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(msg) if msg.contains("timed out")));
    }
}
