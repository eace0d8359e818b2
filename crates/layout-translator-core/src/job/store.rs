//! Disk-backed storage for job inputs and translated documents.
//!
//! Each orchestrator owns one temp directory, removed when the store is
//! dropped. Bookkeeping (which results exist) is kept in memory behind a
//! mutex and is only touched after the file I/O has finished, so the lock is
//! never held across an await.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::TempDir;
use tracing::debug;

use crate::progress::TaskId;

pub struct ResultStore {
    /// Temp directory - auto-cleaned on drop
    dir: TempDir,
    /// Tasks whose translated document has been written
    results: Mutex<HashSet<TaskId>>,
}

impl ResultStore {
    /// Create a store with a fresh temp directory.
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        debug!("Created result store at {}", dir.path().display());
        Ok(Self {
            dir,
            results: Mutex::new(HashSet::new()),
        })
    }

    fn results(&self) -> MutexGuard<'_, HashSet<TaskId>> {
        self.results
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_path(&self, task_id: &TaskId) -> PathBuf {
        self.dir.path().join(format!("input_{task_id}.pdf"))
    }

    pub fn result_path(&self, task_id: &TaskId) -> PathBuf {
        self.dir.path().join(format!("translated_{task_id}.pdf"))
    }

    pub fn has_result(&self, task_id: &TaskId) -> bool {
        self.results().contains(task_id)
    }

    /// Write the submitted document next to the results.
    pub async fn stage_input(&self, task_id: &TaskId, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::write(self.input_path(task_id), bytes).await?;
        debug!("Staged input for task {}", task_id);
        Ok(())
    }

    pub async fn remove_input(&self, task_id: &TaskId) -> io::Result<()> {
        match tokio::fs::remove_file(self.input_path(task_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Write a translated document, then register it.
    pub async fn store_result(&self, task_id: &TaskId, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::write(self.result_path(task_id), bytes).await?;
        self.results().insert(task_id.clone());
        debug!("Stored result for task {} ({} bytes)", task_id, bytes.len());
        Ok(())
    }

    /// Read a registered result; `None` if the task has none.
    pub async fn read_result(&self, task_id: &TaskId) -> io::Result<Option<Vec<u8>>> {
        if !self.has_result(task_id) {
            return Ok(None);
        }
        tokio::fs::read(self.result_path(task_id)).await.map(Some)
    }

    /// Forget a task and delete its files (sync).
    pub fn remove(&self, task_id: &TaskId) {
        self.results().remove(task_id);
        let _ = std::fs::remove_file(self.input_path(task_id));
        let _ = std::fs::remove_file(self.result_path(task_id));
        debug!("Removed artifacts for task {}", task_id);
    }

    pub fn len(&self) -> usize {
        self.results().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_read_result() {
        let store = ResultStore::new().unwrap();
        let id = TaskId::from("abc");

        assert!(store.read_result(&id).await.unwrap().is_none());
        store.store_result(&id, b"%PDF-1.5").await.unwrap();

        assert!(store.has_result(&id));
        assert_eq!(store.read_result(&id).await.unwrap().unwrap(), b"%PDF-1.5");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_staged_input_lifecycle() {
        let store = ResultStore::new().unwrap();
        let id = TaskId::new();

        store.stage_input(&id, b"input").await.unwrap();
        assert!(store.input_path(&id).exists());

        store.remove_input(&id).await.unwrap();
        assert!(!store.input_path(&id).exists());
        // removing twice is fine
        store.remove_input(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_deletes_everything() {
        let store = ResultStore::new().unwrap();
        let id = TaskId::new();
        store.stage_input(&id, b"in").await.unwrap();
        store.store_result(&id, b"out").await.unwrap();

        store.remove(&id);

        assert!(store.is_empty());
        assert!(!store.input_path(&id).exists());
        assert!(!store.result_path(&id).exists());
    }

    #[test]
    fn test_dir_cleaned_on_drop() {
        let store = ResultStore::new().unwrap();
        let root = store.root().to_path_buf();
        assert!(root.exists());
        drop(store);
        assert!(!root.exists());
    }
}
