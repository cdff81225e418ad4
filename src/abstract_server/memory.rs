use std::collections::BTreeMap;

use async_trait::async_trait;

use super::server_interface::{checked_archive_path, ArchiveStore, Result, RowSource, ServerError};
use crate::file_format::join_row::JoinRow;

/// Fixed rows, for tests and for serving a captured result set.
#[derive(Clone, Debug, Default)]
pub struct MemoryRowSource {
    rows: Vec<JoinRow>,
}

impl MemoryRowSource {
    pub fn new(rows: Vec<JoinRow>) -> Self {
        MemoryRowSource { rows }
    }
}

#[async_trait]
impl RowSource for MemoryRowSource {
    async fn fetch_rows(&self) -> Result<Vec<JoinRow>> {
        Ok(self.rows.clone())
    }
}

/// Archive contents keyed by the same relative paths `fetch_file` takes.
#[derive(Clone, Debug, Default)]
pub struct MemoryArchiveStore {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), contents.into());
        self
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = checked_archive_path(path)?;
        match self.files.get(path) {
            Some(contents) => Ok(contents.clone()),
            None => Err(ServerError::NotFound(path.to_string())),
        }
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_archive() {
        let store = MemoryArchiveStore::new()
            .with_file("b.txt", "bee")
            .with_file("a/1.txt", b"one".to_vec());

        assert_eq!(store.fetch_file("b.txt").await.unwrap(), b"bee".to_vec());
        assert_eq!(
            store.fetch_file("c.txt").await,
            Err(ServerError::NotFound("c.txt".to_string()))
        );
        assert_eq!(store.fetch_file("../b.txt").await.unwrap_err().kind(), "bad_input");
        assert_eq!(
            store.list_files().await.unwrap(),
            vec!["a/1.txt".to_string(), "b.txt".to_string()]
        );
    }
}
