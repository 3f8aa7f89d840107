//! Storage backend abstraction.
//!
//! The vault core never touches storage directly. All blob I/O goes
//! through the `DataProvider` trait, allowing vaults to live on a local
//! disk, an object store, or any remote backend with directory-ish
//! listing semantics. Paths are absolute `/`-separated strings from the
//! provider's root; the core treats them as opaque beyond joining
//! segments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a listed entry is a file blob or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Dir,
}

/// A single entry returned by [`DataProvider::list_items`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub kind: ItemKind,
    /// Last path segment.
    pub name: String,
    /// Full path from the provider root.
    pub full_name: String,
    /// Last modification time (ISO 8601), if the backend reports one.
    pub modified: Option<String>,
    /// Size in bytes (0 for directories).
    pub size: u64,
}

impl Item {
    pub fn file(name: impl Into<String>, full_name: impl Into<String>, size: u64) -> Self {
        Self {
            kind: ItemKind::File,
            name: name.into(),
            full_name: full_name.into(),
            modified: None,
            size,
        }
    }

    pub fn directory(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Dir,
            name: name.into(),
            full_name: full_name.into(),
            modified: None,
            size: 0,
        }
    }
}

/// Errors raised by storage backends.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("path already exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Asynchronous storage backend consumed by the vault core.
///
/// Implementations must be safe to call concurrently; the core fans out
/// up to `concurrency` simultaneous calls during listing and recursive
/// deletion. `remove_dir` removes a directory tree including its
/// contents; `remove_file` removes a single blob.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Whether a file or directory exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, ProviderError>;

    /// Read a file as UTF-8 text.
    async fn read_file_string(&self, path: &str) -> Result<String, ProviderError>;

    /// Write (create or replace) a file.
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), ProviderError>;

    /// Create a directory; with `recursive`, missing parents are created
    /// and an already-existing directory is not an error.
    async fn create_dir(&self, path: &str, recursive: bool) -> Result<(), ProviderError>;

    /// Remove a single file blob.
    async fn remove_file(&self, path: &str) -> Result<(), ProviderError>;

    /// Remove a directory and everything beneath it.
    async fn remove_dir(&self, path: &str) -> Result<(), ProviderError>;

    /// Rename/move a file or directory tree.
    async fn rename(&self, from: &str, to: &str) -> Result<(), ProviderError>;

    /// List the immediate children of a directory.
    async fn list_items(&self, path: &str) -> Result<Vec<Item>, ProviderError>;
}

/// Join a child segment onto a base path without doubling separators.
pub(crate) fn join_path(base: &str, child: &str) -> String {
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), child)
    }
}

/// [`DataProvider`] over the local filesystem via `tokio::fs`.
pub struct LocalFsProvider;

impl LocalFsProvider {
    fn map_io(err: std::io::Error, path: &str) -> ProviderError {
        match err.kind() {
            std::io::ErrorKind::NotFound => ProviderError::NotFound(path.to_string()),
            std::io::ErrorKind::AlreadyExists => ProviderError::AlreadyExists(path.to_string()),
            _ => ProviderError::Io(err),
        }
    }
}

#[async_trait]
impl DataProvider for LocalFsProvider {
    async fn exists(&self, path: &str) -> Result<bool, ProviderError> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn read_file_string(&self, path: &str) -> Result<String, ProviderError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Self::map_io(e, path))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), ProviderError> {
        tokio::fs::write(path, data)
            .await
            .map_err(|e| Self::map_io(e, path))
    }

    async fn create_dir(&self, path: &str, recursive: bool) -> Result<(), ProviderError> {
        let result = if recursive {
            tokio::fs::create_dir_all(path).await
        } else {
            tokio::fs::create_dir(path).await
        };
        result.map_err(|e| Self::map_io(e, path))
    }

    async fn remove_file(&self, path: &str) -> Result<(), ProviderError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| Self::map_io(e, path))
    }

    async fn remove_dir(&self, path: &str) -> Result<(), ProviderError> {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| Self::map_io(e, path))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), ProviderError> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| Self::map_io(e, from))
    }

    async fn list_items(&self, path: &str) -> Result<Vec<Item>, ProviderError> {
        let mut read_dir = tokio::fs::read_dir(path)
            .await
            .map_err(|e| Self::map_io(e, path))?;

        let mut items = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(ProviderError::Io)? {
            let name = entry.file_name().to_string_lossy().to_string();
            let full_name = format!("{}/{}", path.trim_end_matches('/'), name);
            let metadata = entry.metadata().await.map_err(ProviderError::Io)?;

            let modified = metadata
                .modified()
                .ok()
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());

            items.push(Item {
                kind: if metadata.is_dir() {
                    ItemKind::Dir
                } else {
                    ItemKind::File
                },
                name,
                full_name,
                modified,
                size: if metadata.is_dir() { 0 } else { metadata.len() },
            });
        }

        Ok(items)
    }
}
