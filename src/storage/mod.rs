//! Storage collaborator for the session core
//!
//! Every byte the session core reads or writes goes through the [`Storage`]
//! trait: document files, directories touched by undo reversals and the
//! autosave side-channel files. Calls are asynchronous, may fail, and carry
//! no atomicity beyond a single call.
//!
//! Implementations:
//! - [`LocalStorage`] for the real filesystem (tokio::fs)
//! - [`MemoryStorage`] for an in-memory tree with an operation log
//! - [`DetachedStorage`] for the state before a backend is attached

mod local;
mod memory;

pub use local::LocalStorage;
pub use memory::{MemoryStorage, StorageOp};

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

// ─────────────────────────────────────────────────────────────────────────────
// Directory Listing
// ─────────────────────────────────────────────────────────────────────────────

/// One entry returned by [`Storage::list_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Full path of the entry
    pub path: PathBuf,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Last modification time, when the backend knows it
    pub modified: Option<SystemTime>,
}

impl DirEntry {
    /// File name of the entry as a string (empty if not valid UTF-8).
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Asynchronous, fallible access to the backing file system.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a whole file as UTF-8 text.
    async fn read_file(&self, path: &Path) -> Result<String>;

    /// Write a file, creating or truncating it.
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Create a new file; fails if it already exists.
    async fn create_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Create a new directory; fails if it already exists.
    async fn create_directory(&self, path: &Path) -> Result<()>;

    /// Delete a file.
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and everything below it.
    async fn delete_directory(&self, path: &Path) -> Result<()>;

    /// Rename an entry within its parent directory.
    ///
    /// Returns the new full path.
    async fn rename_file(&self, path: &Path, new_name: &str) -> Result<PathBuf>;

    /// Move an entry to a new full path; fails if the target exists.
    async fn move_file(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Copy a file or a directory tree; fails if the target exists.
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()>;

    /// List the direct children of a directory.
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Detached Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Storage placeholder used before a real backend is attached.
///
/// Every call fails with [`Error::StorageUnavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedStorage;

#[async_trait]
impl Storage for DetachedStorage {
    async fn read_file(&self, _path: &Path) -> Result<String> {
        Err(Error::StorageUnavailable)
    }

    async fn write_file(&self, _path: &Path, _content: &str) -> Result<()> {
        Err(Error::StorageUnavailable)
    }

    async fn create_file(&self, _path: &Path, _content: &str) -> Result<()> {
        Err(Error::StorageUnavailable)
    }

    async fn create_directory(&self, _path: &Path) -> Result<()> {
        Err(Error::StorageUnavailable)
    }

    async fn delete_file(&self, _path: &Path) -> Result<()> {
        Err(Error::StorageUnavailable)
    }

    async fn delete_directory(&self, _path: &Path) -> Result<()> {
        Err(Error::StorageUnavailable)
    }

    async fn rename_file(&self, _path: &Path, _new_name: &str) -> Result<PathBuf> {
        Err(Error::StorageUnavailable)
    }

    async fn move_file(&self, _src: &Path, _dst: &Path) -> Result<()> {
        Err(Error::StorageUnavailable)
    }

    async fn copy_file(&self, _src: &Path, _dst: &Path) -> Result<()> {
        Err(Error::StorageUnavailable)
    }

    async fn list_directory(&self, _path: &Path) -> Result<Vec<DirEntry>> {
        Err(Error::StorageUnavailable)
    }
}

/// Target path of renaming `path` to `new_name` within its parent.
pub fn renamed_path(path: &Path, new_name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(new_name),
        None => PathBuf::from(new_name),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
