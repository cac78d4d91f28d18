//! Local filesystem storage backed by `tokio::fs`.

use super::{renamed_path, DirEntry, Storage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use log::debug;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Storage collaborator over the real filesystem.
///
/// Rename, move and copy never overwrite an existing target, and
/// `create_file` refuses to clobber an existing file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    /// Create a new local storage backend.
    pub fn new() -> Self {
        Self
    }
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

fn already_exists(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("'{}' already exists", path.display()),
    )
}

/// Recursively copy `src` to `dst`.
fn copy_tree<'a>(
    src: &'a Path,
    dst: &'a Path,
) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let metadata = fs::metadata(src).await?;
        if !metadata.is_dir() {
            fs::copy(src, dst).await?;
            return Ok(());
        }

        fs::create_dir(dst).await?;
        let mut entries = fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let child_dst = dst.join(entry.file_name());
            copy_tree(&entry.path(), &child_dst).await?;
        }
        Ok(())
    })
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read_file(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .await
            .map_err(|source| Error::ReadFailure {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content)
            .await
            .map_err(|source| Error::WriteFailure {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn create_file(&self, path: &Path, content: &str) -> Result<()> {
        let to_err = |source| Error::WriteFailure {
            path: path.to_path_buf(),
            source,
        };
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(to_err)?;
        file.write_all(content.as_bytes()).await.map_err(to_err)?;
        file.flush().await.map_err(to_err)?;
        debug!("Created file: {}", path.display());
        Ok(())
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir(path)
            .await
            .map_err(|source| Error::WriteFailure {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|source| Error::DeleteFailure {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn delete_directory(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .await
            .map_err(|source| Error::DeleteFailure {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn rename_file(&self, path: &Path, new_name: &str) -> Result<PathBuf> {
        let target = renamed_path(path, new_name);
        if target == path {
            return Ok(target);
        }
        self.move_file(path, &target).await?;
        Ok(target)
    }

    async fn move_file(&self, src: &Path, dst: &Path) -> Result<()> {
        if exists(dst).await {
            return Err(Error::RenameConflict {
                path: src.to_path_buf(),
                target: dst.to_path_buf(),
            });
        }
        fs::rename(src, dst)
            .await
            .map_err(|source| Error::WriteFailure {
                path: dst.to_path_buf(),
                source,
            })
    }

    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        if exists(dst).await {
            return Err(Error::WriteFailure {
                path: dst.to_path_buf(),
                source: already_exists(dst),
            });
        }
        copy_tree(src, dst)
            .await
            .map_err(|source| Error::WriteFailure {
                path: dst.to_path_buf(),
                source,
            })
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let to_err = |source| Error::ReadFailure {
            path: path.to_path_buf(),
            source,
        };
        let mut entries = Vec::new();
        let mut reader = fs::read_dir(path).await.map_err(to_err)?;
        while let Some(entry) = reader.next_entry().await.map_err(to_err)? {
            let metadata = entry.metadata().await.ok();
            entries.push(DirEntry {
                path: entry.path(),
                is_directory: metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false),
                modified: metadata.and_then(|m| m.modified().ok()),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
