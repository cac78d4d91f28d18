//! In-memory storage with an operation log and failure injection.
//!
//! `MemoryStorage` behaves like a small filesystem: directories must exist
//! before they can be listed, creates refuse to overwrite, moves and copies
//! carry whole subtrees. Every issued call is appended to an operation log
//! so callers can assert on exactly which storage calls were made.

use super::{renamed_path, DirEntry, Storage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A storage call recorded by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Read(PathBuf),
    Write { path: PathBuf, content: String },
    CreateFile { path: PathBuf, content: String },
    CreateDirectory(PathBuf),
    DeleteFile(PathBuf),
    DeleteDirectory(PathBuf),
    Rename { path: PathBuf, new_name: String },
    Move { src: PathBuf, dst: PathBuf },
    Copy { src: PathBuf, dst: PathBuf },
    List(PathBuf),
}

#[derive(Debug, Clone)]
enum Node {
    File { content: String, modified: SystemTime },
    Directory { modified: SystemTime },
}

impl Node {
    fn is_directory(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    fn modified(&self) -> SystemTime {
        match self {
            Node::File { modified, .. } | Node::Directory { modified } => *modified,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<PathBuf, Node>,
    ops: Vec<StorageOp>,
    failing: HashSet<PathBuf>,
    clock: u64,
}

impl Inner {
    /// Logical clock so modification order is deterministic.
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        UNIX_EPOCH + Duration::from_millis(self.clock)
    }

    fn injected(&self, path: &Path) -> Option<io::Error> {
        self.failing
            .contains(path)
            .then(|| io::Error::new(io::ErrorKind::Other, "injected failure"))
    }

    /// Error for a path whose parent directory does not exist.
    fn missing_parent(&self, path: &Path) -> Option<io::Error> {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty())?;
        match self.nodes.get(parent) {
            Some(node) if node.is_directory() => None,
            _ => Some(not_found(parent)),
        }
    }

    fn subtree(&self, root: &Path) -> Vec<PathBuf> {
        self.nodes
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("'{}' not found", path.display()),
    )
}

fn already_exists(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("'{}' already exists", path.display()),
    )
}

/// In-memory storage collaborator.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    /// Create an empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Seeding (not recorded in the operation log)
    // ─────────────────────────────────────────────────────────────────────────

    /// Seed a directory (and its ancestors).
    pub fn with_directory(self, path: impl Into<PathBuf>) -> Self {
        self.seed_directory(&path.into());
        self
    }

    /// Seed a file (and its ancestor directories).
    pub fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.seed_directory(parent);
        }
        let mut inner = self.lock();
        let modified = inner.tick();
        inner.nodes.insert(
            path,
            Node::File {
                content: content.to_string(),
                modified,
            },
        );
        drop(inner);
        self
    }

    fn seed_directory(&self, path: &Path) {
        let mut inner = self.lock();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() || inner.nodes.contains_key(ancestor) {
                continue;
            }
            let modified = inner.tick();
            inner
                .nodes
                .insert(ancestor.to_path_buf(), Node::Directory { modified });
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Content of a file, if it exists.
    pub fn file_content(&self, path: impl AsRef<Path>) -> Option<String> {
        match self.lock().nodes.get(path.as_ref()) {
            Some(Node::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    /// Whether a file or directory exists at `path`.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.lock().nodes.contains_key(path.as_ref())
    }

    /// Whether `path` is an existing directory.
    pub fn is_directory(&self, path: impl AsRef<Path>) -> bool {
        self.lock()
            .nodes
            .get(path.as_ref())
            .map(Node::is_directory)
            .unwrap_or(false)
    }

    /// Paths of the files directly inside `dir`, sorted.
    pub fn files_in(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = dir.as_ref();
        self.lock()
            .nodes
            .iter()
            .filter(|(p, n)| p.parent() == Some(dir) && !n.is_directory())
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// All calls issued so far.
    pub fn operations(&self) -> Vec<StorageOp> {
        self.lock().ops.clone()
    }

    /// Forget the recorded calls.
    pub fn clear_operations(&self) {
        self.lock().ops.clear();
    }

    /// Make every call that targets `path` fail.
    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        self.lock().failing.insert(path.into());
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read_file(&self, path: &Path) -> Result<String> {
        let mut inner = self.lock();
        inner.ops.push(StorageOp::Read(path.to_path_buf()));
        let to_err = |source| Error::ReadFailure {
            path: path.to_path_buf(),
            source,
        };
        if let Some(err) = inner.injected(path) {
            return Err(to_err(err));
        }
        match inner.nodes.get(path) {
            Some(Node::File { content, .. }) => Ok(content.clone()),
            Some(Node::Directory { .. }) => Err(to_err(io::Error::new(
                io::ErrorKind::Other,
                "is a directory",
            ))),
            None => Err(to_err(not_found(path))),
        }
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.ops.push(StorageOp::Write {
            path: path.to_path_buf(),
            content: content.to_string(),
        });
        let to_err = |source| Error::WriteFailure {
            path: path.to_path_buf(),
            source,
        };
        if let Some(err) = inner.injected(path) {
            return Err(to_err(err));
        }
        if inner.nodes.get(path).map(Node::is_directory).unwrap_or(false) {
            return Err(to_err(io::Error::new(
                io::ErrorKind::Other,
                "is a directory",
            )));
        }
        if let Some(err) = inner.missing_parent(path) {
            return Err(to_err(err));
        }
        let modified = inner.tick();
        inner.nodes.insert(
            path.to_path_buf(),
            Node::File {
                content: content.to_string(),
                modified,
            },
        );
        Ok(())
    }

    async fn create_file(&self, path: &Path, content: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.ops.push(StorageOp::CreateFile {
            path: path.to_path_buf(),
            content: content.to_string(),
        });
        let to_err = |source| Error::WriteFailure {
            path: path.to_path_buf(),
            source,
        };
        if let Some(err) = inner.injected(path) {
            return Err(to_err(err));
        }
        if inner.nodes.contains_key(path) {
            return Err(to_err(already_exists(path)));
        }
        if let Some(err) = inner.missing_parent(path) {
            return Err(to_err(err));
        }
        let modified = inner.tick();
        inner.nodes.insert(
            path.to_path_buf(),
            Node::File {
                content: content.to_string(),
                modified,
            },
        );
        Ok(())
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        let mut inner = self.lock();
        inner.ops.push(StorageOp::CreateDirectory(path.to_path_buf()));
        let to_err = |source| Error::WriteFailure {
            path: path.to_path_buf(),
            source,
        };
        if let Some(err) = inner.injected(path) {
            return Err(to_err(err));
        }
        if inner.nodes.contains_key(path) {
            return Err(to_err(already_exists(path)));
        }
        if let Some(err) = inner.missing_parent(path) {
            return Err(to_err(err));
        }
        let modified = inner.tick();
        inner
            .nodes
            .insert(path.to_path_buf(), Node::Directory { modified });
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        let mut inner = self.lock();
        inner.ops.push(StorageOp::DeleteFile(path.to_path_buf()));
        let to_err = |source| Error::DeleteFailure {
            path: path.to_path_buf(),
            source,
        };
        if let Some(err) = inner.injected(path) {
            return Err(to_err(err));
        }
        match inner.nodes.get(path) {
            Some(Node::File { .. }) => {
                inner.nodes.remove(path);
                Ok(())
            }
            Some(Node::Directory { .. }) => Err(to_err(io::Error::new(
                io::ErrorKind::Other,
                "is a directory",
            ))),
            None => Err(to_err(not_found(path))),
        }
    }

    async fn delete_directory(&self, path: &Path) -> Result<()> {
        let mut inner = self.lock();
        inner.ops.push(StorageOp::DeleteDirectory(path.to_path_buf()));
        let to_err = |source| Error::DeleteFailure {
            path: path.to_path_buf(),
            source,
        };
        if let Some(err) = inner.injected(path) {
            return Err(to_err(err));
        }
        if !inner.nodes.get(path).map(Node::is_directory).unwrap_or(false) {
            return Err(to_err(not_found(path)));
        }
        for doomed in inner.subtree(path) {
            inner.nodes.remove(&doomed);
        }
        Ok(())
    }

    async fn rename_file(&self, path: &Path, new_name: &str) -> Result<PathBuf> {
        self.lock().ops.push(StorageOp::Rename {
            path: path.to_path_buf(),
            new_name: new_name.to_string(),
        });
        let target = renamed_path(path, new_name);
        if target == path {
            return Ok(target);
        }
        self.relocate(path, &target, false)?;
        Ok(target)
    }

    async fn move_file(&self, src: &Path, dst: &Path) -> Result<()> {
        self.lock().ops.push(StorageOp::Move {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
        self.relocate(src, dst, false)
    }

    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        self.lock().ops.push(StorageOp::Copy {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
        self.relocate(src, dst, true)
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut inner = self.lock();
        inner.ops.push(StorageOp::List(path.to_path_buf()));
        let to_err = |source| Error::ReadFailure {
            path: path.to_path_buf(),
            source,
        };
        if let Some(err) = inner.injected(path) {
            return Err(to_err(err));
        }
        if !inner.nodes.get(path).map(Node::is_directory).unwrap_or(false) {
            return Err(to_err(not_found(path)));
        }
        Ok(inner
            .nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, node)| DirEntry {
                path: p.clone(),
                is_directory: node.is_directory(),
                modified: Some(node.modified()),
            })
            .collect())
    }
}

impl MemoryStorage {
    /// Move or copy `src` and its subtree to `dst`.
    fn relocate(&self, src: &Path, dst: &Path, keep_source: bool) -> Result<()> {
        let mut inner = self.lock();
        if let Some(err) = inner.injected(src).or_else(|| inner.injected(dst)) {
            return Err(Error::WriteFailure {
                path: dst.to_path_buf(),
                source: err,
            });
        }
        if !inner.nodes.contains_key(src) {
            return Err(Error::ReadFailure {
                path: src.to_path_buf(),
                source: not_found(src),
            });
        }
        if let Some(err) = inner.missing_parent(dst) {
            return Err(Error::WriteFailure {
                path: dst.to_path_buf(),
                source: err,
            });
        }
        if inner.nodes.contains_key(dst) {
            if keep_source {
                return Err(Error::WriteFailure {
                    path: dst.to_path_buf(),
                    source: already_exists(dst),
                });
            }
            return Err(Error::RenameConflict {
                path: src.to_path_buf(),
                target: dst.to_path_buf(),
            });
        }

        for old in inner.subtree(src) {
            let Ok(suffix) = old.strip_prefix(src) else {
                continue;
            };
            let new = if suffix.as_os_str().is_empty() {
                dst.to_path_buf()
            } else {
                dst.join(suffix)
            };
            let node = if keep_source {
                inner.nodes.get(&old).cloned()
            } else {
                inner.nodes.remove(&old)
            };
            if let Some(node) = node {
                inner.nodes.insert(new, node);
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
