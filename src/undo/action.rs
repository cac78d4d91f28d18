//! Recorded file mutations and the storage calls that reverse them.

use crate::error::{Error, Result};
use crate::storage::Storage;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of file mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoKind {
    Create,
    Delete,
    Rename,
    Move,
    Copy,
}

/// One reversible file mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoAction {
    #[serde(rename = "type")]
    pub kind: UndoKind,
    /// Path the mutation produced (or removed, for deletes)
    pub path: PathBuf,
    /// Path before a rename or move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<PathBuf>,
    /// File content captured at delete time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub is_directory: bool,
}

impl UndoAction {
    fn new(kind: UndoKind, path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind,
            path: path.into(),
            old_path: None,
            content: None,
            is_directory,
        }
    }

    pub fn create(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self::new(UndoKind::Create, path, is_directory)
    }

    /// A deleted file together with its content at delete time.
    ///
    /// `None` means the content could not be read; undo recreates the file empty.
    pub fn delete_file(path: impl Into<PathBuf>, content: Option<String>) -> Self {
        Self {
            content,
            ..Self::new(UndoKind::Delete, path, false)
        }
    }

    pub fn delete_directory(path: impl Into<PathBuf>) -> Self {
        Self::new(UndoKind::Delete, path, true)
    }

    /// `path` is the new location, `old_path` where it was before.
    pub fn rename(
        path: impl Into<PathBuf>,
        old_path: impl Into<PathBuf>,
        is_directory: bool,
    ) -> Self {
        Self {
            old_path: Some(old_path.into()),
            ..Self::new(UndoKind::Rename, path, is_directory)
        }
    }

    /// `path` is the destination, `old_path` the source.
    pub fn moved(
        path: impl Into<PathBuf>,
        old_path: impl Into<PathBuf>,
        is_directory: bool,
    ) -> Self {
        Self {
            old_path: Some(old_path.into()),
            ..Self::new(UndoKind::Move, path, is_directory)
        }
    }

    /// `path` is the new copy.
    pub fn copy(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self::new(UndoKind::Copy, path, is_directory)
    }

    /// The storage call that undoes this action.
    pub fn reversal(&self) -> Result<Reversal> {
        let remove = || {
            if self.is_directory {
                Reversal::DeleteDirectory(self.path.clone())
            } else {
                Reversal::DeleteFile(self.path.clone())
            }
        };

        let reversal = match self.kind {
            UndoKind::Create | UndoKind::Copy => remove(),
            UndoKind::Delete if self.is_directory => Reversal::CreateDirectory(self.path.clone()),
            UndoKind::Delete => Reversal::CreateFile {
                path: self.path.clone(),
                content: self.content.clone().unwrap_or_default(),
            },
            UndoKind::Rename => {
                let new_name = self
                    .old_path
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| self.missing_origin())?;
                Reversal::Rename {
                    path: self.path.clone(),
                    new_name,
                }
            }
            UndoKind::Move => Reversal::Move {
                src: self.path.clone(),
                dst: self.old_path.clone().ok_or_else(|| self.missing_origin())?,
            },
        };
        Ok(reversal)
    }

    fn missing_origin(&self) -> Error {
        Error::Application(format!(
            "cannot undo {:?} of {}: original path was not recorded",
            self.kind,
            self.path.display()
        ))
    }
}

/// A single storage call that reverses an `UndoAction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reversal {
    DeleteFile(PathBuf),
    DeleteDirectory(PathBuf),
    CreateFile { path: PathBuf, content: String },
    CreateDirectory(PathBuf),
    Rename { path: PathBuf, new_name: String },
    Move { src: PathBuf, dst: PathBuf },
}

impl Reversal {
    /// Issue the call against storage.
    pub async fn apply(&self, storage: &dyn Storage) -> Result<()> {
        debug!("Applying reversal {:?}", self);
        match self {
            Self::DeleteFile(path) => storage.delete_file(path).await,
            Self::DeleteDirectory(path) => storage.delete_directory(path).await,
            Self::CreateFile { path, content } => storage.create_file(path, content).await,
            Self::CreateDirectory(path) => storage.create_directory(path).await,
            Self::Rename { path, new_name } => storage.rename_file(path, new_name).await.map(|_| ()),
            Self::Move { src, dst } => storage.move_file(src, dst).await,
        }
    }

    /// Folder whose listing changes when this reversal runs.
    pub fn affected_folder(&self) -> Option<&Path> {
        match self {
            Self::DeleteFile(path)
            | Self::DeleteDirectory(path)
            | Self::CreateFile { path, .. }
            | Self::CreateDirectory(path)
            | Self::Rename { path, .. } => path.parent(),
            Self::Move { dst, .. } => dst.parent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_reverses_to_delete() {
        assert_eq!(
            UndoAction::create("/root/new.md", false).reversal().unwrap(),
            Reversal::DeleteFile(PathBuf::from("/root/new.md"))
        );
        assert_eq!(
            UndoAction::create("/root/dir", true).reversal().unwrap(),
            Reversal::DeleteDirectory(PathBuf::from("/root/dir"))
        );
    }

    #[test]
    fn test_delete_directory_recreates_empty() {
        assert_eq!(
            UndoAction::delete_directory("/root/dir").reversal().unwrap(),
            Reversal::CreateDirectory(PathBuf::from("/root/dir"))
        );
    }

    #[test]
    fn test_rename_uses_original_basename() {
        let action = UndoAction::rename("/root/new.md", "/root/old.md", false);
        assert_eq!(
            action.reversal().unwrap(),
            Reversal::Rename {
                path: PathBuf::from("/root/new.md"),
                new_name: "old.md".to_string(),
            }
        );
    }

    #[test]
    fn test_move_and_copy() {
        let moved = UndoAction::moved("/root/b/x.md", "/root/a/x.md", false);
        assert_eq!(
            moved.reversal().unwrap(),
            Reversal::Move {
                src: PathBuf::from("/root/b/x.md"),
                dst: PathBuf::from("/root/a/x.md"),
            }
        );
        assert_eq!(
            UndoAction::copy("/root/b/x.md", false).reversal().unwrap(),
            Reversal::DeleteFile(PathBuf::from("/root/b/x.md"))
        );
    }

    #[test]
    fn test_missing_origin_is_error() {
        let mut action = UndoAction::rename("/root/new.md", "/root/old.md", false);
        action.old_path = None;
        assert!(action.reversal().is_err());
    }

    #[test]
    fn test_action_serialization() {
        let action = UndoAction::delete_file("/root/draft.txt", Some("Hello".to_string()));
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"type\":\"delete\""));
        let parsed: UndoAction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, action);
    }
}
