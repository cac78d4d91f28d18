//! Workspace modes for the session core
//!
//! This module provides:
//! - The two independent workspace modes and their navigation state
//! - The `SnapshotStore` saving and restoring one tab session per mode
//! - Persistence of those sessions across restarts

mod persistence;
mod snapshot;

pub use persistence::{
    get_sessions_file_path, load_sessions_from, save_sessions_to, PersistedSessions,
};
pub use snapshot::{SessionSnapshot, SnapshotStore, SwitchOutcome, SwitchState};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Workspace Mode
// ─────────────────────────────────────────────────────────────────────────────

/// One of the two independent root contexts, each with its own tab session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceMode {
    /// The regular document tree
    #[default]
    Normal,
    /// The secondary root the user can flip to
    Alternate,
}

impl WorkspaceMode {
    /// The mode a toggle switches to.
    pub fn other(self) -> Self {
        match self {
            Self::Normal => Self::Alternate,
            Self::Alternate => Self::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Alternate => "alternate",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Navigation State
// ─────────────────────────────────────────────────────────────────────────────

/// Where the explorer is and what it has selected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationState {
    /// Directory being browsed
    pub current_path: Option<PathBuf>,
    /// File highlighted in the explorer
    pub selected_file: Option<PathBuf>,
}

impl NavigationState {
    pub fn new(current_path: impl Into<PathBuf>) -> Self {
        Self {
            current_path: Some(current_path.into()),
            selected_file: None,
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Change directory, dropping a selection that lies outside it.
    pub fn change_directory(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self
            .selected_file
            .as_deref()
            .is_some_and(|f| f.parent() != Some(path.as_path()))
        {
            self.selected_file = None;
        }
        self.current_path = Some(path);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
