//! Open-document tabs for the session core
//!
//! This module provides:
//! - The `Tab` and `DirtyState` data types
//! - The `TabRegistry` holding the ordered tab set and the active selection
//! - The `CloseController` gating tab closure against unsaved edits
//!
//! The registry does no I/O. Other parts of the application learn about
//! changes by draining the queued `TabEvent`s.

mod close;
mod registry;

pub use close::{CloseController, CloseOutcome, PendingClose};
pub use registry::TabRegistry;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Dirty State
// ─────────────────────────────────────────────────────────────────────────────

/// Edit state of one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirtyState {
    /// The document is open in edit mode
    pub is_editing: bool,
    /// The document has modifications not yet on disk
    pub has_changes: bool,
}

impl DirtyState {
    /// A tab that is neither being edited nor modified.
    pub const CLEAN: Self = Self {
        is_editing: false,
        has_changes: false,
    };

    pub fn new(is_editing: bool, has_changes: bool) -> Self {
        Self {
            is_editing,
            has_changes,
        }
    }

    /// Whether closing the tab needs confirmation.
    pub fn is_dirty(&self) -> bool {
        self.is_editing || self.has_changes
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tab
// ─────────────────────────────────────────────────────────────────────────────

/// One open document.
///
/// The id is the canonical absolute path; no two tabs share an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    /// Canonical absolute path of the document
    pub id: PathBuf,
    /// Last known edit state
    #[serde(default)]
    pub state: DirtyState,
}

impl Tab {
    /// Create a clean tab for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: path.into(),
            state: DirtyState::CLEAN,
        }
    }

    /// Path of the document.
    pub fn file_path(&self) -> &Path {
        &self.id
    }

    /// File name shown on the tab.
    pub fn display_name(&self) -> String {
        display_name(&self.id)
    }
}

/// File name of `path`, or the whole path when it has none.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Full copy of the registry, used for workspace session switching.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TabRegistrySnapshot {
    /// Open tabs in display order
    pub tabs: Vec<Tab>,
    /// Id of the active tab
    pub active_tab_id: Option<PathBuf>,
    /// Per-tab edit state; authoritative over `Tab::state` on restore
    pub tab_states: BTreeMap<PathBuf, DirtyState>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Changes the registry reports to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    /// A new tab was appended
    Opened(PathBuf),
    /// A tab became active, carrying its restored edit state
    Activated { id: PathBuf, state: DirtyState },
    /// The active selection was cleared (no tabs left)
    Deactivated,
    /// A tab was removed
    Closed(PathBuf),
    /// A tab's identity moved to a new path
    Retargeted { from: PathBuf, to: PathBuf },
    /// The whole registry was replaced from a snapshot
    Restored { active: Option<PathBuf> },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
