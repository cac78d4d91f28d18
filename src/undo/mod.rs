//! Undo history for file mutations
//!
//! Every successful create, delete, rename, move or copy is recorded on a
//! stack belonging to the directory that was active when it happened.
//! Changing directory switches which stack is visible; the others are kept
//! as they are. The log itself does no I/O: callers turn a popped action
//! into a `Reversal` and apply it to storage.

mod action;

pub use action::{Reversal, UndoAction, UndoKind};

use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Per-directory stacks of undo actions.
#[derive(Debug, Default)]
pub struct UndoLog {
    stacks: HashMap<PathBuf, Vec<UndoAction>>,
    active_dir: Option<PathBuf>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `path`'s stack the visible one, creating it if needed.
    pub fn set_active_directory(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.stacks.entry(path.clone()).or_default();
        debug!("Undo history now scoped to {}", path.display());
        self.active_dir = Some(path);
    }

    pub fn active_directory(&self) -> Option<&Path> {
        self.active_dir.as_deref()
    }

    fn active_stack(&self) -> Option<&Vec<UndoAction>> {
        self.stacks.get(self.active_dir.as_ref()?)
    }

    fn active_stack_mut(&mut self) -> Option<&mut Vec<UndoAction>> {
        self.stacks.get_mut(self.active_dir.as_ref()?)
    }

    /// Record an action on the active directory's stack.
    ///
    /// Returns `false` (and drops the action) if no directory is active.
    pub fn push(&mut self, action: UndoAction) -> bool {
        match self.active_stack_mut() {
            Some(stack) => {
                debug!("Recorded undo {:?} for {}", action.kind, action.path.display());
                stack.push(action);
                true
            }
            None => {
                warn!("No active directory, dropping undo for {}", action.path.display());
                false
            }
        }
    }

    /// Remove and return the newest action of the active directory.
    pub fn pop(&mut self) -> Option<UndoAction> {
        self.active_stack_mut()?.pop()
    }

    /// The action `pop` would return.
    pub fn peek(&self) -> Option<&UndoAction> {
        self.active_stack()?.last()
    }

    /// Number of actions on the visible stack.
    pub fn len(&self) -> usize {
        self.active_stack().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of actions recorded for any directory.
    pub fn len_for(&self, dir: &Path) -> usize {
        self.stacks.get(dir).map_or(0, Vec::len)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
