//! Per-mode session snapshots and the mode switch.

use super::{NavigationState, WorkspaceMode};
use crate::collaborators::Explorer;
use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::tabs::{TabRegistry, TabRegistrySnapshot};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything needed to bring one workspace mode back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    /// Open tabs, active tab and per-tab edit state
    pub registry: TabRegistrySnapshot,
    /// Directory the explorer was showing
    pub current_path: Option<PathBuf>,
    /// File selected in the explorer
    pub selected_file_path: Option<PathBuf>,
}

impl SessionSnapshot {
    /// Capture the live registry and navigation.
    pub fn capture(registry: &TabRegistry, nav: &NavigationState) -> Self {
        Self {
            registry: registry.snapshot(),
            current_path: nav.current_path.clone(),
            selected_file_path: nav.selected_file.clone(),
        }
    }

    /// Drop duplicate tabs and a dangling active id.
    pub(crate) fn healed(mut self) -> Self {
        let mut registry = TabRegistry::new();
        registry.restore(&self.registry);
        self.registry = registry.snapshot();
        self
    }
}

/// Result of a `switch_mode` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The target mode's session is now live in this directory
    Switched { current_path: PathBuf },
    /// Source and target are the same mode
    Unchanged,
    /// Another switch was already running
    Ignored,
}

/// Whether a mode switch is running.
///
/// `switch_mode` borrows the store mutably for its whole run, so through the
/// public API no other call sees `Switching`; the exclusive borrow is what
/// serializes switches. The state is reset when the switch future finishes
/// or is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchState {
    #[default]
    Idle,
    Switching,
}

/// Resets the switch state however the switch ends.
struct SwitchGuard<'a>(&'a mut SwitchState);

impl<'a> SwitchGuard<'a> {
    fn enter(state: &'a mut SwitchState) -> Self {
        *state = SwitchState::Switching;
        Self(state)
    }
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        *self.0 = SwitchState::Idle;
    }
}

/// Holds one retained session per workspace mode.
pub struct SnapshotStore {
    slots: BTreeMap<WorkspaceMode, SessionSnapshot>,
    /// Directory the user was in right before first entering each mode
    entry_paths: BTreeMap<WorkspaceMode, PathBuf>,
    state: SwitchState,
    storage: Arc<dyn Storage>,
    home: PathBuf,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("slots", &self.slots)
            .field("entry_paths", &self.entry_paths)
            .field("state", &self.state)
            .field("home", &self.home)
            .finish()
    }
}

impl SnapshotStore {
    /// `home` is the last-resort directory when a mode has nowhere to go.
    pub fn new(storage: Arc<dyn Storage>, home: impl Into<PathBuf>) -> Self {
        Self {
            slots: BTreeMap::new(),
            entry_paths: BTreeMap::new(),
            state: SwitchState::Idle,
            storage,
            home: home.into(),
        }
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    pub fn is_switching(&self) -> bool {
        self.state == SwitchState::Switching
    }

    /// The retained session for `mode`.
    pub fn slot(&self, mode: WorkspaceMode) -> Option<&SessionSnapshot> {
        self.slots.get(&mode)
    }

    pub fn entry_path(&self, mode: WorkspaceMode) -> Option<&Path> {
        self.entry_paths.get(&mode).map(PathBuf::as_path)
    }

    pub(crate) fn slots(&self) -> &BTreeMap<WorkspaceMode, SessionSnapshot> {
        &self.slots
    }

    pub(crate) fn entry_paths(&self) -> &BTreeMap<WorkspaceMode, PathBuf> {
        &self.entry_paths
    }

    /// Replace the retained sessions, healing duplicate tabs.
    pub(crate) fn load(
        &mut self,
        slots: BTreeMap<WorkspaceMode, SessionSnapshot>,
        entry_paths: BTreeMap<WorkspaceMode, PathBuf>,
    ) {
        self.slots = slots
            .into_iter()
            .map(|(mode, snapshot)| (mode, snapshot.healed()))
            .collect();
        self.entry_paths = entry_paths;
    }

    /// Record the live session into `mode`'s slot.
    ///
    /// Skipped while a switch is running. Returns `true` if captured.
    pub fn capture(
        &mut self,
        mode: WorkspaceMode,
        registry: &TabRegistry,
        nav: &NavigationState,
    ) -> bool {
        if self.is_switching() {
            debug!("Skipping capture of {} during switch", mode.label());
            return false;
        }
        self.slots
            .insert(mode, SessionSnapshot::capture(registry, nav));
        true
    }

    /// Swap the live session from `from` to `to`.
    ///
    /// The live session is captured into `from`'s slot, then `to`'s slot is
    /// applied in one step once its directory has been resolved: the
    /// snapshot's own path, else `fallback`, else the path the user left
    /// when first entering `to`, else home. The selection is restored only
    /// if it lies in the resolved directory. When no candidate directory
    /// exists the live session is left untouched and `ModeSwitchFailure` is
    /// returned.
    ///
    /// Switches are serialized by the exclusive borrow: no capture or second
    /// switch can run against this store until the returned future completes.
    /// `Ignored` is returned only if the state is already `Switching`.
    pub async fn switch_mode(
        &mut self,
        from: WorkspaceMode,
        to: WorkspaceMode,
        registry: &mut TabRegistry,
        nav: &mut NavigationState,
        explorer: &mut dyn Explorer,
        fallback: Option<&Path>,
    ) -> Result<SwitchOutcome> {
        if self.is_switching() {
            warn!("Mode switch to {} ignored, switch in progress", to.label());
            return Ok(SwitchOutcome::Ignored);
        }
        if from == to {
            return Ok(SwitchOutcome::Unchanged);
        }

        self.slots
            .insert(from, SessionSnapshot::capture(registry, nav));

        let Self {
            slots,
            entry_paths,
            state,
            storage,
            home,
        } = self;
        let guard = SwitchGuard::enter(state);

        let target = slots.get(&to).cloned().unwrap_or_default();
        if let Some(left) = &nav.current_path {
            entry_paths.entry(to).or_insert_with(|| left.clone());
        }

        let candidates = [
            target.current_path.as_deref(),
            fallback,
            entry_paths.get(&to).map(PathBuf::as_path),
            Some(home.as_path()),
        ];
        let mut resolved = None;
        for candidate in candidates.into_iter().flatten() {
            match storage.list_directory(candidate).await {
                Ok(_) => {
                    resolved = Some(candidate.to_path_buf());
                    break;
                }
                Err(e) => debug!("Skipping {} for {}: {}", candidate.display(), to.label(), e),
            }
        }
        let Some(current_path) = resolved else {
            return Err(Error::ModeSwitchFailure {
                message: format!("no reachable directory for {} mode", to.label()),
            });
        };

        registry.restore(&target.registry);
        nav.current_path = Some(current_path.clone());
        nav.selected_file = target
            .selected_file_path
            .filter(|f| f.parent() == Some(current_path.as_path()));
        drop(guard);

        explorer.refresh();
        explorer.focus();
        info!(
            "Switched to {} mode at {} with {} tab(s)",
            to.label(),
            current_path.display(),
            registry.tab_count()
        );
        Ok(SwitchOutcome::Switched { current_path })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
