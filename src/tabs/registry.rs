//! The ordered set of open tabs and the active selection.

use super::{DirtyState, Tab, TabEvent, TabRegistrySnapshot};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Registry of open documents.
///
/// Tabs are kept in display order; an id set gives constant-time duplicate
/// detection. Every change is queued as a [`TabEvent`].
///
/// # Example
///
/// ```
/// use ferrite_session::tabs::TabRegistry;
///
/// let mut tabs = TabRegistry::new();
/// tabs.open_or_activate("/root/todo.md");
/// assert_eq!(tabs.tab_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct TabRegistry {
    /// All open tabs, in display order
    tabs: Vec<Tab>,
    /// Ids of `tabs`
    ids: HashSet<PathBuf>,
    /// Id of the active tab
    active: Option<PathBuf>,
    /// Events not yet taken by subscribers
    pending_events: Vec<TabEvent>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the number of open tabs.
    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Get all tabs (read-only).
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    /// Check whether a tab with this id is open.
    pub fn contains(&self, id: &Path) -> bool {
        self.ids.contains(id)
    }

    /// Get a tab by id.
    pub fn get(&self, id: &Path) -> Option<&Tab> {
        self.position(id).map(|index| &self.tabs[index])
    }

    /// Index of a tab by id.
    pub fn position(&self, id: &Path) -> Option<usize> {
        if !self.ids.contains(id) {
            return None;
        }
        self.tabs.iter().position(|t| t.id == id)
    }

    /// Id of the active tab.
    pub fn active_id(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    /// The active tab.
    pub fn active_tab(&self) -> Option<&Tab> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    /// Whether `id` is the active tab.
    pub fn is_active(&self, id: &Path) -> bool {
        self.active.as_deref() == Some(id)
    }

    /// Check if any tab needs confirmation before closing.
    pub fn has_dirty_tabs(&self) -> bool {
        self.tabs.iter().any(|t| t.state.is_dirty())
    }

    /// Take queued events (clears the queue).
    pub fn take_events(&mut self) -> Vec<TabEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Opening and Activation
    // ─────────────────────────────────────────────────────────────────────────

    /// Activate the tab for `path`, opening a clean one if needed.
    ///
    /// Returns the edit state the tab is activated with: the remembered
    /// state for an existing tab, clean for a new one.
    pub fn open_or_activate(&mut self, path: impl Into<PathBuf>) -> DirtyState {
        let path = path.into();

        if self.ids.contains(&path) {
            info!("File already open, switching to tab {}", path.display());
            return self.activate(&path).unwrap_or_default();
        }

        self.ids.insert(path.clone());
        self.tabs.push(Tab::new(path.clone()));
        self.pending_events.push(TabEvent::Opened(path.clone()));
        info!("Opened tab: {}", path.display());

        self.activate(&path).unwrap_or_default()
    }

    /// Make `id` active because the user clicked its tab.
    ///
    /// Returns the tab's last known edit state, or `None` if no such tab.
    pub fn activate_by_click(&mut self, id: &Path) -> Option<DirtyState> {
        let state = self.activate(id);
        if state.is_none() {
            warn!("Cannot activate unknown tab: {}", id.display());
        }
        state
    }

    fn activate(&mut self, id: &Path) -> Option<DirtyState> {
        let state = self.get(id)?.state;
        self.active = Some(id.to_path_buf());
        self.pending_events.push(TabEvent::Activated {
            id: id.to_path_buf(),
            state,
        });
        debug!("Switched to tab {}", id.display());
        Some(state)
    }

    /// Replace the edit state of exactly one tab.
    ///
    /// A `None` id is a no-op. Returns `true` if a tab was updated.
    pub fn update_state(&mut self, tab_id: Option<&Path>, state: DirtyState) -> bool {
        let Some(id) = tab_id else {
            return false;
        };
        let Some(index) = self.position(id) else {
            debug!("Ignoring state update for unknown tab {}", id.display());
            return false;
        };
        self.tabs[index].state = state;
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Closing
    // ─────────────────────────────────────────────────────────────────────────

    /// Remove a tab without any confirmation.
    ///
    /// If it was active, the tab to its left becomes active (or the new
    /// first tab when closing index 0), or nothing when none remain.
    pub fn close_internal(&mut self, id: &Path) -> Option<Tab> {
        let index = self.position(id)?;
        let tab = self.tabs.remove(index);
        self.ids.remove(&tab.id);
        self.pending_events.push(TabEvent::Closed(tab.id.clone()));

        if self.is_active(id) {
            match self.tabs.get(index.saturating_sub(1)).map(|t| t.id.clone()) {
                Some(next) => {
                    self.activate(&next);
                }
                None => {
                    self.active = None;
                    self.pending_events.push(TabEvent::Deactivated);
                }
            }
        }

        debug!(
            "Closed tab {}, active is now {:?}",
            tab.id.display(),
            self.active
        );
        Some(tab)
    }

    /// Close every tab at or below `root`, returning the closed tabs.
    pub fn close_under(&mut self, root: &Path) -> Vec<Tab> {
        let doomed: Vec<PathBuf> = self
            .tabs
            .iter()
            .filter(|t| t.id.starts_with(root))
            .map(|t| t.id.clone())
            .collect();
        doomed
            .iter()
            .filter_map(|id| self.close_internal(id))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity Changes
    // ─────────────────────────────────────────────────────────────────────────

    /// Move the active tab's identity to `new_path` in place.
    ///
    /// Used for sibling navigation: the tab keeps its position and edit
    /// state. If `new_path` is already open in another tab, that tab is
    /// activated instead. Returns `false` when there is no active tab.
    pub fn retarget_active_tab_path(&mut self, new_path: impl Into<PathBuf>) -> bool {
        let new_path = new_path.into();
        let Some(current) = self.active.clone() else {
            return false;
        };
        if current == new_path {
            return true;
        }
        if self.ids.contains(&new_path) {
            self.activate(&new_path);
            return true;
        }
        self.rename_tab(&current, new_path)
    }

    /// Rename a tab's identity, keeping its position and edit state.
    ///
    /// Returns `false` if `old` is not open or `new` already is.
    pub fn rename_tab(&mut self, old: &Path, new: impl Into<PathBuf>) -> bool {
        let new = new.into();
        if self.ids.contains(&new) {
            warn!("Cannot rename tab to already open {}", new.display());
            return false;
        }
        let Some(index) = self.position(old) else {
            return false;
        };

        self.ids.remove(old);
        self.ids.insert(new.clone());
        self.tabs[index].id = new.clone();
        if self.is_active(old) {
            self.active = Some(new.clone());
        }
        self.pending_events.push(TabEvent::Retargeted {
            from: old.to_path_buf(),
            to: new.clone(),
        });
        debug!("Retargeted tab {} -> {}", old.display(), new.display());
        true
    }

    /// Re-point every tab at or below `old_root` to the same place under `new_root`.
    pub fn rebase_tabs(&mut self, old_root: &Path, new_root: &Path) -> usize {
        let moved: Vec<(PathBuf, PathBuf)> = self
            .tabs
            .iter()
            .filter_map(|t| {
                let suffix = t.id.strip_prefix(old_root).ok()?;
                let target = if suffix.as_os_str().is_empty() {
                    new_root.to_path_buf()
                } else {
                    new_root.join(suffix)
                };
                Some((t.id.clone(), target))
            })
            .collect();
        moved
            .into_iter()
            .filter(|(from, to)| self.rename_tab(from, to.clone()))
            .count()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Capture the whole registry.
    pub fn snapshot(&self) -> TabRegistrySnapshot {
        TabRegistrySnapshot {
            tabs: self.tabs.clone(),
            active_tab_id: self.active.clone(),
            tab_states: self
                .tabs
                .iter()
                .map(|t| (t.id.clone(), t.state))
                .collect(),
        }
    }

    /// Replace the whole registry from a snapshot.
    ///
    /// Duplicate ids keep the first occurrence. An active id that names no
    /// tab falls back to the first tab. Queued events are replaced by a
    /// single `Restored` event.
    pub fn restore(&mut self, snapshot: &TabRegistrySnapshot) {
        let mut ids = HashSet::with_capacity(snapshot.tabs.len());
        let mut tabs = Vec::with_capacity(snapshot.tabs.len());
        for tab in &snapshot.tabs {
            if !ids.insert(tab.id.clone()) {
                warn!("Dropping duplicate tab {}", tab.id.display());
                continue;
            }
            let mut tab = tab.clone();
            if let Some(state) = snapshot.tab_states.get(&tab.id) {
                tab.state = *state;
            }
            tabs.push(tab);
        }

        let active = snapshot
            .active_tab_id
            .clone()
            .filter(|id| ids.contains(id))
            .or_else(|| tabs.first().map(|t| t.id.clone()));

        self.tabs = tabs;
        self.ids = ids;
        self.active = active.clone();
        self.pending_events.clear();
        self.pending_events.push(TabEvent::Restored { active });
        debug!("Restored {} tab(s)", self.tabs.len());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
