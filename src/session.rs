//! Application session for the document core
//!
//! `Session` owns one instance of every service (tab registry, close
//! controller, undo log, autosave manager and snapshot store) and routes UI
//! commands through them. It is created at startup and torn down with
//! `shutdown`. User-facing messages are queued as `Notice`s.
//!
//! # Example
//!
//! ```ignore
//! let storage = Arc::new(LocalStorage::new());
//! let mut session = Session::from_config(storage, Box::new(NullExplorer));
//! session.open("/home/me/notes/todo.md");
//! ```

use crate::autosave::AutosaveManager;
use crate::collaborators::{ContentViewer, Explorer};
use crate::config::{load_config, SessionSettings};
use crate::error::{Error, Result};
use crate::storage::{renamed_path, Storage};
use crate::tabs::{
    display_name, CloseController, CloseOutcome, DirtyState, PendingClose, Tab, TabEvent,
    TabRegistry,
};
use crate::undo::{Reversal, UndoAction, UndoLog};
use crate::workspaces::{
    get_sessions_file_path, load_sessions_from, save_sessions_to, NavigationState,
    PersistedSessions, SnapshotStore, SwitchOutcome, WorkspaceMode,
};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Notices and Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A message for the toast area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// A failed explicit save.
#[derive(Debug)]
pub struct SaveFailure {
    pub path: PathBuf,
    pub error: Error,
    /// The last autosaved text, if a copy exists
    pub recovery: Option<String>,
}

/// Result of an explicit save.
#[derive(Debug)]
pub enum SaveOutcome {
    /// The document is on disk and its autosave copy is gone
    Saved(PathBuf),
    Failed(SaveFailure),
    /// There is no active document to save
    NoActiveTab,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }
}

/// Result of saving and closing the pending tab.
#[derive(Debug)]
pub enum CloseSaveOutcome {
    Closed(Tab),
    /// Nothing was pending, or the pending tab is gone
    NothingPending,
    /// The save failed and the close is still pending
    Failed(SaveFailure),
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// One application session of the document core.
pub struct Session {
    storage: Arc<dyn Storage>,
    settings: SessionSettings,
    registry: TabRegistry,
    close: CloseController,
    undo: UndoLog,
    autosave: AutosaveManager,
    snapshots: SnapshotStore,
    nav: NavigationState,
    mode: WorkspaceMode,
    explorer: Box<dyn Explorer>,
    notices: Vec<Notice>,
    /// Where sessions are persisted; `None` keeps them in memory only
    sessions_path: Option<PathBuf>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("nav", &self.nav)
            .field("registry", &self.registry)
            .field("pending_close", &self.close.pending())
            .field("autosave", &self.autosave)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session browsing the configured home directory.
    pub fn new(
        storage: Arc<dyn Storage>,
        settings: SessionSettings,
        explorer: Box<dyn Explorer>,
    ) -> Self {
        let home = settings.resolved_home_path();
        let autosave = AutosaveManager::from_settings(Arc::clone(&storage), &settings);
        let snapshots = SnapshotStore::new(Arc::clone(&storage), home.clone());
        let mut undo = UndoLog::new();
        undo.set_active_directory(home.clone());

        info!("Session started at {}", home.display());
        Self {
            storage,
            settings,
            registry: TabRegistry::new(),
            close: CloseController::new(),
            undo,
            autosave,
            snapshots,
            nav: NavigationState::new(home),
            mode: WorkspaceMode::default(),
            explorer,
            notices: Vec::new(),
            sessions_path: None,
        }
    }

    /// Create a session from the saved configuration and sessions.
    pub fn from_config(storage: Arc<dyn Storage>, explorer: Box<dyn Explorer>) -> Self {
        let session = Self::new(storage, load_config(), explorer);
        match get_sessions_file_path() {
            Ok(path) => session.with_sessions_file(path),
            Err(e) => {
                warn!("Sessions will not be persisted: {}", e);
                session
            }
        }
    }

    /// Persist sessions to `path`, restoring what is already there.
    pub fn with_sessions_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if self.settings.persist_sessions {
            if let Some(persisted) = load_sessions_from(&path) {
                self.apply_persisted(persisted);
            }
        }
        self.sessions_path = Some(path);
        self
    }

    fn apply_persisted(&mut self, persisted: PersistedSessions) {
        self.snapshots
            .load(persisted.slots, persisted.entry_paths);
        self.mode = persisted.active_mode;

        if let Some(slot) = self.snapshots.slot(self.mode).cloned() {
            self.registry.restore(&slot.registry);
            if let Some(path) = slot.current_path {
                self.undo.set_active_directory(path.clone());
                self.nav.current_path = Some(path);
            }
            self.nav.selected_file = slot.selected_file_path;
        }
        info!(
            "Restored {} mode session with {} tab(s)",
            self.mode.label(),
            self.registry.tab_count()
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub fn autosave(&self) -> &AutosaveManager {
        &self.autosave
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.nav
    }

    pub fn mode(&self) -> WorkspaceMode {
        self.mode
    }

    pub fn pending_close(&self) -> Option<&PendingClose> {
        self.close.pending()
    }

    /// Drain tab events for the content viewer.
    pub fn take_tab_events(&mut self) -> Vec<TabEvent> {
        self.registry.take_events()
    }

    /// Drain queued user-facing messages.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    fn notify_error(&mut self, context: &str, error: &Error) {
        warn!("{}: {}", context, error);
        self.notify(NoticeLevel::Error, format!("{}: {}", context, error));
    }

    /// Passive capture of the live session into the current mode's slot.
    fn capture(&mut self) {
        self.snapshots
            .capture(self.mode, &self.registry, &self.nav);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tabs
    // ─────────────────────────────────────────────────────────────────────────

    /// Open `path` in a tab, or switch to its existing tab.
    pub fn open(&mut self, path: impl Into<PathBuf>) -> DirtyState {
        let state = self.registry.open_or_activate(path);
        self.capture();
        state
    }

    /// The user clicked a tab.
    pub fn activate(&mut self, id: &Path) -> Option<DirtyState> {
        let state = self.registry.activate_by_click(id);
        self.capture();
        state
    }

    pub fn update_state(&mut self, id: Option<&Path>, state: DirtyState) -> bool {
        let updated = self.registry.update_state(id, state);
        if updated {
            self.capture();
        }
        updated
    }

    /// Copy the viewer's edit flags onto the active tab.
    pub fn sync_active_state(&mut self, viewer: &dyn ContentViewer) -> bool {
        let Some(active) = self.registry.active_id().map(Path::to_path_buf) else {
            return false;
        };
        let state = DirtyState::new(viewer.is_editing(), viewer.has_changes());
        self.update_state(Some(&active), state)
    }

    /// Move the active tab to a neighbouring file instead of opening a new tab.
    ///
    /// A retargeted tab takes its autosave record along.
    pub async fn navigate_to_sibling(&mut self, path: impl Into<PathBuf>) -> DirtyState {
        let path = path.into();
        let previous = self.registry.active_id().map(Path::to_path_buf);
        if !self.registry.retarget_active_tab_path(path.clone()) {
            self.registry.open_or_activate(path.clone());
        }
        if let Some(previous) = previous {
            let renamed = previous != path && !self.registry.contains(&previous);
            if renamed {
                self.move_autosave(&previous, &path).await;
            }
        }
        self.nav.selected_file = Some(path);
        self.capture();
        self.registry
            .active_tab()
            .map(|t| t.state)
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Closing
    // ─────────────────────────────────────────────────────────────────────────

    pub fn request_close(&mut self, id: &Path) -> CloseOutcome {
        let outcome = self.close.request_close(&mut self.registry, id);
        if let CloseOutcome::Closed(tab) = &outcome {
            self.autosave.stop_autosave(&tab.id);
            self.capture();
        }
        outcome
    }

    /// Save the pending tab and close it.
    ///
    /// On failure the close stays pending and recovery is offered the same
    /// way as for `save_active`.
    pub async fn save_and_close(&mut self, viewer: &mut dyn ContentViewer) -> CloseSaveOutcome {
        let pending = self.close.pending().map(|p| p.tab_id.clone());
        match self
            .close
            .save_and_close(&mut self.registry, viewer, &mut self.autosave)
            .await
        {
            Ok(Some(tab)) => {
                self.autosave.stop_autosave(&tab.id);
                self.notify(NoticeLevel::Success, format!("Saved {}", tab.display_name()));
                self.capture();
                CloseSaveOutcome::Closed(tab)
            }
            Ok(None) => {
                self.capture();
                CloseSaveOutcome::NothingPending
            }
            Err(error) => {
                let path = pending.unwrap_or_default();
                CloseSaveOutcome::Failed(self.save_failed(path, error).await)
            }
        }
    }

    /// Close the pending tab, throwing its edits and autosave copy away.
    pub async fn discard_and_close(&mut self) -> Option<Tab> {
        let closed = self.close.discard_and_close(&mut self.registry)?;
        if let Err(e) = self.autosave.clear_autosave(&closed.id).await {
            warn!("Could not remove autosave for {}: {}", closed.id.display(), e);
        }
        self.capture();
        Some(closed)
    }

    pub fn cancel_close(&mut self) -> Option<PendingClose> {
        self.close.cancel()
    }

    /// Drop a pending close whose tab has disappeared.
    fn reconcile_pending_close(&mut self) {
        let gone = self
            .close
            .pending()
            .is_some_and(|p| !self.registry.contains(&p.tab_id));
        if gone {
            self.close.cancel();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Editing and Saving
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter edit mode for `path` and start mirroring its content.
    pub async fn begin_editing(&mut self, path: &Path, content: &str) {
        self.autosave.start_autosave(path, content).await;
        let has_changes = self
            .registry
            .get(path)
            .is_some_and(|t| t.state.has_changes);
        self.update_state(Some(path), DirtyState::new(true, has_changes));
    }

    /// The user changed the text of `path`.
    pub async fn edit_content(&mut self, path: &Path, content: &str) {
        if !self.autosave.update_content(path, content) {
            // Tracking ends on every successful save.
            self.autosave.start_autosave(path, content).await;
        }
        self.update_state(Some(path), DirtyState::new(true, true));
    }

    /// Leave edit mode, keeping any unsaved-changes flag.
    pub fn end_editing(&mut self, path: &Path) {
        self.autosave.stop_autosave(path);
        let has_changes = self
            .registry
            .get(path)
            .is_some_and(|t| t.state.has_changes);
        self.update_state(Some(path), DirtyState::new(false, has_changes));
    }

    /// Save the active document through the viewer.
    pub async fn save_active(&mut self, viewer: &mut dyn ContentViewer) -> SaveOutcome {
        let Some(path) = self.registry.active_id().map(Path::to_path_buf) else {
            return SaveOutcome::NoActiveTab;
        };

        match self.autosave.save_explicit(viewer, &path).await {
            Ok(()) => {
                let state = DirtyState::new(viewer.is_editing(), viewer.has_changes());
                self.update_state(Some(&path), state);
                self.notify(NoticeLevel::Success, format!("Saved {}", display_name(&path)));
                SaveOutcome::Saved(path)
            }
            Err(error) => SaveOutcome::Failed(self.save_failed(path, error).await),
        }
    }

    /// Surface a failed explicit save and look up its recovery copy.
    async fn save_failed(&mut self, path: PathBuf, error: Error) -> SaveFailure {
        self.notify_error("Save failed", &error);
        let recovery = self.autosave.get_recovery_content(&path).await;
        if recovery.is_some() {
            self.notify(
                NoticeLevel::Info,
                "An autosaved copy is available for recovery",
            );
        }
        SaveFailure {
            path,
            error,
            recovery,
        }
    }

    /// Load the autosaved copy of the active document and save again.
    pub async fn accept_recovery(&mut self, viewer: &mut dyn ContentViewer) -> SaveOutcome {
        let Some(path) = self.registry.active_id().map(Path::to_path_buf) else {
            return SaveOutcome::NoActiveTab;
        };
        let Some(content) = self.autosave.get_recovery_content(&path).await else {
            let error = Error::RecoveryUnavailable { path: path.clone() };
            self.notify_error("Recovery failed", &error);
            return SaveOutcome::Failed(SaveFailure {
                path,
                error,
                recovery: None,
            });
        };

        info!("Recovering {} from autosave", path.display());
        viewer.load_recovered(content);
        self.save_active(viewer).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // File Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn is_directory(&self, path: &Path) -> bool {
        self.storage.list_directory(path).await.is_ok()
    }

    fn refresh_parent(&mut self, path: &Path) {
        if let Some(parent) = path.parent() {
            self.explorer.refresh_folder(parent);
        }
    }

    /// Record a completed mutation and refresh the explorer.
    fn record(&mut self, action: UndoAction, refresh: &Path) {
        self.undo.push(action);
        self.refresh_parent(refresh);
    }

    fn surface<T>(&mut self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.notify_error(context, e);
        }
        result
    }

    pub async fn create_file(&mut self, path: &Path, content: &str) -> Result<()> {
        let result = self.storage.create_file(path, content).await;
        self.surface("Could not create file", result)?;
        self.record(UndoAction::create(path, false), path);
        info!("Created file: {}", path.display());
        Ok(())
    }

    pub async fn create_directory(&mut self, path: &Path) -> Result<()> {
        let result = self.storage.create_directory(path).await;
        self.surface("Could not create folder", result)?;
        self.record(UndoAction::create(path, true), path);
        info!("Created folder: {}", path.display());
        Ok(())
    }

    /// Delete a file or folder, closing every tab under it.
    ///
    /// A file's content is read first so the delete can be undone. A file
    /// that cannot be read as text is still deleted.
    pub async fn delete(&mut self, path: &Path) -> Result<()> {
        let action = if self.is_directory(path).await {
            let result = self.storage.delete_directory(path).await;
            self.surface("Could not delete folder", result)?;
            UndoAction::delete_directory(path)
        } else {
            let content = match self.storage.read_file(path).await {
                Ok(content) => Some(content),
                Err(e) => {
                    warn!("Content of {} not captured for undo: {}", path.display(), e);
                    None
                }
            };
            let result = self.storage.delete_file(path).await;
            self.surface("Could not delete file", result)?;
            UndoAction::delete_file(path, content)
        };

        self.close_tabs_under(path).await;
        self.record(action, path);
        info!("Deleted {}", path.display());
        Ok(())
    }

    async fn close_tabs_under(&mut self, path: &Path) {
        for tab in self.registry.close_under(path) {
            if let Err(e) = self.autosave.clear_autosave(&tab.id).await {
                debug!("Autosave for {} not cleared: {}", tab.id.display(), e);
            }
        }
        self.reconcile_pending_close();
        self.capture();
    }

    /// Rename a file or folder in place; open tabs follow it.
    pub async fn rename(&mut self, path: &Path, new_name: &str) -> Result<PathBuf> {
        let is_directory = self.is_directory(path).await;
        let result = self.storage.rename_file(path, new_name).await;
        let target = self.surface("Could not rename", result)?;

        self.relocate_tabs(path, &target).await;
        self.record(UndoAction::rename(&target, path, is_directory), &target);
        info!("Renamed {} -> {}", path.display(), target.display());
        Ok(target)
    }

    /// Move a file or folder to `dst`; open tabs follow it.
    pub async fn move_to(&mut self, src: &Path, dst: &Path) -> Result<()> {
        let is_directory = self.is_directory(src).await;
        let result = self.storage.move_file(src, dst).await;
        self.surface("Could not move", result)?;

        self.relocate_tabs(src, dst).await;
        self.refresh_parent(src);
        self.record(UndoAction::moved(dst, src, is_directory), dst);
        info!("Moved {} -> {}", src.display(), dst.display());
        Ok(())
    }

    pub async fn copy(&mut self, src: &Path, dst: &Path) -> Result<()> {
        let is_directory = self.is_directory(src).await;
        let result = self.storage.copy_file(src, dst).await;
        self.surface("Could not copy", result)?;

        self.record(UndoAction::copy(dst, is_directory), dst);
        info!("Copied {} -> {}", src.display(), dst.display());
        Ok(())
    }

    /// Re-point tabs and autosave records from `old` to `new`.
    async fn relocate_tabs(&mut self, old: &Path, new: &Path) {
        if self.registry.rebase_tabs(old, new) == 0 {
            return;
        }
        let tracked: Vec<PathBuf> = self
            .autosave
            .tracked_paths()
            .into_iter()
            .filter(|p| p.starts_with(old))
            .collect();
        for from in tracked {
            let Ok(suffix) = from.strip_prefix(old) else {
                continue;
            };
            let to = if suffix.as_os_str().is_empty() {
                new.to_path_buf()
            } else {
                new.join(suffix)
            };
            self.move_autosave(&from, &to).await;
        }
        self.capture();
    }

    /// Re-key the autosave record of `from` to `to`, dropping the old side-channel file.
    async fn move_autosave(&mut self, from: &Path, to: &Path) {
        let Some(record) = self.autosave.stop_autosave(from) else {
            return;
        };
        if let Err(e) = self.autosave.clear_autosave(from).await {
            debug!("Stale autosave for {} kept: {}", from.display(), e);
        }
        self.autosave.start_autosave(to, &record.content).await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Undo
    // ─────────────────────────────────────────────────────────────────────────

    /// Reverse the newest file operation recorded in the current directory.
    ///
    /// A failed reversal is reported and dropped; it is not put back.
    pub async fn undo(&mut self) -> Result<Option<UndoAction>> {
        let Some(action) = self.undo.pop() else {
            self.notify(NoticeLevel::Info, "Nothing to undo");
            return Ok(None);
        };

        let reversal = match action.reversal() {
            Ok(reversal) => reversal,
            Err(e) => {
                self.notify_error("Undo failed", &e);
                return Err(e);
            }
        };
        if let Err(e) = reversal.apply(self.storage.as_ref()).await {
            self.notify_error("Undo failed", &e);
            return Err(e);
        }

        match &reversal {
            Reversal::DeleteFile(path) | Reversal::DeleteDirectory(path) => {
                self.close_tabs_under(path).await;
            }
            Reversal::Rename { path, new_name } => {
                let target = renamed_path(path, new_name);
                self.relocate_tabs(path, &target).await;
            }
            Reversal::Move { src, dst } => {
                self.relocate_tabs(src, dst).await;
                self.refresh_parent(src);
            }
            Reversal::CreateFile { .. } | Reversal::CreateDirectory(_) => {}
        }
        if let Some(folder) = reversal.affected_folder() {
            self.explorer.refresh_folder(folder);
        }

        info!("Undid {:?} of {}", action.kind, action.path.display());
        self.notify(
            NoticeLevel::Success,
            format!("Undid {:?} of {}", action.kind, action.path.display()),
        );
        Ok(Some(action))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Navigation and Workspace Modes
    // ─────────────────────────────────────────────────────────────────────────

    /// Browse `path`, switching the visible undo history with it.
    pub async fn change_directory(&mut self, path: &Path) -> Result<()> {
        let result = self.storage.list_directory(path).await.map(|_| ());
        self.surface("Could not open folder", result)?;

        self.nav.change_directory(path);
        self.undo.set_active_directory(path);
        self.explorer.refresh();
        self.capture();
        debug!("Browsing {}", path.display());
        Ok(())
    }

    pub fn select_file(&mut self, path: Option<PathBuf>) {
        self.nav.selected_file = path;
        self.capture();
    }

    /// Swap the live session for `to`'s.
    pub async fn switch_mode(
        &mut self,
        to: WorkspaceMode,
        fallback: Option<&Path>,
    ) -> Result<SwitchOutcome> {
        let result = self
            .snapshots
            .switch_mode(
                self.mode,
                to,
                &mut self.registry,
                &mut self.nav,
                self.explorer.as_mut(),
                fallback,
            )
            .await;
        let outcome = self.surface("Could not switch workspace", result)?;

        if let SwitchOutcome::Switched { current_path } = &outcome {
            self.mode = to;
            self.undo.set_active_directory(current_path.clone());
            self.reconcile_pending_close();
            self.capture();
        }
        Ok(outcome)
    }

    /// Switch to the other workspace mode.
    pub async fn toggle_mode(&mut self, fallback: Option<&Path>) -> Result<SwitchOutcome> {
        self.switch_mode(self.mode.other(), fallback).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence and Shutdown
    // ─────────────────────────────────────────────────────────────────────────

    /// Write every mode's session to the sessions file.
    pub fn persist(&mut self) -> Result<()> {
        let Some(path) = self.sessions_path.clone() else {
            return Ok(());
        };
        if !self.settings.persist_sessions {
            return Ok(());
        }

        self.capture();
        let persisted = PersistedSessions {
            active_mode: self.mode,
            slots: self.snapshots.slots().clone(),
            entry_paths: self.snapshots.entry_paths().clone(),
        };
        save_sessions_to(&path, &persisted)
    }

    /// Flush autosaves, stop their timers and persist sessions.
    ///
    /// Side-channel files stay on disk so edits can be recovered next time.
    pub async fn shutdown(&mut self) {
        self.autosave.flush_all().await;
        self.autosave.shutdown();
        if let Err(e) = self.persist() {
            warn!("Failed to save sessions during shutdown: {}", e);
        }
        info!("Session shutdown complete");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NullExplorer;
    use crate::storage::{DetachedStorage, LocalStorage, MemoryStorage, StorageOp};
    use crate::testing::{init_logging, ExplorerCall, MockViewer, RecordingExplorer};
    use tempfile::TempDir;

    const AUTOSAVE_DIR: &str = "/data/autosave";

    struct Fixture {
        storage: Arc<MemoryStorage>,
        explorer: RecordingExplorer,
        session: Session,
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            autosave_dir: Some(PathBuf::from(AUTOSAVE_DIR)),
            home_path: Some(PathBuf::from("/root")),
            ..Default::default()
        }
    }

    fn fixture() -> Fixture {
        init_logging();
        let storage = Arc::new(
            MemoryStorage::new()
                .with_file("/root/todo.md", "- [ ] ship")
                .with_file("/root/a.md", "on disk")
                .with_file("/root/draft.txt", "Hello")
                .with_file("/root/docs/guide.md", "guide")
                .with_directory("/alt")
                .with_directory(AUTOSAVE_DIR),
        );
        let explorer = RecordingExplorer::default();
        let session = Session::new(storage.clone(), settings(), Box::new(explorer.clone()));
        Fixture {
            storage,
            explorer,
            session,
        }
    }

    fn p(path: &str) -> &Path {
        Path::new(path)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tabs and Closing
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_clean_close_empties_registry() {
        let mut fx = fixture();
        fx.session.open("/root/todo.md");
        let outcome = fx.session.request_close(p("/root/todo.md"));
        assert!(matches!(outcome, CloseOutcome::Closed(_)));
        assert!(fx.session.registry().is_empty());
    }

    #[tokio::test]
    async fn test_dirty_close_then_discard() {
        let mut fx = fixture();
        fx.session.open("/root/todo.md");
        fx.session
            .update_state(Some(p("/root/todo.md")), DirtyState::new(false, true));

        let outcome = fx.session.request_close(p("/root/todo.md"));
        assert_eq!(
            outcome,
            CloseOutcome::AwaitingConfirmation(PendingClose {
                tab_id: PathBuf::from("/root/todo.md"),
                file_name: "todo.md".to_string(),
            })
        );

        let closed = fx.session.discard_and_close().await.unwrap();
        assert_eq!(closed.id, p("/root/todo.md"));
        assert!(fx.session.registry().is_empty());
        assert!(fx.session.pending_close().is_none());
    }

    #[tokio::test]
    async fn test_sibling_navigation_reuses_tab() {
        let mut fx = fixture();
        fx.session.open("/root/a.md");
        fx.session
            .update_state(Some(p("/root/a.md")), DirtyState::new(true, false));

        let state = fx.session.navigate_to_sibling("/root/todo.md").await;
        assert_eq!(state, DirtyState::new(true, false));
        assert_eq!(fx.session.registry().tab_count(), 1);
        assert_eq!(fx.session.registry().active_id(), Some(p("/root/todo.md")));
        assert_eq!(
            fx.session.navigation().selected_file.as_deref(),
            Some(p("/root/todo.md"))
        );
    }

    #[tokio::test]
    async fn test_sibling_navigation_moves_autosave_record() {
        let mut fx = fixture();
        fx.session.open("/root/a.md");
        fx.session.begin_editing(p("/root/a.md"), "draft").await;

        fx.session.navigate_to_sibling("/root/todo.md").await;
        assert!(!fx.session.autosave().is_tracking(p("/root/a.md")));
        assert_eq!(
            fx.session.autosave().record(p("/root/todo.md")).unwrap().content,
            "draft"
        );

        fx.session.edit_content(p("/root/todo.md"), "draft 2").await;
        assert_eq!(
            fx.session.autosave().tracked_paths(),
            vec![PathBuf::from("/root/todo.md")]
        );
    }

    #[test]
    fn test_sync_active_state_from_viewer() {
        let mut fx = fixture();
        fx.session.open("/root/a.md");
        let viewer = MockViewer::new(fx.storage.clone(), "/root/a.md", "x");
        assert!(fx.session.sync_active_state(&viewer));
        assert!(fx.session.registry().active_tab().unwrap().state.is_dirty());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Saving and Recovery
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_failed_save_offers_recovery_and_retry_succeeds() {
        let mut fx = fixture();
        let path = p("/root/a.md");
        fx.session.open(path);
        fx.session.begin_editing(path, "draft v1").await;
        fx.session.edit_content(path, "draft v2").await;

        fx.storage.fail_on(path);
        let mut viewer = MockViewer::new(fx.storage.clone(), path, "draft v2");
        match fx.session.save_active(&mut viewer).await {
            SaveOutcome::Failed(failure) => {
                assert_eq!(failure.recovery.as_deref(), Some("draft v2"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        let notices = fx.session.take_notices();
        assert!(notices.iter().any(|n| n.level == NoticeLevel::Error));

        fx.storage.clear_failures();
        viewer.content = "something else".to_string();
        let outcome = fx.session.accept_recovery(&mut viewer).await;
        assert!(outcome.is_saved());
        assert_eq!(fx.storage.file_content(path).as_deref(), Some("draft v2"));
        assert!(fx.session.autosave().get_recovery_content(path).await.is_none());
        assert!(!fx.session.registry().get(path).unwrap().state.has_changes);
    }

    #[tokio::test]
    async fn test_failed_save_and_close_offers_recovery() {
        let mut fx = fixture();
        let path = p("/root/a.md");
        fx.session.open(path);
        fx.session.begin_editing(path, "draft v1").await;
        fx.session.edit_content(path, "draft v2").await;
        assert!(matches!(
            fx.session.request_close(path),
            CloseOutcome::AwaitingConfirmation(_)
        ));

        fx.storage.fail_on(path);
        let mut viewer = MockViewer::new(fx.storage.clone(), path, "draft v2");
        match fx.session.save_and_close(&mut viewer).await {
            CloseSaveOutcome::Failed(failure) => {
                assert_eq!(failure.path, path);
                assert_eq!(failure.recovery.as_deref(), Some("draft v2"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(fx.session.pending_close().is_some());
        let notices = fx.session.take_notices();
        assert!(notices.iter().any(|n| n.level == NoticeLevel::Error));
        assert!(notices
            .iter()
            .any(|n| n.message == "An autosaved copy is available for recovery"));

        fx.storage.clear_failures();
        assert!(matches!(
            fx.session.save_and_close(&mut viewer).await,
            CloseSaveOutcome::Closed(_)
        ));
        assert!(fx.session.registry().is_empty());
        assert!(fx.session.autosave().get_recovery_content(path).await.is_none());
    }

    #[tokio::test]
    async fn test_save_and_close_without_pending() {
        let mut fx = fixture();
        let mut viewer = MockViewer::new(fx.storage.clone(), "/root/a.md", "x");
        assert!(matches!(
            fx.session.save_and_close(&mut viewer).await,
            CloseSaveOutcome::NothingPending
        ));
    }

    #[tokio::test]
    async fn test_accept_recovery_without_copy() {
        let mut fx = fixture();
        fx.session.open("/root/a.md");
        let mut viewer = MockViewer::new(fx.storage.clone(), "/root/a.md", "x");
        match fx.session.accept_recovery(&mut viewer).await {
            SaveOutcome::Failed(failure) => {
                assert!(matches!(failure.error, Error::RecoveryUnavailable { .. }));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(viewer.saves, 0);
    }

    #[tokio::test]
    async fn test_editing_after_save_restarts_autosave() {
        let mut fx = fixture();
        let path = p("/root/a.md");
        fx.session.open(path);
        fx.session.begin_editing(path, "v1").await;
        let mut viewer = MockViewer::new(fx.storage.clone(), path, "v1");
        assert!(fx.session.save_active(&mut viewer).await.is_saved());
        assert!(!fx.session.autosave().is_tracking(path));

        fx.session.edit_content(path, "v2").await;
        assert!(fx.session.autosave().is_tracking(path));
        assert_eq!(
            fx.session.autosave().get_recovery_content(path).await.as_deref(),
            Some("v2")
        );
    }

    #[tokio::test]
    async fn test_save_without_tabs() {
        let mut fx = fixture();
        let mut viewer = MockViewer::new(fx.storage.clone(), "/root/a.md", "x");
        assert!(matches!(
            fx.session.save_active(&mut viewer).await,
            SaveOutcome::NoActiveTab
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // File Operations and Undo
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_delete_then_undo_restores_captured_content() {
        let mut fx = fixture();
        fx.session.open("/root/draft.txt");
        fx.session.delete(p("/root/draft.txt")).await.unwrap();
        assert!(!fx.storage.exists("/root/draft.txt"));
        assert!(fx.session.registry().is_empty());

        fx.storage.clear_operations();
        let undone = fx.session.undo().await.unwrap().unwrap();
        assert_eq!(undone.content.as_deref(), Some("Hello"));
        assert_eq!(
            fx.storage.operations(),
            vec![StorageOp::CreateFile {
                path: PathBuf::from("/root/draft.txt"),
                content: "Hello".to_string(),
            }]
        );
        assert!(fx
            .explorer
            .calls()
            .contains(&ExplorerCall::RefreshFolder(PathBuf::from("/root"))));
    }

    #[tokio::test]
    async fn test_delete_binary_file_on_disk() {
        init_logging();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pdf = temp_dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF\xff\xfe\x00\x80").unwrap();

        let settings = SessionSettings {
            autosave_dir: Some(temp_dir.path().join("autosave")),
            home_path: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let mut session = Session::new(Arc::new(LocalStorage::new()), settings, Box::new(NullExplorer));
        session.open(&pdf);

        session.delete(&pdf).await.unwrap();
        assert!(!pdf.exists());
        assert!(session.registry().is_empty());
        assert!(session.take_notices().is_empty());

        let action = session.undo_log().peek().unwrap();
        assert_eq!(action.path, pdf);
        assert_eq!(action.content, None);
    }

    #[tokio::test]
    async fn test_rename_moves_tab_and_undo_moves_it_back() {
        let mut fx = fixture();
        fx.session.open("/root/a.md");
        fx.session
            .update_state(Some(p("/root/a.md")), DirtyState::new(false, true));

        let target = fx.session.rename(p("/root/a.md"), "b.md").await.unwrap();
        assert_eq!(target, p("/root/b.md"));
        let tab = fx.session.registry().active_tab().unwrap();
        assert_eq!(tab.id, p("/root/b.md"));
        assert!(tab.state.has_changes);

        fx.session.undo().await.unwrap();
        assert_eq!(fx.storage.file_content("/root/a.md").as_deref(), Some("on disk"));
        assert_eq!(fx.session.registry().active_id(), Some(p("/root/a.md")));
    }

    #[tokio::test]
    async fn test_failed_undo_is_not_repushed() {
        let mut fx = fixture();
        fx.session
            .create_file(p("/root/new.md"), "")
            .await
            .unwrap();
        fx.storage.fail_on("/root/new.md");

        assert!(fx.session.undo().await.is_err());
        assert!(fx.session.undo_log().is_empty());
        assert!(fx
            .session
            .take_notices()
            .iter()
            .any(|n| n.message.starts_with("Undo failed")));
    }

    #[tokio::test]
    async fn test_move_directory_rebases_open_tabs() {
        let mut fx = fixture();
        fx.session.open("/root/docs/guide.md");
        fx.session.create_directory(p("/root/archive")).await.unwrap();

        fx.session
            .move_to(p("/root/docs"), p("/root/archive/docs"))
            .await
            .unwrap();
        assert_eq!(
            fx.session.registry().active_id(),
            Some(p("/root/archive/docs/guide.md"))
        );

        fx.session.undo().await.unwrap();
        assert!(fx.storage.exists("/root/docs/guide.md"));
        assert_eq!(fx.session.registry().active_id(), Some(p("/root/docs/guide.md")));
    }

    #[tokio::test]
    async fn test_copy_undo_deletes_copy() {
        let mut fx = fixture();
        fx.session
            .copy(p("/root/a.md"), p("/root/a copy.md"))
            .await
            .unwrap();
        assert!(fx.storage.exists("/root/a copy.md"));

        fx.session.undo().await.unwrap();
        assert!(!fx.storage.exists("/root/a copy.md"));
        assert!(fx.storage.exists("/root/a.md"));
    }

    #[tokio::test]
    async fn test_undo_history_follows_directory() {
        let mut fx = fixture();
        fx.session.create_file(p("/root/one.md"), "").await.unwrap();
        fx.session.change_directory(p("/root/docs")).await.unwrap();
        assert!(fx.session.undo_log().is_empty());
        assert!(fx.session.undo().await.unwrap().is_none());

        fx.session.change_directory(p("/root")).await.unwrap();
        assert_eq!(fx.session.undo_log().len(), 1);
    }

    #[tokio::test]
    async fn test_detached_storage_surfaces_notice() {
        let mut session = Session::new(Arc::new(DetachedStorage), settings(), Box::new(NullExplorer));
        let err = session.create_file(p("/root/a.md"), "").await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable));

        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(session.undo_log().is_empty());
    }

    #[tokio::test]
    async fn test_change_to_missing_directory_fails() {
        let mut fx = fixture();
        assert!(fx.session.change_directory(p("/nowhere")).await.is_err());
        assert_eq!(fx.session.navigation().current_path(), Some(p("/root")));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Workspace Modes and Persistence
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_mode_round_trip() {
        let mut fx = fixture();
        fx.session.open("/root/a.md");
        fx.session.open("/root/todo.md");
        fx.session.activate(p("/root/a.md"));
        let normal = fx.session.registry().snapshot();

        fx.session
            .switch_mode(WorkspaceMode::Alternate, Some(p("/alt")))
            .await
            .unwrap();
        assert_eq!(fx.session.mode(), WorkspaceMode::Alternate);
        assert!(fx.session.registry().is_empty());
        fx.session.open("/alt/c.md");

        fx.session.toggle_mode(None).await.unwrap();
        assert_eq!(fx.session.registry().snapshot(), normal);
        assert_eq!(fx.session.navigation().current_path(), Some(p("/root")));

        let alt = fx.session.snapshots().slot(WorkspaceMode::Alternate).unwrap();
        assert_eq!(alt.registry.tabs.len(), 1);
        assert_eq!(alt.registry.tabs[0].id, p("/alt/c.md"));
        assert!(fx.explorer.calls().contains(&ExplorerCall::Focus));
    }

    #[tokio::test]
    async fn test_sessions_survive_restart() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let sessions = temp_dir.path().join("sessions.json");

        let mut fx = fixture();
        fx.session = Session::new(fx.storage.clone(), settings(), Box::new(fx.explorer.clone()))
            .with_sessions_file(&sessions);
        fx.session.open("/root/a.md");
        fx.session.open("/root/todo.md");
        fx.session
            .update_state(Some(p("/root/todo.md")), DirtyState::new(true, true));
        fx.session.shutdown().await;

        let restored = Session::new(fx.storage.clone(), settings(), Box::new(NullExplorer))
            .with_sessions_file(&sessions);
        let ids: Vec<&Path> = restored
            .registry()
            .tabs()
            .iter()
            .map(|t| t.id.as_path())
            .collect();
        assert_eq!(ids, vec![p("/root/a.md"), p("/root/todo.md")]);
        assert_eq!(restored.registry().active_id(), Some(p("/root/todo.md")));
        assert!(restored.registry().has_dirty_tabs());
    }

    #[test]
    fn test_persistence_disabled() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let sessions = temp_dir.path().join("sessions.json");
        let storage = Arc::new(MemoryStorage::new().with_directory("/root"));
        let mut session = Session::new(
            storage,
            SessionSettings {
                persist_sessions: false,
                ..settings()
            },
            Box::new(NullExplorer),
        )
        .with_sessions_file(&sessions);
        session.open("/root/a.md");
        session.persist().unwrap();
        assert!(!sessions.exists());
    }
}
