//! Autosave and recovery for documents being edited
//!
//! While a document is in edit mode its latest text lives in an in-memory
//! record and is mirrored to a side-channel file on a fixed interval. The
//! side-channel copy survives a failed explicit save and a process restart;
//! it is deleted as soon as an explicit save succeeds.
//!
//! Each editing path gets its own timer. The UI normally edits one document
//! at a time, so in practice there is a single live timer.

mod naming;

pub use naming::{is_side_channel, path_hash, side_channel_name, AUTOSAVE_EXTENSION};

use crate::collaborators::ContentViewer;
use crate::config::SessionSettings;
use crate::error::Result;
use crate::storage::{DirEntry, Storage};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory copy of a document being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSaveRecord {
    /// Path of the document
    pub file_path: PathBuf,
    /// Latest edited text
    pub content: String,
    /// When the content last changed
    pub timestamp: SystemTime,
}

impl AutoSaveRecord {
    fn new(file_path: PathBuf, content: String) -> Self {
        Self {
            file_path,
            content,
            timestamp: SystemTime::now(),
        }
    }
}

/// Result of mirroring one record to its side-channel file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flush {
    Written,
    Failed,
    NoRecord,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared State (manager + timer tasks)
// ─────────────────────────────────────────────────────────────────────────────

struct Shared {
    storage: Arc<dyn Storage>,
    dir: PathBuf,
    max_files: usize,
    records: Mutex<HashMap<PathBuf, AutoSaveRecord>>,
    /// Serializes side-channel I/O so a clear can never be overtaken by a tick.
    io_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    fn records(&self) -> MutexGuard<'_, HashMap<PathBuf, AutoSaveRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_content(&self, path: &Path) -> Option<String> {
        self.records().get(path).map(|r| r.content.clone())
    }

    fn side_channel_path(&self, path: &Path) -> PathBuf {
        self.dir.join(side_channel_name(path))
    }

    /// Write the record for `path` if it still exists.
    async fn flush(&self, path: &Path) -> Flush {
        let _io = self.io_lock.lock().await;
        let Some(content) = self.record_content(path) else {
            return Flush::NoRecord;
        };
        if self.write_side_channel(path, &content).await {
            Flush::Written
        } else {
            Flush::Failed
        }
    }

    /// Caller must hold `io_lock`.
    async fn write_side_channel(&self, path: &Path, content: &str) -> bool {
        let target = self.side_channel_path(path);
        let mut result = self.storage.write_file(&target, content).await;
        if matches!(&result, Err(e) if e.is_not_found()) {
            // First write into a fresh data directory.
            self.create_dir().await;
            result = self.storage.write_file(&target, content).await;
        }
        match result {
            Ok(()) => {
                debug!("Autosaved {} -> {}", path.display(), target.display());
                self.prune().await;
                true
            }
            Err(e) => {
                warn!("Autosave failed for {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Create the side-channel directory and any missing ancestors.
    async fn create_dir(&self) {
        let mut missing = Vec::new();
        for ancestor in self.dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            if self.storage.list_directory(ancestor).await.is_ok() {
                break;
            }
            missing.push(ancestor);
        }
        for dir in missing.into_iter().rev() {
            match self.storage.create_directory(dir).await {
                Ok(()) => debug!("Created autosave directory {}", dir.display()),
                Err(e) => debug!("Could not create {}: {}", dir.display(), e),
            }
        }
    }

    /// Keep at most `max_files` side-channel files, dropping the oldest.
    ///
    /// Caller must hold `io_lock`.
    async fn prune(&self) {
        let entries = match self.storage.list_directory(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping autosave pruning: {}", e);
                return;
            }
        };
        let mut files: Vec<DirEntry> = entries
            .into_iter()
            .filter(|e| !e.is_directory && is_side_channel(&e.path))
            .collect();
        if files.len() <= self.max_files {
            return;
        }

        // Entries without a modification time sort first, by name.
        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        let excess = files.len() - self.max_files;
        for entry in files.into_iter().take(excess) {
            match self.storage.delete_file(&entry.path).await {
                Ok(()) => debug!("Pruned old autosave {}", entry.path.display()),
                Err(e) => warn!("Failed to prune {}: {}", entry.path.display(), e),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Autosave Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Owns autosave records, their timers and the side-channel directory.
///
/// Timers run on the ambient tokio runtime; `start_autosave` must be called
/// from within one.
pub struct AutosaveManager {
    shared: Arc<Shared>,
    interval: Duration,
    enabled: bool,
    timers: HashMap<PathBuf, JoinHandle<()>>,
}

impl std::fmt::Debug for AutosaveManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutosaveManager")
            .field("dir", &self.shared.dir)
            .field("interval", &self.interval)
            .field("enabled", &self.enabled)
            .field("timers", &self.timers.len())
            .finish()
    }
}

impl AutosaveManager {
    /// Create a manager writing side-channel files into `dir`.
    pub fn new(
        storage: Arc<dyn Storage>,
        dir: impl Into<PathBuf>,
        interval: Duration,
        max_files: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                storage,
                dir: dir.into(),
                max_files: max_files.max(1),
                records: Mutex::new(HashMap::new()),
                io_lock: tokio::sync::Mutex::new(()),
            }),
            interval,
            enabled: true,
            timers: HashMap::new(),
        }
    }

    /// Create a manager configured from the session settings.
    pub fn from_settings(storage: Arc<dyn Storage>, settings: &SessionSettings) -> Self {
        let mut manager = Self::new(
            storage,
            settings.resolved_autosave_dir(),
            settings.autosave_interval(),
            settings.autosave_max_files,
        );
        manager.enabled = settings.autosave_enabled;
        manager
    }

    /// Directory holding the side-channel files.
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Side-channel file for a document path.
    pub fn side_channel_path(&self, path: &Path) -> PathBuf {
        self.shared.side_channel_path(path)
    }

    /// Whether a record exists for `path`.
    pub fn is_tracking(&self, path: &Path) -> bool {
        self.shared.records().contains_key(path)
    }

    /// Copy of the in-memory record for `path`.
    pub fn record(&self, path: &Path) -> Option<AutoSaveRecord> {
        self.shared.records().get(path).cloned()
    }

    /// Paths with a live record.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.shared.records().keys().cloned().collect();
        paths.sort();
        paths
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Editing Session Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Begin mirroring `path`.
    ///
    /// Replaces any previous timer for the path, writes `initial_content`
    /// immediately, then re-writes the latest content every interval.
    pub async fn start_autosave(&mut self, path: &Path, initial_content: &str) {
        if !self.enabled {
            debug!("Autosave disabled, not tracking {}", path.display());
            return;
        }
        if let Some(timer) = self.timers.remove(path) {
            timer.abort();
        }

        self.shared.records().insert(
            path.to_path_buf(),
            AutoSaveRecord::new(path.to_path_buf(), initial_content.to_string()),
        );
        self.shared.flush(path).await;

        let timer = self.spawn_timer(path.to_path_buf());
        self.timers.insert(path.to_path_buf(), timer);
        info!("Autosave started for {}", path.display());
    }

    fn spawn_timer(&self, path: PathBuf) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if shared.flush(&path).await == Flush::NoRecord {
                    debug!("Autosave timer for {} found no record", path.display());
                    break;
                }
            }
        })
    }

    /// Replace the in-memory content for `path`; no I/O happens here.
    ///
    /// Returns `false` if `path` is not being tracked.
    pub fn update_content(&self, path: &Path, content: &str) -> bool {
        match self.shared.records().get_mut(path) {
            Some(record) => {
                record.content = content.to_string();
                record.timestamp = SystemTime::now();
                true
            }
            None => false,
        }
    }

    /// Stop tracking `path`, leaving its side-channel file on disk.
    pub fn stop_autosave(&mut self, path: &Path) -> Option<AutoSaveRecord> {
        if let Some(timer) = self.timers.remove(path) {
            timer.abort();
        }
        let record = self.shared.records().remove(path);
        if record.is_some() {
            debug!("Autosave stopped for {}", path.display());
        }
        record
    }

    /// Forget `path` entirely after a successful explicit save.
    ///
    /// Deleting a side-channel file that does not exist is not an error.
    pub async fn clear_autosave(&mut self, path: &Path) -> Result<()> {
        self.stop_autosave(path);

        // Waits out any tick that read the record before it was removed.
        let _io = self.shared.io_lock.lock().await;
        let target = self.side_channel_path(path);
        match self.shared.storage.delete_file(&target).await {
            Ok(()) => {
                debug!("Cleared autosave for {}", path.display());
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Write the current record for `path` right now.
    ///
    /// Returns `true` if a side-channel file was written.
    pub async fn flush(&self, path: &Path) -> bool {
        self.shared.flush(path).await == Flush::Written
    }

    /// Write every tracked record right now.
    pub async fn flush_all(&self) {
        for path in self.tracked_paths() {
            self.shared.flush(&path).await;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recovery
    // ─────────────────────────────────────────────────────────────────────────

    /// Read the side-channel copy of `path`.
    ///
    /// Independent of in-memory state, so it works after a restart.
    /// Returns `None` if the file is absent or unreadable.
    pub async fn get_recovery_content(&self, path: &Path) -> Option<String> {
        let _io = self.shared.io_lock.lock().await;
        let target = self.side_channel_path(path);
        match self.shared.storage.read_file(&target).await {
            Ok(content) => Some(content),
            Err(e) => {
                debug!("No recovery content for {}: {}", path.display(), e);
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Explicit Save
    // ─────────────────────────────────────────────────────────────────────────

    /// Save through the viewer; on success, clear the autosave record.
    ///
    /// The latest in-memory content is flushed first, so a failed save
    /// leaves the newest edit recoverable.
    pub async fn save_explicit(
        &mut self,
        viewer: &mut dyn ContentViewer,
        path: &Path,
    ) -> Result<()> {
        self.shared.flush(path).await;

        if let Err(e) = viewer.handle_save().await {
            warn!("Save failed for {}: {}", path.display(), e);
            return Err(e);
        }

        if let Err(e) = self.clear_autosave(path).await {
            warn!(
                "Saved {} but could not remove its autosave copy: {}",
                path.display(),
                e
            );
        }
        info!("Saved file: {}", path.display());
        Ok(())
    }

    /// Stop every timer; side-channel files stay on disk for recovery.
    pub fn shutdown(&mut self) {
        for (path, timer) in self.timers.drain() {
            timer.abort();
            debug!("Autosave timer stopped for {}", path.display());
        }
    }
}

impl Drop for AutosaveManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::MockViewer;

    const DIR: &str = "/data/autosave";

    fn setup() -> (Arc<MemoryStorage>, AutosaveManager) {
        let storage = Arc::new(
            MemoryStorage::new()
                .with_directory(DIR)
                .with_file("/root/a.md", "on disk"),
        );
        let manager = AutosaveManager::new(storage.clone(), DIR, Duration::from_secs(30), 10);
        (storage, manager)
    }

    #[tokio::test]
    async fn test_start_writes_initial_content() {
        let (storage, mut manager) = setup();
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "draft v1").await;

        let side = manager.side_channel_path(path);
        assert!(side.starts_with(DIR));
        assert_eq!(storage.file_content(&side).as_deref(), Some("draft v1"));
        assert!(manager.is_tracking(path));
    }

    #[tokio::test]
    async fn test_update_content_is_memory_only() {
        let (storage, mut manager) = setup();
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "draft v1").await;
        assert!(manager.update_content(path, "draft v2"));

        let side = manager.side_channel_path(path);
        assert_eq!(storage.file_content(&side).as_deref(), Some("draft v1"));
        assert_eq!(manager.record(path).unwrap().content, "draft v2");
        assert!(!manager.update_content(Path::new("/root/other.md"), "x"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_latest_content() {
        let (storage, mut manager) = setup();
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "draft v1").await;
        manager.update_content(path, "draft v2");

        time::sleep(Duration::from_secs(31)).await;
        let side = manager.side_channel_path(path);
        assert_eq!(storage.file_content(&side).as_deref(), Some("draft v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_timer_and_keeps_file() {
        let (storage, mut manager) = setup();
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "draft v1").await;
        manager.update_content(path, "draft v2");
        let record = manager.stop_autosave(path).unwrap();
        assert_eq!(record.content, "draft v2");

        time::sleep(Duration::from_secs(61)).await;
        let side = manager.side_channel_path(path);
        assert_eq!(storage.file_content(&side).as_deref(), Some("draft v1"));
        assert!(!manager.is_tracking(path));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (storage, mut manager) = setup();
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "draft").await;

        manager.clear_autosave(path).await.unwrap();
        assert!(!storage.exists(manager.side_channel_path(path)));
        assert!(manager.get_recovery_content(path).await.is_none());

        manager.clear_autosave(path).await.unwrap();
    }

    #[tokio::test]
    async fn test_recovery_survives_restart() {
        let (storage, mut manager) = setup();
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "unsaved work").await;
        drop(manager);

        let restarted = AutosaveManager::new(storage.clone(), DIR, Duration::from_secs(30), 10);
        assert!(!restarted.is_tracking(path));
        assert_eq!(
            restarted.get_recovery_content(path).await.as_deref(),
            Some("unsaved work")
        );
    }

    #[tokio::test]
    async fn test_failed_save_keeps_latest_edit_recoverable() {
        let (storage, mut manager) = setup();
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "draft v1").await;
        manager.update_content(path, "draft v2");

        storage.fail_on(path);
        let mut viewer = MockViewer::new(storage.clone(), path, "draft v2");
        assert!(manager.save_explicit(&mut viewer, path).await.is_err());

        assert_eq!(
            manager.get_recovery_content(path).await.as_deref(),
            Some("draft v2")
        );
        assert!(manager.is_tracking(path));
    }

    #[tokio::test]
    async fn test_successful_save_clears_recovery() {
        let (storage, mut manager) = setup();
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "draft v1").await;

        let mut viewer = MockViewer::new(storage.clone(), path, "final");
        manager.save_explicit(&mut viewer, path).await.unwrap();

        assert!(manager.get_recovery_content(path).await.is_none());
        assert!(!manager.is_tracking(path));
        assert_eq!(storage.file_content(path).as_deref(), Some("final"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_after_clear_does_not_resurrect() {
        let (storage, mut manager) = setup();
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "draft").await;
        manager.clear_autosave(path).await.unwrap();

        time::sleep(Duration::from_secs(95)).await;
        assert!(!storage.exists(manager.side_channel_path(path)));
    }

    #[tokio::test]
    async fn test_retention_prunes_oldest() {
        let storage = Arc::new(MemoryStorage::new().with_directory(DIR));
        let mut manager = AutosaveManager::new(storage.clone(), DIR, Duration::from_secs(30), 2);

        let paths = [
            Path::new("/root/z.md"),
            Path::new("/root/b.md"),
            Path::new("/root/a.md"),
        ];
        for path in paths {
            manager.start_autosave(path, "x").await;
        }

        let remaining = storage.files_in(DIR);
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.contains(&manager.side_channel_path(paths[0])));
        assert!(remaining.contains(&manager.side_channel_path(paths[2])));
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let storage = Arc::new(MemoryStorage::new().with_directory("/"));
        let mut manager = AutosaveManager::new(storage.clone(), DIR, Duration::from_secs(30), 10);
        let path = Path::new("/root/a.md");
        manager.start_autosave(path, "x").await;
        assert!(storage.is_directory(DIR));
        assert_eq!(
            manager.get_recovery_content(path).await.as_deref(),
            Some("x")
        );
    }

    #[tokio::test]
    async fn test_disabled_manager_tracks_nothing() {
        let storage = Arc::new(MemoryStorage::new().with_directory(DIR));
        let settings = SessionSettings {
            autosave_enabled: false,
            autosave_dir: Some(PathBuf::from(DIR)),
            ..Default::default()
        };
        let mut manager = AutosaveManager::from_settings(storage.clone(), &settings);
        manager.start_autosave(Path::new("/root/a.md"), "x").await;
        assert!(manager.tracked_paths().is_empty());
        assert!(storage.files_in(DIR).is_empty());
    }
}
