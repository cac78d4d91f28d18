//! Test doubles for the UI collaborators.

use crate::collaborators::{ContentViewer, Explorer};
use crate::error::Result;
use crate::storage::{MemoryStorage, Storage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Viewer that saves its text to one path of a `MemoryStorage`.
pub(crate) struct MockViewer {
    pub storage: Arc<MemoryStorage>,
    pub path: PathBuf,
    pub content: String,
    pub editing: bool,
    pub changes: bool,
    pub saves: usize,
}

impl MockViewer {
    pub fn new(storage: Arc<MemoryStorage>, path: impl Into<PathBuf>, content: &str) -> Self {
        Self {
            storage,
            path: path.into(),
            content: content.to_string(),
            editing: true,
            changes: true,
            saves: 0,
        }
    }
}

#[async_trait]
impl ContentViewer for MockViewer {
    async fn handle_save(&mut self) -> Result<()> {
        self.saves += 1;
        self.storage.write_file(&self.path, &self.content).await?;
        self.changes = false;
        Ok(())
    }

    fn is_editing(&self) -> bool {
        self.editing
    }

    fn has_changes(&self) -> bool {
        self.changes
    }

    fn load_recovered(&mut self, content: String) {
        self.content = content;
        self.changes = true;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExplorerCall {
    Refresh,
    RefreshFolder(PathBuf),
    Focus,
}

/// Explorer that records every request into a shared log.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingExplorer {
    pub calls: Arc<Mutex<Vec<ExplorerCall>>>,
}

impl RecordingExplorer {
    pub fn calls(&self) -> Vec<ExplorerCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Explorer for RecordingExplorer {
    fn refresh(&mut self) {
        self.calls.lock().unwrap().push(ExplorerCall::Refresh);
    }

    fn refresh_folder(&mut self, path: &Path) {
        self.calls
            .lock()
            .unwrap()
            .push(ExplorerCall::RefreshFolder(path.to_path_buf()));
    }

    fn focus(&mut self) {
        self.calls.lock().unwrap().push(ExplorerCall::Focus);
    }
}

/// Install a test logger once per process.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
