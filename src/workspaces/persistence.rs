//! Workspace session persistence (runtime state, not settings).

use super::{SessionSnapshot, WorkspaceMode};
use crate::config::{ensure_dir, get_config_dir, write_atomic};
use crate::error::{Error, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Persisted Sessions
// ─────────────────────────────────────────────────────────────────────────────

/// The retained per-mode sessions plus the mode that was live.
///
/// Stored in `{config_dir}/ferrite/sessions.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSessions {
    /// Mode that was live at shutdown
    pub active_mode: WorkspaceMode,
    /// One retained session per mode
    pub slots: BTreeMap<WorkspaceMode, SessionSnapshot>,
    /// Directory the user was in before first entering each mode
    pub entry_paths: BTreeMap<WorkspaceMode, PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// The sessions file name.
const SESSIONS_FILE: &str = "sessions.json";

/// Get the full path to the sessions file.
pub fn get_sessions_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(SESSIONS_FILE))
}

/// Load sessions from disk.
///
/// Returns `None` if the file doesn't exist or is invalid.
pub fn load_sessions_from(path: &Path) -> Option<PersistedSessions> {
    if !path.exists() {
        debug!("No sessions file at {}", path.display());
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(sessions) => {
                debug!("Loaded sessions from {}", path.display());
                Some(sessions)
            }
            Err(e) => {
                warn!("Failed to parse sessions file: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read sessions file: {}", e);
            None
        }
    }
}

/// Save sessions to disk, creating the parent directory if needed.
pub fn save_sessions_to(path: &Path, sessions: &PersistedSessions) -> Result<()> {
    if let Some(dir) = path.parent() {
        ensure_dir(dir)?;
    }

    let content = serde_json::to_string_pretty(sessions).map_err(|e| Error::ConfigSave {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    write_atomic(path, &content)?;
    debug!("Saved sessions to {}", path.display());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
