//! Configuration file persistence for the session core
//!
//! This module handles loading and saving the session settings to
//! platform-specific directories with robust error handling and
//! graceful fallback to defaults.

use crate::config::settings::APP_NAME;
use crate::config::SessionSettings;
use crate::error::{Error, Result, ResultExt};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration file name
const CONFIG_FILE_NAME: &str = "session-config.json";

// ─────────────────────────────────────────────────────────────────────────────
// Platform-Specific Directory Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Get the platform-specific configuration directory for the application.
///
/// - **Windows**: `%APPDATA%\ferrite\`
/// - **macOS**: `~/Library/Application Support/ferrite/`
/// - **Linux**: `~/.config/ferrite/`
///
/// # Errors
///
/// Returns `Error::ConfigDirNotFound` if the config directory cannot be determined.
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|base| base.join(APP_NAME))
        .ok_or(Error::ConfigDirNotFound)
}

/// Get the full path to the configuration file.
pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Ensure a directory exists, creating it if necessary.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        debug!("Creating config directory: {}", dir.display());
        fs::create_dir_all(dir).map_err(|e| Error::ConfigSave {
            path: dir.to_path_buf(),
            source: Box::new(e),
        })?;
    }
    Ok(())
}

/// Write `contents` next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let backup_path = path.with_extension("json.bak");

    fs::write(&backup_path, contents).map_err(|e| Error::ConfigSave {
        path: backup_path.clone(),
        source: Box::new(e),
    })?;

    fs::rename(&backup_path, path).map_err(|e| Error::ConfigSave {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Load Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Load settings from the default config file location.
///
/// Missing, empty or corrupted files fall back to defaults with a warning.
pub fn load_config() -> SessionSettings {
    get_config_file_path()
        .and_then(|path| load_config_from(&path))
        .unwrap_or_warn_default(SessionSettings::default(), "Failed to load configuration")
}

/// Load settings from an explicit file path.
///
/// A missing or empty file yields defaults; invalid JSON is an error.
pub fn load_config_from(config_path: &Path) -> Result<SessionSettings> {
    if !config_path.exists() {
        debug!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
        return Ok(SessionSettings::default());
    }

    let contents = fs::read_to_string(config_path).map_err(|e| Error::ConfigLoad {
        path: config_path.to_path_buf(),
        source: Box::new(e),
    })?;

    if contents.trim().is_empty() {
        debug!("Config file is empty, using defaults");
        return Ok(SessionSettings::default());
    }

    let settings = SessionSettings::from_json_sanitized(&contents).map_err(|e| {
        warn!(
            "Config file at {} contains invalid JSON: {}",
            config_path.display(),
            e
        );
        Error::ConfigParse {
            message: format!("Failed to parse config file: {}", e),
            source: Some(Box::new(e)),
        }
    })?;

    info!(
        "Configuration loaded successfully from {}",
        config_path.display()
    );
    Ok(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Save Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Save settings to an explicit file path using an atomic write.
pub fn save_config_to(config_path: &Path, settings: &SessionSettings) -> Result<()> {
    if let Some(dir) = config_path.parent() {
        ensure_dir(dir)?;
    }

    let json = serde_json::to_string_pretty(settings).map_err(|e| Error::ConfigSave {
        path: config_path.to_path_buf(),
        source: Box::new(e),
    })?;

    write_atomic(config_path, &json)?;

    info!(
        "Configuration saved successfully to {}",
        config_path.display()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join(APP_NAME).join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let settings = load_config_from(&config_path(&temp_dir)).unwrap();
        assert_eq!(settings, SessionSettings::default());
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "   \n").unwrap();
        assert_eq!(load_config_from(&path).unwrap(), SessionSettings::default());
    }

    #[test]
    fn test_load_corrupt_file_is_parse_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ broken").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = config_path(&temp_dir);
        let settings = SessionSettings {
            autosave_interval_secs: 45,
            autosave_max_files: 4,
            persist_sessions: false,
            ..Default::default()
        };

        save_config_to(&path, &settings).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.bak").exists());

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_sanitizes_values() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"autosave_interval_secs": 0}"#).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(
            loaded.autosave_interval_secs,
            SessionSettings::MIN_AUTOSAVE_INTERVAL_SECS
        );
    }
}
