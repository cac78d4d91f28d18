//! Session settings for Ferrite
//!
//! This module defines the `SessionSettings` struct that holds the
//! user-configurable knobs of the document session core, with serde support
//! for JSON persistence.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application name used for platform directories
pub(crate) const APP_NAME: &str = "ferrite";

// ─────────────────────────────────────────────────────────────────────────────
// Main Settings Struct
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for the document session core.
///
/// Serialized to JSON and persisted to the user's config directory.
/// All fields have sensible defaults via the `Default` trait and `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    // ─────────────────────────────────────────────────────────────────────────
    // Autosave
    // ─────────────────────────────────────────────────────────────────────────
    /// Whether in-progress edits are mirrored to side-channel files
    pub autosave_enabled: bool,

    /// Interval between side-channel flushes, in seconds
    pub autosave_interval_secs: u64,

    /// Maximum number of side-channel files kept on disk
    pub autosave_max_files: usize,

    /// Override for the side-channel directory (platform data dir when unset)
    pub autosave_dir: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────────
    /// Directory used when a workspace mode has no remembered path
    pub home_path: Option<PathBuf>,

    /// Whether workspace sessions are written to disk on shutdown
    pub persist_sessions: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            autosave_enabled: true,
            autosave_interval_secs: 30,
            autosave_max_files: 10,
            autosave_dir: None,
            home_path: None,
            persist_sessions: true,
        }
    }
}

impl SessionSettings {
    // ─────────────────────────────────────────────────────────────────────────
    // Validation Constants and Sanitization
    // ─────────────────────────────────────────────────────────────────────────

    /// Minimum allowed autosave interval.
    pub const MIN_AUTOSAVE_INTERVAL_SECS: u64 = 5;
    /// Maximum allowed autosave interval.
    pub const MAX_AUTOSAVE_INTERVAL_SECS: u64 = 3600;
    /// Maximum number of retained side-channel files.
    pub const MAX_AUTOSAVE_FILES: usize = 100;

    /// Sanitize settings by clamping values to valid ranges.
    ///
    /// This is useful after loading settings from a file that might have
    /// been manually edited with invalid values.
    pub fn sanitize(&mut self) {
        self.autosave_interval_secs = self.autosave_interval_secs.clamp(
            Self::MIN_AUTOSAVE_INTERVAL_SECS,
            Self::MAX_AUTOSAVE_INTERVAL_SECS,
        );

        if self.autosave_max_files == 0 {
            self.autosave_max_files = 10;
        } else if self.autosave_max_files > Self::MAX_AUTOSAVE_FILES {
            self.autosave_max_files = Self::MAX_AUTOSAVE_FILES;
        }
    }

    /// Load settings and sanitize them to ensure validity.
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Autosave flush interval as a `Duration`.
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    /// Resolve the side-channel directory.
    ///
    /// Falls back to `<data_dir>/ferrite/autosave`, then to a relative
    /// `autosave` directory when the platform has no data directory.
    pub fn resolved_autosave_dir(&self) -> PathBuf {
        if let Some(dir) = &self.autosave_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|base| base.join(APP_NAME).join("autosave"))
            .unwrap_or_else(|| PathBuf::from("autosave"))
    }

    /// Resolve the home directory used as the last-resort workspace path.
    pub fn resolved_home_path(&self) -> PathBuf {
        self.home_path
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("/"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SessionSettings::default();

        assert!(settings.autosave_enabled);
        assert_eq!(settings.autosave_interval_secs, 30);
        assert_eq!(settings.autosave_max_files, 10);
        assert!(settings.autosave_dir.is_none());
        assert!(settings.persist_sessions);
        assert_eq!(settings.autosave_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_sanitize_clamps_values() {
        let mut settings = SessionSettings {
            autosave_interval_secs: 1,
            autosave_max_files: 0,
            ..Default::default()
        };
        settings.sanitize();
        assert_eq!(settings.autosave_interval_secs, 5);
        assert_eq!(settings.autosave_max_files, 10);

        settings.autosave_interval_secs = 100_000;
        settings.autosave_max_files = 5_000;
        settings.sanitize();
        assert_eq!(settings.autosave_interval_secs, 3600);
        assert_eq!(settings.autosave_max_files, 100);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings =
            SessionSettings::from_json_sanitized(r#"{"autosave_max_files": 3}"#).unwrap();
        assert_eq!(settings.autosave_max_files, 3);
        assert_eq!(settings.autosave_interval_secs, 30);
        assert!(settings.autosave_enabled);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(SessionSettings::from_json_sanitized("{ not json").is_err());
    }

    #[test]
    fn test_resolved_paths_prefer_overrides() {
        let settings = SessionSettings {
            autosave_dir: Some(PathBuf::from("/tmp/autosave")),
            home_path: Some(PathBuf::from("/home/tester")),
            ..Default::default()
        };
        assert_eq!(
            settings.resolved_autosave_dir(),
            PathBuf::from("/tmp/autosave")
        );
        assert_eq!(settings.resolved_home_path(), PathBuf::from("/home/tester"));
    }

    #[test]
    fn test_resolved_autosave_dir_default_ends_with_autosave() {
        let settings = SessionSettings::default();
        assert!(settings.resolved_autosave_dir().ends_with("autosave"));
    }
}
