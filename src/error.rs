//! Centralized error handling for the session core
//!
//! This module provides a unified error type that covers every failure the
//! session core can surface: storage collaborator I/O, autosave recovery,
//! workspace mode switches and configuration persistence.

use log::warn;
use std::fmt;
use std::io;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Custom Result Type Alias
// ─────────────────────────────────────────────────────────────────────────────

/// A specialized `Result` type for the session core.
pub type Result<T> = std::result::Result<T, Error>;

/// The centralized error type for the session core.
#[derive(Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Generic I/O error wrapper
    Io(io::Error),

    /// The storage collaborator has not been attached yet
    StorageUnavailable,

    /// Failed to read a file or list a directory
    ReadFailure { path: PathBuf, source: io::Error },

    /// Failed to write, create or copy a file
    WriteFailure { path: PathBuf, source: io::Error },

    /// A rename or move target already exists
    RenameConflict { path: PathBuf, target: PathBuf },

    /// Failed to delete a file or directory
    DeleteFailure { path: PathBuf, source: io::Error },

    // ─────────────────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// No autosave record exists for the path
    RecoveryUnavailable { path: PathBuf },

    /// Switching between workspace modes failed; prior state was kept
    ModeSwitchFailure { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to load configuration file
    ConfigLoad {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to save configuration file
    ConfigSave {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse configuration (invalid JSON/format)
    ConfigParse {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration directory not found or inaccessible
    ConfigDirNotFound,

    // ─────────────────────────────────────────────────────────────────────────
    // Application Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Generic application error with a message
    Application(String),
}

impl Error {
    /// Whether the error means the target simply was not there.
    ///
    /// Used where a missing file is an acceptable outcome (idempotent deletes).
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Io(err)
            | Error::ReadFailure { source: err, .. }
            | Error::WriteFailure { source: err, .. }
            | Error::DeleteFailure { source: err, .. } => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

// Implement From traits for convenient error conversion
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParse {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Display trait implementation for user-friendly error messages
// ─────────────────────────────────────────────────────────────────────────────
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Storage Errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::StorageUnavailable => write!(f, "Storage is not available"),
            Error::ReadFailure { path, source } => {
                write!(f, "Failed to read '{}': {}", path.display(), source)
            }
            Error::WriteFailure { path, source } => {
                write!(f, "Failed to write '{}': {}", path.display(), source)
            }
            Error::RenameConflict { path, target } => {
                write!(
                    f,
                    "Cannot move '{}': '{}' already exists",
                    path.display(),
                    target.display()
                )
            }
            Error::DeleteFailure { path, source } => {
                write!(f, "Failed to delete '{}': {}", path.display(), source)
            }

            // Session Errors
            Error::RecoveryUnavailable { path } => {
                write!(f, "No recovery data for '{}'", path.display())
            }
            Error::ModeSwitchFailure { message } => {
                write!(f, "Failed to switch workspace: {}", message)
            }

            // Configuration Errors
            Error::ConfigLoad { path, source } => {
                write!(
                    f,
                    "Failed to load configuration from '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigSave { path, source } => {
                write!(
                    f,
                    "Failed to save configuration to '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigParse { message, .. } => {
                write!(f, "Invalid configuration format: {}", message)
            }
            Error::ConfigDirNotFound => {
                write!(f, "Configuration directory not found")
            }

            // Application Errors
            Error::Application(msg) => write!(f, "{}", msg),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// std::error::Error trait implementation for error chaining
// ─────────────────────────────────────────────────────────────────────────────
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::ReadFailure { source, .. }
            | Error::WriteFailure { source, .. }
            | Error::DeleteFailure { source, .. } => Some(source),
            Error::ConfigLoad { source, .. } => Some(source.as_ref()),
            Error::ConfigSave { source, .. } => Some(source.as_ref()),
            Error::ConfigParse { source, .. } => source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::StorageUnavailable
            | Error::RenameConflict { .. }
            | Error::RecoveryUnavailable { .. }
            | Error::ModeSwitchFailure { .. }
            | Error::ConfigDirNotFound
            | Error::Application(_) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Graceful Degradation Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for Result to support graceful degradation.
pub trait ResultExt<T> {
    /// If the result is an error, log it at warning level and return the provided default.
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                warn!("{}: {}. Using default.", context, err);
                default
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
