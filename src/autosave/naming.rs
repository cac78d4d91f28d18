//! Deterministic names for autosave side-channel files.
//!
//! Files are named `<hash>_<basename>.autosave`, where the hash is the hex
//! SHA-256 digest of the document path.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Extension of side-channel files.
pub const AUTOSAVE_EXTENSION: &str = "autosave";

/// Hex SHA-256 digest of the path.
pub fn path_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Side-channel file name for a document path.
pub fn side_channel_name(path: &Path) -> String {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string());
    format!("{}_{}.{}", path_hash(path), basename, AUTOSAVE_EXTENSION)
}

/// Whether a file name looks like a side-channel file.
pub fn is_side_channel(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(AUTOSAVE_EXTENSION)
}
