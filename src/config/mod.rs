//! Configuration module for the session core
//!
//! This module handles the session settings, including
//! serialization/deserialization to/from JSON and persistent storage
//! to platform-specific directories.

mod persistence;
mod settings;

pub use persistence::*;
pub(crate) use persistence::{ensure_dir, write_atomic};
pub use settings::*;
