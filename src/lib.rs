//! Ferrite Session - Document Session Core
//!
//! Tracks which documents are open and whether they are dirty, gates tab
//! closing against unsaved work, keeps an undo history of file operations,
//! mirrors in-progress edits to recoverable side-channel files, and swaps
//! whole tab sessions between two workspace modes.
//!
//! All file access goes through the [`storage::Storage`] trait; the UI is
//! reached only through the traits in [`collaborators`].

pub mod autosave;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod tabs;
pub mod undo;
pub mod workspaces;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use session::{CloseSaveOutcome, Notice, NoticeLevel, SaveFailure, SaveOutcome, Session};
