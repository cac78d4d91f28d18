//! Contracts for the UI collaborators the session core talks to.
//!
//! The content viewer owns the text of the active document and knows how to
//! save it; the explorer owns the directory tree panel. The session core
//! never reaches into either beyond these traits.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// The view showing the active document.
#[async_trait]
pub trait ContentViewer: Send {
    /// Save the active document through the storage collaborator.
    async fn handle_save(&mut self) -> Result<()>;

    /// Whether the viewer is in edit mode.
    fn is_editing(&self) -> bool;

    /// Whether the edited content differs from disk.
    fn has_changes(&self) -> bool;

    /// Replace the edited content with recovered text.
    fn load_recovered(&mut self, content: String);
}

/// The directory tree panel.
pub trait Explorer: Send {
    /// Re-list the current directory.
    fn refresh(&mut self);

    /// Re-list a single folder.
    fn refresh_folder(&mut self, path: &Path);

    /// Move keyboard focus to the tree.
    fn focus(&mut self);
}

/// Explorer that ignores every request, for headless sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExplorer;

impl Explorer for NullExplorer {
    fn refresh(&mut self) {}

    fn refresh_folder(&mut self, _path: &Path) {}

    fn focus(&mut self) {}
}
