//! Confirmation gate in front of tab closing.
//!
//! Closing a clean tab happens immediately. Closing a dirty tab parks the
//! request as a `PendingClose` until the user picks save, discard or cancel.
//! Only one request may be parked at a time.

use super::{display_name, Tab, TabRegistry};
use crate::autosave::AutosaveManager;
use crate::collaborators::ContentViewer;
use crate::error::Result;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// A close request waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClose {
    /// Tab the request is for
    pub tab_id: PathBuf,
    /// File name shown in the confirmation prompt
    pub file_name: String,
}

/// What happened to a close request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The tab was clean and has been removed
    Closed(Tab),
    /// The tab is dirty; the caller must prompt the user
    AwaitingConfirmation(PendingClose),
    /// Another close is already waiting for confirmation
    Rejected,
    /// No tab with that id is open
    NotFound,
}

/// Tracks the one close request that may be awaiting confirmation.
#[derive(Debug, Default)]
pub struct CloseController {
    pending: Option<PendingClose>,
}

impl CloseController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The request awaiting confirmation, if any.
    pub fn pending(&self) -> Option<&PendingClose> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Ask to close `id`.
    ///
    /// A clean tab is removed right away. A dirty one becomes the pending
    /// close. While a close is pending every further request is rejected.
    pub fn request_close(&mut self, registry: &mut TabRegistry, id: &Path) -> CloseOutcome {
        if let Some(pending) = &self.pending {
            warn!(
                "Close of {} rejected, {} is awaiting confirmation",
                id.display(),
                pending.tab_id.display()
            );
            return CloseOutcome::Rejected;
        }

        let Some(tab) = registry.get(id) else {
            return CloseOutcome::NotFound;
        };

        if !tab.state.is_dirty() {
            return match registry.close_internal(id) {
                Some(tab) => CloseOutcome::Closed(tab),
                None => CloseOutcome::NotFound,
            };
        }

        let pending = PendingClose {
            tab_id: id.to_path_buf(),
            file_name: display_name(id),
        };
        info!("Close of {} awaits confirmation", pending.file_name);
        self.pending = Some(pending.clone());
        CloseOutcome::AwaitingConfirmation(pending)
    }

    /// Save the pending tab, then close it.
    ///
    /// Only the active tab is saved through the viewer; a pending tab that
    /// is not active is closed directly. On save failure the request stays
    /// pending and the error is returned. Returns the closed tab, or `None`
    /// if nothing was pending or the tab has gone away in the meantime.
    pub async fn save_and_close(
        &mut self,
        registry: &mut TabRegistry,
        viewer: &mut dyn ContentViewer,
        autosave: &mut AutosaveManager,
    ) -> Result<Option<Tab>> {
        let Some(pending) = self.pending.clone() else {
            return Ok(None);
        };
        if !registry.contains(&pending.tab_id) {
            debug!("Pending tab {} is no longer open", pending.tab_id.display());
            self.pending = None;
            return Ok(None);
        }

        if registry.is_active(&pending.tab_id) {
            autosave.save_explicit(viewer, &pending.tab_id).await?;
        } else {
            debug!(
                "Pending tab {} is not active, closing without saving",
                pending.tab_id.display()
            );
        }

        self.pending = None;
        Ok(registry.close_internal(&pending.tab_id))
    }

    /// Close the pending tab, dropping its unsaved edits.
    pub fn discard_and_close(&mut self, registry: &mut TabRegistry) -> Option<Tab> {
        let pending = self.pending.take()?;
        info!("Discarding changes to {}", pending.file_name);
        registry.close_internal(&pending.tab_id)
    }

    /// Abandon the pending close, leaving the tab open and dirty.
    pub fn cancel(&mut self) -> Option<PendingClose> {
        let pending = self.pending.take();
        if let Some(p) = &pending {
            debug!("Close of {} cancelled", p.file_name);
        }
        pending
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
