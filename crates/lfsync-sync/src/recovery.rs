// Copyright (C) 2026  lfsync Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Recovery of unusable destinations
//!
//! ```text
//! Healthy --fault--> PendingDeletion --confirm--> Deleted
//!                          |
//!                          +--decline--> Healthy (left as is)
//! ```
//!
//! Deletion is recursive and cannot be undone, so it never happens without
//! a [`Confirmer`] saying yes.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use std::path::{Component, Path};
use tracing::{info, warn};

/// Asks the operator before destructive actions
///
/// Implementations must not block the runtime while waiting for an answer,
/// so a pending question can be abandoned by cancelling the future.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Returns true to go ahead
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Confirms everything (`--yes`)
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

#[async_trait]
impl Confirmer for AssumeYes {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Declines everything (non-interactive runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct Decline;

#[async_trait]
impl Confirmer for Decline {
    async fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Where a destination ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Nothing to do, or deletion was declined
    Healthy,
    /// A fault was detected and confirmation is pending
    PendingDeletion,
    /// The destination was removed
    Deleted,
}

/// Refuses empty paths and filesystem roots
pub fn is_safe_target(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    resolved
        .components()
        .any(|c| matches!(c, Component::Normal(_)))
}

/// Drives the recovery state machine for one destination
pub struct RecoveryController<'a> {
    confirmer: &'a dyn Confirmer,
}

impl<'a> RecoveryController<'a> {
    /// Creates a controller asking `confirmer` before deleting
    pub fn new(confirmer: &'a dyn Confirmer) -> Self {
        Self { confirmer }
    }

    /// Offers to delete `path` because of `reason`
    ///
    /// # Errors
    ///
    /// [`SyncError::UnsafeDeletionTarget`] for an empty path or a root, and
    /// IO errors from the removal itself.
    pub async fn recover(&self, path: &Path, reason: &str) -> SyncResult<RecoveryState> {
        if !is_safe_target(path) {
            return Err(SyncError::UnsafeDeletionTarget(path.to_path_buf()));
        }
        warn!(
            path = %path.display(),
            reason,
            state = ?RecoveryState::PendingDeletion,
            "Destination needs recovery"
        );

        let prompt = format!(
            "{} is unusable ({}). Delete it so the next run can start fresh?",
            path.display(),
            reason
        );
        if !self.confirmer.confirm(&prompt).await {
            info!(path = %path.display(), "Deletion declined, leaving destination in place");
            return Ok(RecoveryState::Healthy);
        }

        match tokio::fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await?,
            Ok(_) => tokio::fs::remove_file(path).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(path = %path.display(), "Destination deleted");
        Ok(RecoveryState::Deleted)
    }
}
