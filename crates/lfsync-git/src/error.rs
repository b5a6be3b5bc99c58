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

//! Error types for the git collaborator

use std::path::PathBuf;
use thiserror::Error;

/// Result type for git operations
pub type GitResult<T> = Result<T, GitError>;

/// Error types for pointer parsing and repository operations
#[derive(Debug, Error)]
pub enum GitError {
    /// Error parsing pointer file
    #[error("Failed to parse pointer file: {0}")]
    PointerParse(String),

    /// Invalid pointer file format
    #[error("Invalid pointer file format: {0}")]
    InvalidPointerFormat(String),

    /// Missing required field in pointer file
    #[error("Missing required field in pointer file: {0}")]
    MissingPointerField(String),

    /// Invalid OID format
    #[error("Invalid OID format: {0}")]
    InvalidOid(String),

    /// Git2 library error
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path is not a git working tree
    #[error("Not a tracked repository: {}", .0.display())]
    NotATrackedRepository(PathBuf),

    /// Requested branch does not exist on the remote
    #[error("Branch '{0}' not found on remote")]
    BranchNotFound(String),

    /// Switching branches failed
    #[error("Failed to check out branch '{branch}': {reason}")]
    Checkout { branch: String, reason: String },

    /// Remote authentication failed or was required but unavailable
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Blocking git task panicked or was cancelled
    #[error("Git task failed: {0}")]
    TaskJoin(String),
}

impl GitError {
    /// Whether retrying the same operation could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            GitError::Git2(e) => {
                e.code() != git2::ErrorCode::Auth
                    && matches!(
                        e.class(),
                        git2::ErrorClass::Net
                            | git2::ErrorClass::Http
                            | git2::ErrorClass::Ssl
                            | git2::ErrorClass::Os
                    )
            }
            GitError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
