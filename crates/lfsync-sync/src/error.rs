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

//! Error types for the sync engine

use lfsync_config::ConfigError;
use lfsync_git::GitError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by a single HTTP transfer attempt
#[derive(Debug, Error)]
pub enum TransferError {
    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Request could not be sent or the body stream broke
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Local file could not be written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransferError {
    /// Wraps a reqwest error with the URL it was raised for
    pub fn request(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.into(),
            source,
        }
    }

    /// Whether another attempt could succeed
    ///
    /// `408`, `429` and `5xx` are transient, as are connect, timeout and
    /// body-stream failures. Other statuses and local IO errors are fatal.
    pub fn is_transient(&self) -> bool {
        match self {
            TransferError::Status { status, .. } => {
                matches!(*status, 408 | 429) || (500..600).contains(status)
            }
            TransferError::Request { source, .. } => {
                source.is_timeout()
                    || source.is_connect()
                    || source.is_body()
                    || source.is_request()
                    || source.is_decode()
            }
            TransferError::Io(_) | TransferError::InvalidUrl(_) => false,
        }
    }
}

/// Errors that end the processing of one repository
#[derive(Debug, Error)]
pub enum SyncError {
    /// A transient failure kept recurring past the attempt bound
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: String,
    },

    /// Destination is in a state sync cannot work with
    #[error("Repository state error at {}: {reason}", path.display())]
    RepositoryState { path: PathBuf, reason: String },

    /// Repository is private and no credential is configured
    #[error("Access denied to {repo}: repository is private and no credential is configured")]
    AccessDenied { repo: String },

    /// Remote answered 404 for the repository
    #[error("Repository {repo} not found on remote")]
    RepositoryNotFound { repo: String },

    /// Content policy rejected tracked files
    #[error("Rejected content: {}", paths.join(", "))]
    RejectedContent { paths: Vec<String> },

    /// A transfer failed with a non-retryable error
    #[error("Transfer of {path} failed: {source}")]
    Transfer {
        path: String,
        #[source]
        source: TransferError,
    },

    /// Refused to delete a dangerous path
    #[error("Refusing to delete {}", .0.display())]
    UnsafeDeletionTarget(PathBuf),

    /// Version-control failure
    #[error(transparent)]
    Git(#[from] GitError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Working tree traversal failed
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
