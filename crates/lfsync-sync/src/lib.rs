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

//! # lfsync sync engine
//!
//! Mirrors repositories whose large files are LFS pointer stubs into local
//! working trees holding the real, hash-verified content.
//!
//! - [`walker`] enumerates the working tree lazily, skipping `.git`
//! - [`classify`] tells stubs from real content by their first 40 bytes
//! - [`fetch`] maps paths to resolve URLs and drives resumable transfers
//! - [`verify`] re-hashes every manifest entry after the transfers
//! - [`recovery`] deletes unusable destinations after confirmation
//! - [`engine`] ties it together per repository
//!
//! ```no_run
//! use lfsync_config::{Config, NoCredential};
//! use lfsync_git::Git2Backend;
//! use lfsync_sync::{HttpTransfer, RepositoryRef, SyncEngine, SyncSettings};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let engine = SyncEngine::new(
//!     SyncSettings::from_config(&config),
//!     Arc::new(NoCredential),
//!     Arc::new(Git2Backend::new(Arc::new(NoCredential))),
//!     Arc::new(HttpTransfer::new()?),
//! );
//! let report = engine
//!     .run(vec![RepositoryRef::new("acme", "model", "main", "./acme/model")])
//!     .await;
//! std::process::exit(report.exit_code());
//! # }
//! ```

pub mod classify;
pub mod context;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod policy;
pub mod progress;
pub mod recovery;
pub mod retry;
pub mod transfer;
pub mod verify;
pub mod walker;

pub use classify::{classify, StubState};
pub use context::{RepositoryContext, RepositoryRef, SyncSettings, TransferStats};
pub use engine::{
    scan_tree, verify_tree, RepositoryOutcome, RepositoryReport, RunReport, SyncEngine,
};
pub use error::{SyncError, SyncResult, TransferError};
pub use fetch::{resolve_url, Fetcher, TransferTask};
pub use policy::{ContentPolicy, RejectedExtensions};
pub use progress::{NoProgress, Phase, ProgressReporter};
pub use recovery::{AssumeYes, Confirmer, Decline, RecoveryController, RecoveryState};
pub use retry::{RetryFailure, RetryPolicy, Retryable};
pub use transfer::{FetchOutcome, FetchRequest, HttpTransfer, ProbeStatus, Transfer};
pub use verify::{IntegrityVerifier, MismatchRecord, Observed, VerificationReport};
pub use walker::{walk, EntryKind, TreeEntry};
