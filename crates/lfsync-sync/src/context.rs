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

//! Per-repository run context
//!
//! Nothing in the engine reads global state. Everything one repository run
//! needs travels in a [`RepositoryContext`].

use crate::verify::MismatchRecord;
use lfsync_config::{Config, ConfigResult, CredentialProvider, RepositoryEntry};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A remote repository and where it lands locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRef {
    /// Owning user or organisation
    pub owner: String,
    /// Repository name
    pub name: String,
    /// Branch to sync
    pub branch: String,
    /// Local working tree
    pub destination: PathBuf,
}

impl RepositoryRef {
    /// Creates a reference with an explicit destination
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        branch: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            branch: branch.into(),
            destination: destination.into(),
        }
    }

    /// Builds a reference from a configured entry; the working tree goes to
    /// `<dest_root>/<owner>/<name>`
    pub fn from_entry(
        entry: &RepositoryEntry,
        default_branch: &str,
        dest_root: &Path,
    ) -> ConfigResult<Self> {
        let (owner, name) = entry.owner_and_name()?;
        Ok(Self::new(
            owner,
            name,
            entry.branch_or(default_branch),
            dest_root.join(owner).join(name),
        ))
    }

    /// `owner/name`
    pub fn id(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
    }
}

/// Run-wide settings shared by every repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Remote host root, e.g. `https://huggingface.co`
    pub endpoint: String,
    /// Attempt bound for clone, pull and fetch
    pub max_attempts: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// Partial files at least this large are resumed with a range request
    pub resume_threshold: u64,
    /// Timeout for the access probe
    pub probe_timeout: Duration,
}

impl SyncSettings {
    /// Reads the relevant sections of a loaded config
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.remote.endpoint.trim_end_matches('/').to_string(),
            max_attempts: config.sync.max_attempts,
            retry_delay: Duration::from_secs(config.sync.retry_delay_secs),
            resume_threshold: config.sync.resume_threshold,
            probe_timeout: Duration::from_secs(config.remote.probe_timeout_secs),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Transfer counters for one repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    /// Files that ended materialized by a transfer
    pub files_fetched: usize,
    /// Bytes written to disk
    pub bytes_downloaded: u64,
    /// Transfers that used a range request
    pub resumed_transfers: usize,
    /// HTTP requests issued, retries included
    pub attempts: u32,
}

/// Everything a repository run needs, passed explicitly
pub struct RepositoryContext {
    /// Repository being synced
    pub repository: RepositoryRef,
    /// Shared settings
    pub settings: Arc<SyncSettings>,
    /// Bearer credential source
    pub credentials: Arc<dyn CredentialProvider>,
    /// Counters updated by the fetcher
    pub stats: TransferStats,
    /// Filled by the verifier
    pub mismatches: Vec<MismatchRecord>,
}

impl RepositoryContext {
    /// Fresh context for one repository
    pub fn new(
        repository: RepositoryRef,
        settings: Arc<SyncSettings>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            repository,
            settings,
            credentials,
            stats: TransferStats::default(),
            mismatches: Vec::new(),
        }
    }

    /// Root of the working tree
    pub fn root(&self) -> &Path {
        &self.repository.destination
    }
}

impl fmt::Debug for RepositoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryContext")
            .field("repository", &self.repository)
            .field("settings", &self.settings)
            .field("has_credential", &self.credentials.has_credential())
            .field("stats", &self.stats)
            .field("mismatches", &self.mismatches.len())
            .finish()
    }
}
