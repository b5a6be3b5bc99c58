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
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default remote host serving `<owner>/<name>` repositories
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Default branch synced when a repository does not name one
pub const DEFAULT_BRANCH: &str = "main";

/// Partial downloads at or above this many bytes are resumed with a range request
pub const DEFAULT_RESUME_THRESHOLD: u64 = 1024;

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Remote host settings
    pub remote: RemoteConfig,

    /// Transfer and verification behaviour
    pub sync: SyncConfig,

    /// Credential sources
    pub auth: AuthConfig,

    /// Logging settings
    pub observability: ObservabilityConfig,

    /// Repositories synced when none are given on the command line
    pub repositories: Vec<RepositoryEntry>,
}

/// Remote host settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Scheme and host, without a trailing slash
    pub endpoint: String,

    /// Timeout for the anonymous access probe, in seconds
    pub probe_timeout_secs: u64,

    /// Username presented to git alongside the token
    pub git_username: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            probe_timeout_secs: 15,
            git_username: "git".to_string(),
        }
    }
}

/// Transfer and verification behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Branch used for repositories that do not name one
    pub default_branch: String,

    /// Directory under which `<owner>/<name>` replicas are created
    pub destination: PathBuf,

    /// Attempts per network operation (clone, pull, file transfer)
    pub max_attempts: u32,

    /// Fixed delay between attempts, in seconds
    pub retry_delay_secs: u64,

    /// Minimum local size treated as a resumable partial download
    pub resume_threshold: u64,

    /// File extensions whose presence aborts a repository (e.g. "gguf")
    pub reject_extensions: Vec<String>,

    /// Delete corrupt replicas without prompting
    pub assume_yes: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_branch: DEFAULT_BRANCH.to_string(),
            destination: PathBuf::from("."),
            max_attempts: 50,
            retry_delay_secs: 10,
            resume_threshold: DEFAULT_RESUME_THRESHOLD,
            reject_extensions: Vec::new(),
            assume_yes: false,
        }
    }
}

/// Credential sources, in precedence order: `token`, `token_file`, `token_env`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Literal bearer token
    pub token: Option<String>,

    /// File whose first line is the token
    pub token_file: Option<PathBuf>,

    /// Environment variable holding the token
    pub token_env: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive
    pub log_level: String,

    /// pretty, compact or json
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
        }
    }
}

/// A repository listed in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryEntry {
    /// `owner/name`
    pub id: String,

    /// Branch override
    #[serde(default)]
    pub branch: Option<String>,
}

impl RepositoryEntry {
    /// Parse `owner/name` or `owner/name@branch`
    pub fn parse(value: &str) -> ConfigResult<Self> {
        let (id, branch) = match value.split_once('@') {
            Some((id, branch)) if !branch.is_empty() => (id, Some(branch.to_string())),
            Some(_) => return Err(ConfigError::InvalidRepositoryId(value.to_string())),
            None => (value, None),
        };

        let entry = Self {
            id: id.to_string(),
            branch,
        };
        entry.owner_and_name()?;
        Ok(entry)
    }

    /// Split the identifier into owner and name
    pub fn owner_and_name(&self) -> ConfigResult<(&str, &str)> {
        let (owner, name) = self
            .id
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidRepositoryId(self.id.clone()))?;

        let valid = |part: &str| {
            !part.is_empty()
                && part != "."
                && part != ".."
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };

        if valid(owner) && valid(name) {
            Ok((owner, name))
        } else {
            Err(ConfigError::InvalidRepositoryId(self.id.clone()))
        }
    }

    /// Branch for this entry, falling back to `default_branch`
    pub fn branch_or<'a>(&'a self, default_branch: &'a str) -> &'a str {
        self.branch.as_deref().unwrap_or(default_branch)
    }
}

impl Config {
    /// Load configuration from an explicit file, or `lfsync.toml` in the
    /// working directory when present, then apply `LFSYNC_*` overrides.
    pub async fn load(path: Option<&std::path::Path>) -> ConfigResult<Self> {
        use crate::ConfigLoader;

        let loader = ConfigLoader::new();
        match path {
            Some(path) => loader.load_with_overrides(path).await,
            None => {
                let implicit = std::path::Path::new("lfsync.toml");
                if implicit.exists() {
                    loader.load_with_overrides(implicit).await
                } else {
                    let mut config = Self::default();
                    loader.apply_env_overrides(&mut config)?;
                    Ok(config)
                }
            }
        }
    }
}
