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

//! Sync command - clone or update repositories and materialize large files

use crate::confirm::PromptConfirmer;
use crate::output;
use crate::progress::{summary, BarReporter};
use crate::GlobalOpts;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use lfsync_config::{
    Config, CredentialProvider, CredentialScope, CredentialSource, RepositoryEntry, Validator,
};
use lfsync_git::Git2Backend;
use lfsync_sync::{
    AssumeYes, Confirmer, HttpTransfer, MismatchRecord, RejectedExtensions, RepositoryOutcome,
    RepositoryRef, RunReport, SyncEngine, SyncSettings, TransferStats,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Clone or update repositories, fetch every large file and verify it
///
/// Each repository lands in `<dest>/<owner>/<name>`. Pointer stubs are
/// replaced by their content over HTTPS; interrupted downloads of at least
/// the resume threshold continue with a range request. The run fails when
/// any repository fails or any large file does not match its recorded hash.
///
/// # Examples
///
/// ```bash
/// lfsync sync acme/model --dest ./models
/// lfsync sync acme/model@v2 acme/tokenizer --token-file ~/.cache/token
/// lfsync sync acme/quantized --reject-ext gguf --yes
/// ```
#[derive(Parser, Debug)]
pub struct SyncCmd {
    /// Repositories as owner/name or owner/name@branch (default: configured list)
    #[arg(value_name = "REPO")]
    pub repositories: Vec<String>,

    /// Root directory for replicas
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Branch for repositories that do not name one
    #[arg(short, long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Remote endpoint (scheme and host)
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Bearer token for private repositories
    #[arg(long, value_name = "TOKEN", conflicts_with = "token_file")]
    pub token: Option<String>,

    /// File whose first line is the bearer token
    #[arg(long, value_name = "PATH")]
    pub token_file: Option<PathBuf>,

    /// Attempts per network operation
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Seconds between attempts
    #[arg(long, value_name = "SECS")]
    pub retry_delay: Option<u64>,

    /// Smallest partial download resumed with a range request
    #[arg(long, value_name = "BYTES")]
    pub resume_threshold: Option<u64>,

    /// Abort a repository whose large files have this extension
    #[arg(long = "reject-ext", value_name = "EXT")]
    pub reject_ext: Vec<String>,

    /// Delete corrupt replicas without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct RepositorySummary {
    repository: RepositoryRef,
    status: &'static str,
    error: Option<String>,
    mismatches: Vec<MismatchRecord>,
    stats: TransferStats,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    finished_at: DateTime<Utc>,
    success: bool,
    repositories: Vec<RepositorySummary>,
}

impl RunSummary {
    fn from_report(report: &RunReport) -> Self {
        let repositories = report
            .repositories
            .iter()
            .map(|r| {
                let (status, error) = match &r.outcome {
                    RepositoryOutcome::Verified => ("verified", None),
                    RepositoryOutcome::Mismatched(_) => ("mismatched", None),
                    RepositoryOutcome::Failed { error, .. } => ("failed", Some(error.to_string())),
                };
                RepositorySummary {
                    repository: r.repository.clone(),
                    status,
                    error,
                    mismatches: r.outcome.mismatches().to_vec(),
                    stats: r.stats,
                }
            })
            .collect();
        Self {
            finished_at: Utc::now(),
            success: report.success(),
            repositories,
        }
    }
}

impl SyncCmd {
    pub async fn execute(&self, mut config: Config, opts: GlobalOpts) -> Result<()> {
        self.apply(&mut config)?;
        let targets = self.targets(&config)?;
        let quiet = opts.quiet || self.json;

        let scope = CredentialScope::acquire(&CredentialSource::from_config(&config.auth))
            .context("Failed to acquire credential")?;
        let credentials: Arc<dyn CredentialProvider> = Arc::<CredentialScope>::clone(&scope);
        let reporter = Arc::new(BarReporter::new(quiet));
        let engine = self.engine(&config, credentials, Arc::clone(&reporter))?;

        if !quiet {
            output::header(&format!(
                "Syncing {} repositor{} from {}",
                targets.len(),
                if targets.len() == 1 { "y" } else { "ies" },
                config.remote.endpoint
            ));
        }

        let started = Instant::now();
        let report = tokio::select! {
            report = engine.run(targets) => report,
            _ = tokio::signal::ctrl_c() => {
                reporter.clear();
                scope.release();
                output::warning("Interrupted");
                std::process::exit(130);
            }
        };
        reporter.clear();
        scope.release();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&RunSummary::from_report(&report))?);
        } else if !opts.quiet {
            display_report(&report);
            output::detail("Elapsed", &format!("{:.1?}", started.elapsed()));
        }

        let failed = report
            .repositories
            .iter()
            .filter(|r| !r.outcome.is_verified())
            .count();
        if failed > 0 {
            anyhow::bail!(
                "{} of {} repositories did not verify",
                failed,
                report.repositories.len()
            );
        }

        if !quiet {
            output::success("All repositories verified");
        }
        Ok(())
    }

    /// Command-line flags win over the configuration file
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            config.remote.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(dest) = &self.dest {
            config.sync.destination = dest.clone();
        }
        if let Some(branch) = &self.branch {
            config.sync.default_branch = branch.clone();
        }
        if let Some(token) = &self.token {
            config.auth.token = Some(token.clone());
        }
        if let Some(path) = &self.token_file {
            config.auth.token = None;
            config.auth.token_file = Some(path.clone());
        }
        if let Some(n) = self.max_retries {
            config.sync.max_attempts = n;
        }
        if let Some(secs) = self.retry_delay {
            config.sync.retry_delay_secs = secs;
        }
        if let Some(bytes) = self.resume_threshold {
            config.sync.resume_threshold = bytes;
        }
        config
            .sync
            .reject_extensions
            .extend(self.reject_ext.iter().cloned());
        if self.yes {
            config.sync.assume_yes = true;
        }

        config.validate().context("Invalid settings")?;
        Ok(())
    }

    fn targets(&self, config: &Config) -> Result<Vec<RepositoryRef>> {
        let entries = if self.repositories.is_empty() {
            config.repositories.clone()
        } else {
            self.repositories
                .iter()
                .map(|value| RepositoryEntry::parse(value))
                .collect::<Result<Vec<_>, _>>()?
        };
        if entries.is_empty() {
            anyhow::bail!("No repositories given on the command line or in the configuration");
        }

        entries
            .iter()
            .map(|entry| {
                RepositoryRef::from_entry(
                    entry,
                    &config.sync.default_branch,
                    &config.sync.destination,
                )
                .map_err(Into::into)
            })
            .collect()
    }

    fn engine(
        &self,
        config: &Config,
        credentials: Arc<dyn CredentialProvider>,
        reporter: Arc<BarReporter>,
    ) -> Result<SyncEngine> {
        let vcs = Git2Backend::new(Arc::clone(&credentials))
            .with_username(config.remote.git_username.clone());
        let transfer = HttpTransfer::new().context("Failed to build HTTP client")?;
        let confirmer: Arc<dyn Confirmer> = if config.sync.assume_yes {
            Arc::new(AssumeYes)
        } else {
            Arc::new(PromptConfirmer)
        };

        Ok(SyncEngine::new(
            SyncSettings::from_config(config),
            credentials,
            Arc::new(vcs),
            Arc::new(transfer),
        )
        .with_policy(Arc::new(RejectedExtensions::new(
            &config.sync.reject_extensions,
        )))
        .with_confirmer(confirmer)
        .with_progress(reporter))
    }
}

fn display_mismatches(records: &[MismatchRecord]) {
    for record in records {
        output::item(
            record.label(),
            &format!(
                "{} (expected {}, found {})",
                record.path,
                record.expected,
                record.actual
            ),
        );
    }
}

fn display_report(report: &RunReport) {
    for r in &report.repositories {
        match &r.outcome {
            RepositoryOutcome::Verified => {
                output::success(&format!("{} verified, {}", r.repository, summary(&r.stats, None)));
            }
            RepositoryOutcome::Mismatched(records) => {
                output::error(&format!(
                    "{} failed verification: {} large file(s) missing or corrupt",
                    r.repository,
                    records.len()
                ));
                display_mismatches(records);
            }
            RepositoryOutcome::Failed { error, mismatches } => {
                output::error(&format!("{} failed: {}", r.repository, error));
                display_mismatches(mismatches);
            }
        }
    }
}
