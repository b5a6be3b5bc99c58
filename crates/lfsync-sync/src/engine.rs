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

//! Per-repository orchestration
//!
//! For each repository, strictly one after another:
//!
//! 1. probe access and acquire the working tree (clone, or check and pull)
//! 2. read the LFS manifest and apply the content policy
//! 3. walk the tree, fetching every stub as soon as it is found
//! 4. verify every manifest entry, even when a fetch failed

use crate::classify::{classify, StubState};
use crate::context::{RepositoryContext, RepositoryRef, SyncSettings, TransferStats};
use crate::error::{SyncError, SyncResult};
use crate::fetch::{repository_url, tree_url, Fetcher, TransferTask};
use crate::policy::{ContentPolicy, RejectedExtensions};
use crate::progress::{NoProgress, Phase, ProgressReporter};
use crate::recovery::{Confirmer, Decline, RecoveryController};
use crate::retry::{RetryFailure, RetryPolicy};
use crate::transfer::Transfer;
use crate::verify::{IntegrityVerifier, MismatchRecord, VerificationReport};
use crate::walker::{walk, EntryKind, TreeEntry};
use lfsync_config::CredentialProvider;
use lfsync_git::{Consistency, GitError, ManifestEntry, VersionControl};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Verdict for one repository
#[derive(Debug)]
pub enum RepositoryOutcome {
    /// Every manifest entry matched
    Verified,
    /// Transfers finished but some entries are missing or wrong
    Mismatched(Vec<MismatchRecord>),
    /// A fatal error ended the run; `mismatches` is what verification
    /// found afterwards, empty when it could not run
    Failed {
        error: SyncError,
        mismatches: Vec<MismatchRecord>,
    },
}

impl RepositoryOutcome {
    /// True only for [`RepositoryOutcome::Verified`]
    pub fn is_verified(&self) -> bool {
        matches!(self, RepositoryOutcome::Verified)
    }

    /// Mismatches recorded by verification
    pub fn mismatches(&self) -> &[MismatchRecord] {
        match self {
            RepositoryOutcome::Verified => &[],
            RepositoryOutcome::Mismatched(records) => records,
            RepositoryOutcome::Failed { mismatches, .. } => mismatches,
        }
    }
}

/// Result of syncing one repository
#[derive(Debug)]
pub struct RepositoryReport {
    /// Repository synced
    pub repository: RepositoryRef,
    /// Verdict
    pub outcome: RepositoryOutcome,
    /// Transfer counters
    pub stats: TransferStats,
}

/// Results of a whole run, in processing order
#[derive(Debug, Default)]
pub struct RunReport {
    /// One report per repository
    pub repositories: Vec<RepositoryReport>,
}

impl RunReport {
    /// True when every repository verified
    pub fn success(&self) -> bool {
        self.repositories.iter().all(|r| r.outcome.is_verified())
    }

    /// Process exit status for this run
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

enum Destination {
    Missing,
    Empty,
    WorkingTree,
    Occupied,
}

fn same_remote(a: &str, b: &str) -> bool {
    let normalize = |s: &str| {
        let s = s.trim_end_matches('/');
        s.strip_suffix(".git").unwrap_or(s).to_string()
    };
    normalize(a) == normalize(b)
}

fn retry_error(failure: RetryFailure<GitError>, operation: String) -> SyncError {
    match failure {
        RetryFailure::Fatal { error, .. } => SyncError::Git(error),
        RetryFailure::Exhausted { attempts, last } => SyncError::RetriesExhausted {
            operation,
            attempts,
            last: last.to_string(),
        },
    }
}

/// The selective sync engine
pub struct SyncEngine {
    settings: Arc<SyncSettings>,
    credentials: Arc<dyn CredentialProvider>,
    vcs: Arc<dyn VersionControl>,
    transfer: Arc<dyn Transfer>,
    policy: Arc<dyn ContentPolicy>,
    confirmer: Arc<dyn Confirmer>,
    progress: Arc<dyn ProgressReporter>,
}

impl SyncEngine {
    /// Creates an engine that accepts all content, declines deletions and
    /// reports no progress
    pub fn new(
        settings: SyncSettings,
        credentials: Arc<dyn CredentialProvider>,
        vcs: Arc<dyn VersionControl>,
        transfer: Arc<dyn Transfer>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            credentials,
            vcs,
            transfer,
            policy: Arc::new(RejectedExtensions::default()),
            confirmer: Arc::new(Decline),
            progress: Arc::new(NoProgress),
        }
    }

    /// Sets the content policy
    pub fn with_policy(mut self, policy: Arc<dyn ContentPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Sets who confirms destructive recovery
    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    /// Sets the progress reporter
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Syncs every repository in order; one failure never stops the rest
    pub async fn run(&self, repositories: Vec<RepositoryRef>) -> RunReport {
        let mut report = RunReport::default();
        for repository in repositories {
            let result = self.sync_repository(repository).await;
            match &result.outcome {
                RepositoryOutcome::Verified => {
                    info!(repo = %result.repository, files = result.stats.files_fetched, bytes = result.stats.bytes_downloaded, "Repository verified");
                }
                RepositoryOutcome::Mismatched(records) => {
                    warn!(repo = %result.repository, mismatches = records.len(), "Repository failed verification");
                }
                RepositoryOutcome::Failed { error, .. } => {
                    error!(repo = %result.repository, error = %error, "Repository sync failed");
                }
            }
            report.repositories.push(result);
        }
        report
    }

    /// Syncs and verifies a single repository
    pub async fn sync_repository(&self, repository: RepositoryRef) -> RepositoryReport {
        let mut ctx = RepositoryContext::new(
            repository,
            Arc::clone(&self.settings),
            Arc::clone(&self.credentials),
        );
        let outcome = self.process(&mut ctx).await;
        RepositoryReport {
            repository: ctx.repository,
            outcome,
            stats: ctx.stats,
        }
    }

    async fn process(&self, ctx: &mut RepositoryContext) -> RepositoryOutcome {
        let failed = |error: SyncError| RepositoryOutcome::Failed {
            error,
            mismatches: Vec::new(),
        };

        if let Err(error) = self.acquire(ctx).await {
            return failed(error);
        }

        let manifest = match self.vcs.list_large_file_entries(ctx.root()).await {
            Ok(manifest) => manifest,
            Err(e) => return failed(e.into()),
        };
        let rejected = self
            .policy
            .rejected(&mut manifest.iter().map(|e| e.path.as_str()));
        if !rejected.is_empty() {
            return failed(SyncError::RejectedContent { paths: rejected });
        }

        let id = ctx.repository.id();
        self.progress.phase(&id, Phase::Fetching);
        let fetched = self.materialize_tree(ctx, &manifest).await;
        if let Err(e) = &fetched {
            warn!(repo = %id, error = %e, "Fetch aborted, verifying what is on disk");
        }

        self.progress.phase(&id, Phase::Verifying);
        let mismatches = IntegrityVerifier::new()
            .verify_all(&manifest, ctx.root())
            .await;
        ctx.mismatches = mismatches.clone();

        match fetched {
            Err(error) => RepositoryOutcome::Failed { error, mismatches },
            Ok(()) if mismatches.is_empty() => RepositoryOutcome::Verified,
            Ok(()) => RepositoryOutcome::Mismatched(mismatches),
        }
    }

    async fn probe_access(&self, ctx: &RepositoryContext) -> SyncResult<()> {
        let id = ctx.repository.id();
        self.progress.phase(&id, Phase::Probing);
        let url = tree_url(&ctx.settings.endpoint, &ctx.repository).map_err(|source| {
            SyncError::Transfer {
                path: id.clone(),
                source,
            }
        })?;

        match self.transfer.probe(&url, ctx.settings.probe_timeout).await {
            Ok(status) if status.is_success() => {
                debug!(repo = %id, "Repository is public");
            }
            Ok(status) if status.is_unauthorized() => {
                if !ctx.credentials.has_credential() {
                    return Err(SyncError::AccessDenied { repo: id });
                }
                debug!(repo = %id, "Repository is private, using configured credential");
            }
            Ok(status) if status.is_not_found() => {
                return Err(SyncError::RepositoryNotFound { repo: id });
            }
            Ok(status) => {
                warn!(repo = %id, status = status.0, "Unexpected probe status, continuing");
            }
            Err(e) => {
                warn!(repo = %id, error = %e, "Access probe failed, continuing");
            }
        }
        Ok(())
    }

    async fn inspect_destination(&self, path: &Path) -> SyncResult<Destination> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Destination::Missing),
            Err(e) => return Err(e.into()),
        };
        if !meta.is_dir() {
            return Ok(Destination::Occupied);
        }
        if tokio::fs::read_dir(path).await?.next_entry().await?.is_none() {
            return Ok(Destination::Empty);
        }
        if self.vcs.is_working_tree(path).await {
            Ok(Destination::WorkingTree)
        } else {
            Ok(Destination::Occupied)
        }
    }

    async fn acquire(&self, ctx: &RepositoryContext) -> SyncResult<()> {
        self.probe_access(ctx).await?;

        let repo = &ctx.repository;
        let id = repo.id();
        let dest = ctx.root();
        let url = repository_url(&ctx.settings.endpoint, repo).map_err(|source| {
            SyncError::Transfer {
                path: id.clone(),
                source,
            }
        })?;
        let policy = RetryPolicy::new(ctx.settings.max_attempts, ctx.settings.retry_delay);
        let vcs = self.vcs.as_ref();
        let branch = repo.branch.as_str();

        let fresh = match self.inspect_destination(dest).await? {
            Destination::Missing | Destination::Empty => {
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                self.progress.phase(&id, Phase::Cloning);
                let label = format!("clone {}", id);
                let url = url.as_str();
                policy
                    .run(&label, move |_| vcs.clone_repository(url, dest))
                    .await
                    .map_err(|f| retry_error(f, label.clone()))?;
                true
            }
            Destination::WorkingTree => {
                self.progress.phase(&id, Phase::Pulling);
                let origin = vcs.remote_url(dest).await?;
                match origin.as_deref() {
                    Some(origin) if same_remote(origin, &url) => {}
                    other => {
                        let reason = format!(
                            "origin is {} instead of {}",
                            other.unwrap_or("unset"),
                            url
                        );
                        return self.recovery_path(dest, reason).await;
                    }
                }

                if let Consistency::Corrupt(problems) = vcs.consistency_check(dest).await? {
                    let reason = format!("consistency check failed: {}", problems.join("; "));
                    return self.recovery_path(dest, reason).await;
                }

                for file in vcs.list_deleted_files(dest).await? {
                    debug!(repo = %id, path = %file, "Restoring deleted file");
                    vcs.restore(dest, &file).await?;
                }

                let label = format!("pull {}", id);
                policy
                    .run(&label, move |_| vcs.pull(dest, branch))
                    .await
                    .map_err(|f| retry_error(f, label.clone()))?;
                false
            }
            Destination::Occupied => {
                return self
                    .recovery_path(dest, "destination exists and is not a working tree".to_string())
                    .await;
            }
        };

        match vcs.checkout(dest, branch).await {
            Ok(()) => Ok(()),
            // Only a fresh clone is handed to recovery
            Err(e) if fresh => {
                let reason = format!("checkout of branch '{}' failed: {}", branch, e);
                self.recovery_path(dest, reason).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Offers deletion, then aborts the repository whatever the answer
    async fn recovery_path(&self, dest: &Path, reason: String) -> SyncResult<()> {
        let state = RecoveryController::new(self.confirmer.as_ref())
            .recover(dest, &reason)
            .await?;
        debug!(path = %dest.display(), ?state, "Recovery finished");
        Err(SyncError::RepositoryState {
            path: dest.to_path_buf(),
            reason,
        })
    }

    /// Walks the working tree and fetches every stub in traversal order
    ///
    /// Files that are real content but shorter than their manifest size are
    /// left over from an interrupted download and are resumed too.
    pub async fn materialize_tree(
        &self,
        ctx: &mut RepositoryContext,
        manifest: &[ManifestEntry],
    ) -> SyncResult<()> {
        let expected: HashMap<&str, u64> = manifest
            .iter()
            .map(|e| (e.path.as_str(), e.size))
            .collect();
        let fetcher = Fetcher::new(self.transfer.as_ref(), self.progress.as_ref());
        let root = ctx.root().to_path_buf();

        for entry in walk(&root) {
            let entry = entry?;
            if entry.kind == EntryKind::Directory {
                continue;
            }
            let state = classify(&entry.abs_path, entry.size)?;
            let task = if state.needs_fetch() {
                TransferTask::for_entry(ctx, &entry)?
            } else {
                match expected.get(entry.rel_path.as_str()) {
                    Some(&size) if entry.size < size => {
                        debug!(path = %entry.rel_path, on_disk = entry.size, expected = size, "Found interrupted download");
                        TransferTask::for_partial(ctx, &entry, size)?
                    }
                    _ => continue,
                }
            };
            fetcher.materialize(ctx, &task).await?;
        }
        Ok(())
    }
}

/// Verifies a working tree against its manifest without touching the network
pub async fn verify_tree(vcs: &dyn VersionControl, root: &Path) -> SyncResult<VerificationReport> {
    let manifest = vcs.list_large_file_entries(root).await?;
    let mismatches = IntegrityVerifier::new().verify_all(&manifest, root).await;
    Ok(VerificationReport::new(manifest.len(), mismatches))
}

/// Lists every file of a working tree with its stub state
pub fn scan_tree(root: &Path) -> SyncResult<Vec<(TreeEntry, StubState)>> {
    let mut entries = Vec::new();
    for entry in walk(root) {
        let entry = entry?;
        if entry.kind == EntryKind::File {
            let state = classify(&entry.abs_path, entry.size)?;
            entries.push((entry, state));
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::Observed;

    #[test]
    fn test_same_remote_ignores_git_suffix_and_slash() {
        assert!(same_remote(
            "https://hub.example/acme/model.git",
            "https://hub.example/acme/model"
        ));
        assert!(same_remote(
            "https://hub.example/acme/model/",
            "https://hub.example/acme/model"
        ));
        assert!(!same_remote(
            "https://hub.example/acme/other",
            "https://hub.example/acme/model"
        ));
    }

    #[test]
    fn test_run_report_success() {
        let verified = RepositoryReport {
            repository: RepositoryRef::new("a", "b", "main", "/tmp/a/b"),
            outcome: RepositoryOutcome::Verified,
            stats: TransferStats::default(),
        };
        let mut report = RunReport {
            repositories: vec![verified],
        };
        assert!(report.success());
        assert_eq!(report.exit_code(), 0);

        report.repositories.push(RepositoryReport {
            repository: RepositoryRef::new("a", "c", "main", "/tmp/a/c"),
            outcome: RepositoryOutcome::Mismatched(vec![MismatchRecord {
                path: "m.bin".to_string(),
                expected: "aa".to_string(),
                actual: Observed::Absent,
            }]),
            stats: TransferStats::default(),
        });
        assert!(!report.success());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.repositories[1].outcome.mismatches().len(), 1);
    }

    #[test]
    fn test_empty_run_is_success() {
        assert!(RunReport::default().success());
    }

    #[test]
    fn test_scan_tree_classifies_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), [b'x'; 80]).unwrap();
        std::fs::write(dir.path().join("empty"), b"").unwrap();
        std::fs::write(
            dir.path().join("model.bin"),
            lfsync_git::PointerFile::new("ab".repeat(32), 10).to_string(),
        )
        .unwrap();

        let states: Vec<(String, StubState)> = scan_tree(dir.path())
            .unwrap()
            .into_iter()
            .map(|(e, s)| (e.rel_path, s))
            .collect();
        assert_eq!(
            states,
            vec![
                ("a.txt".to_string(), StubState::Materialized),
                ("empty".to_string(), StubState::Empty),
                ("model.bin".to_string(), StubState::UnresolvedStub),
            ]
        );
    }
}
