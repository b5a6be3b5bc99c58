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

//! Resolver and fetcher
//!
//! Maps working-tree paths to remote URLs and drives each transfer through
//! the retry policy. Every attempt recomputes its resume offset from what
//! is on disk at that moment:
//!
//! - the file still holds a stub or is empty: download from scratch
//! - the file holds at least `resume_threshold` bytes of content: request
//!   `Range: bytes=<len>-` and append
//! - anything smaller: download from scratch

use crate::classify::{classify, StubState};
use crate::context::{RepositoryContext, RepositoryRef};
use crate::error::{SyncError, SyncResult, TransferError};
use crate::progress::ProgressReporter;
use crate::retry::{RetryFailure, RetryPolicy};
use crate::transfer::{FetchOutcome, FetchRequest, Transfer};
use crate::walker::TreeEntry;
use lfsync_git::{PointerFile, MAX_POINTER_SIZE};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info};

fn build_url<'a>(
    endpoint: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<String, TransferError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| TransferError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| TransferError::InvalidUrl(endpoint.to_string()))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url.into())
}

/// `<endpoint>/<owner>/<name>`, also the clone URL
pub fn repository_url(endpoint: &str, repo: &RepositoryRef) -> Result<String, TransferError> {
    build_url(endpoint, [repo.owner.as_str(), repo.name.as_str()])
}

/// `<endpoint>/<owner>/<name>/tree/<branch>`, used to probe access
pub fn tree_url(endpoint: &str, repo: &RepositoryRef) -> Result<String, TransferError> {
    build_url(
        endpoint,
        [
            repo.owner.as_str(),
            repo.name.as_str(),
            "tree",
            repo.branch.as_str(),
        ],
    )
}

/// `<endpoint>/<owner>/<name>/resolve/<branch>/<path>` with each path
/// segment percent-encoded
pub fn resolve_url(
    endpoint: &str,
    repo: &RepositoryRef,
    rel_path: &str,
) -> Result<String, TransferError> {
    let head = [
        repo.owner.as_str(),
        repo.name.as_str(),
        "resolve",
        repo.branch.as_str(),
    ];
    build_url(endpoint, head.into_iter().chain(rel_path.split('/')))
}

/// Offset to resume from, or `None` to download from scratch
pub fn resume_offset(on_disk: u64, threshold: u64, holds_stub: bool) -> Option<u64> {
    if holds_stub || on_disk == 0 || on_disk < threshold {
        None
    } else {
        Some(on_disk)
    }
}

fn current_resume_offset(path: &Path, threshold: u64) -> std::io::Result<Option<u64>> {
    let len = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let holds_stub = classify(path, len)?.needs_fetch();
    Ok(resume_offset(len, threshold, holds_stub))
}

/// A queued download for one working-tree file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// Repository-relative path
    pub rel_path: String,
    /// File to write
    pub local_path: PathBuf,
    /// Resolve URL
    pub url: String,
    /// Bytes on disk when the task was created
    pub partial_size: u64,
    /// Full size, from the stub body or the manifest
    pub expected_size: Option<u64>,
}

impl TransferTask {
    /// Task for a stub or empty file found by the walker
    pub fn for_entry(ctx: &RepositoryContext, entry: &TreeEntry) -> SyncResult<Self> {
        let url = resolve_url(&ctx.settings.endpoint, &ctx.repository, &entry.rel_path)
            .map_err(|source| SyncError::Transfer {
                path: entry.rel_path.clone(),
                source,
            })?;
        let expected_size = if entry.size > 0 && entry.size <= MAX_POINTER_SIZE as u64 {
            std::fs::read(&entry.abs_path)
                .ok()
                .and_then(|bytes| PointerFile::from_bytes(&bytes))
                .map(|pointer| pointer.size)
        } else {
            None
        };
        Ok(Self {
            rel_path: entry.rel_path.clone(),
            local_path: entry.abs_path.clone(),
            url,
            partial_size: entry.size,
            expected_size,
        })
    }

    /// Task for content left short by an interrupted download
    pub fn for_partial(
        ctx: &RepositoryContext,
        entry: &TreeEntry,
        expected_size: u64,
    ) -> SyncResult<Self> {
        let mut task = Self::for_entry(ctx, entry)?;
        task.expected_size = Some(expected_size);
        Ok(task)
    }
}

/// Materializes transfer tasks through a [`Transfer`]
pub struct Fetcher<'a> {
    transfer: &'a dyn Transfer,
    progress: &'a dyn ProgressReporter,
}

impl<'a> Fetcher<'a> {
    /// Creates a fetcher over the given transfer layer
    pub fn new(transfer: &'a dyn Transfer, progress: &'a dyn ProgressReporter) -> Self {
        Self { transfer, progress }
    }

    /// Downloads `task`, retrying transient failures
    ///
    /// # Errors
    ///
    /// [`SyncError::Transfer`] for a fatal response and
    /// [`SyncError::RetriesExhausted`] once the attempt bound is reached.
    pub async fn materialize(
        &self,
        ctx: &mut RepositoryContext,
        task: &TransferTask,
    ) -> SyncResult<()> {
        let policy = RetryPolicy::new(ctx.settings.max_attempts, ctx.settings.retry_delay);
        let threshold = ctx.settings.resume_threshold;
        let token = ctx.credentials.bearer_token();
        let bearer = token.as_ref();
        let attempts = AtomicU32::new(0);
        let attempt_counter = &attempts;
        let label = format!("fetch {}", task.rel_path);

        debug!(
            path = %task.rel_path,
            url = %task.url,
            partial = task.partial_size,
            expected = ?task.expected_size,
            "Fetching"
        );

        let result = policy
            .run(&label, move |attempt| {
                attempt_counter.store(attempt, Ordering::Relaxed);
                async move {
                    let resume_from = current_resume_offset(&task.local_path, threshold)?;
                    if let Some(offset) = resume_from {
                        debug!(path = %task.rel_path, attempt, offset, "Resuming partial download");
                    }
                    let request = FetchRequest {
                        url: &task.url,
                        dest: &task.local_path,
                        resume_from,
                        bearer,
                        display_path: &task.rel_path,
                        expected_size: task.expected_size,
                    };
                    self.transfer.fetch(&request, self.progress).await
                }
            })
            .await;

        ctx.stats.attempts += attempts.load(Ordering::Relaxed);
        self.progress.transfer_finished(&task.rel_path, result.is_ok());

        match result {
            Ok(FetchOutcome::Downloaded { bytes, resumed }) => {
                ctx.stats.files_fetched += 1;
                ctx.stats.bytes_downloaded += bytes;
                if resumed {
                    ctx.stats.resumed_transfers += 1;
                }
                info!(path = %task.rel_path, bytes, resumed, "Fetched");
                Ok(())
            }
            Ok(FetchOutcome::AlreadyComplete) => {
                ctx.stats.files_fetched += 1;
                info!(path = %task.rel_path, "Already complete on disk");
                Ok(())
            }
            Err(RetryFailure::Fatal { error, .. }) => Err(SyncError::Transfer {
                path: task.rel_path.clone(),
                source: error,
            }),
            Err(RetryFailure::Exhausted { attempts, last }) => Err(SyncError::RetriesExhausted {
                operation: label,
                attempts,
                last: last.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SyncSettings;
    use crate::progress::NoProgress;
    use crate::transfer::ProbeStatus;
    use crate::walker::EntryKind;
    use async_trait::async_trait;
    use lfsync_config::{CredentialProvider, NoCredential};
    use secrecy::{ExposeSecret, SecretString};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    const STUB: &str = "version https://git-lfs.github.com/spec/v1\noid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393\nsize 4096\n";

    fn repo(dest: &Path) -> RepositoryRef {
        RepositoryRef::new("acme", "model", "main", dest)
    }

    fn context(dest: &Path, max_attempts: u32) -> RepositoryContext {
        let settings = SyncSettings {
            endpoint: "https://hub.example".to_string(),
            max_attempts,
            retry_delay: Duration::ZERO,
            resume_threshold: 1024,
            probe_timeout: Duration::from_secs(1),
        };
        RepositoryContext::new(repo(dest), Arc::new(settings), Arc::new(NoCredential))
    }

    fn entry(root: &Path, rel: &str) -> TreeEntry {
        let abs_path = root.join(rel);
        let size = std::fs::metadata(&abs_path).map(|m| m.len()).unwrap_or(0);
        TreeEntry {
            rel_path: rel.to_string(),
            abs_path,
            kind: EntryKind::File,
            size,
        }
    }

    /// Scripted transfer: each call pops the next action and records the
    /// offset it was asked to resume from
    struct ScriptedTransfer {
        content: Vec<u8>,
        script: Mutex<Vec<Action>>,
        offsets: Mutex<Vec<Option<u64>>>,
        bearers: Mutex<Vec<Option<String>>>,
    }

    #[derive(Clone, Copy)]
    enum Action {
        /// Write this many bytes from the requested offset, then fail transiently
        Partial(usize),
        /// Serve the rest of the content
        Complete,
        /// Answer with this status
        Status(u16),
    }

    impl ScriptedTransfer {
        fn new(content: Vec<u8>, mut script: Vec<Action>) -> Self {
            script.reverse();
            Self {
                content,
                script: Mutex::new(script),
                offsets: Mutex::new(Vec::new()),
                bearers: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transfer for ScriptedTransfer {
        async fn fetch(
            &self,
            request: &FetchRequest<'_>,
            _progress: &dyn ProgressReporter,
        ) -> Result<FetchOutcome, TransferError> {
            self.offsets.lock().unwrap().push(request.resume_from);
            self.bearers
                .lock()
                .unwrap()
                .push(request.bearer.map(|token| token.expose_secret().clone()));
            let action = self.script.lock().unwrap().pop().unwrap_or(Action::Complete);
            let start = request.resume_from.unwrap_or(0) as usize;
            let mut data = if start == 0 {
                Vec::new()
            } else {
                std::fs::read(request.dest)?
            };
            match action {
                Action::Partial(n) => {
                    data.extend_from_slice(&self.content[start..start + n]);
                    std::fs::write(request.dest, &data)?;
                    Err(TransferError::Status {
                        url: request.url.to_string(),
                        status: 503,
                    })
                }
                Action::Complete => {
                    data.extend_from_slice(&self.content[start..]);
                    std::fs::write(request.dest, &data)?;
                    Ok(FetchOutcome::Downloaded {
                        bytes: (self.content.len() - start) as u64,
                        resumed: start > 0,
                    })
                }
                Action::Status(status) => Err(TransferError::Status {
                    url: request.url.to_string(),
                    status,
                }),
            }
        }

        async fn probe(&self, _url: &str, _timeout: Duration) -> Result<ProbeStatus, TransferError> {
            Ok(ProbeStatus(200))
        }
    }

    #[test]
    fn test_resolve_url_encodes_segments() {
        let r = repo(Path::new("/tmp/x"));
        assert_eq!(
            resolve_url("https://hub.example", &r, "weights/my model.bin").unwrap(),
            "https://hub.example/acme/model/resolve/main/weights/my%20model.bin"
        );
        assert_eq!(
            tree_url("https://hub.example/", &r).unwrap(),
            "https://hub.example/acme/model/tree/main"
        );
        assert_eq!(
            repository_url("https://hub.example", &r).unwrap(),
            "https://hub.example/acme/model"
        );
    }

    #[test]
    fn test_resume_threshold_boundary() {
        assert_eq!(resume_offset(0, 1024, false), None);
        assert_eq!(resume_offset(1023, 1024, false), None);
        assert_eq!(resume_offset(1024, 1024, false), Some(1024));
        assert_eq!(resume_offset(4000, 1024, false), Some(4000));
        assert_eq!(resume_offset(4000, 1024, true), None);
        assert_eq!(resume_offset(100, 40, false), Some(100));
    }

    #[test]
    fn test_task_reads_stub_size() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("model.bin"), STUB).unwrap();
        let ctx = context(dir.path(), 3);
        let task = TransferTask::for_entry(&ctx, &entry(dir.path(), "model.bin")).unwrap();
        assert_eq!(task.expected_size, Some(4096));
        assert_eq!(task.partial_size, STUB.len() as u64);
        assert_eq!(
            task.url,
            "https://hub.example/acme/model/resolve/main/model.bin"
        );
    }

    #[tokio::test]
    async fn test_stub_is_replaced_from_scratch() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("model.bin"), STUB).unwrap();
        let content = vec![42u8; 4096];
        let transfer = ScriptedTransfer::new(content.clone(), vec![Action::Complete]);

        let mut ctx = context(dir.path(), 3);
        let task = TransferTask::for_entry(&ctx, &entry(dir.path(), "model.bin")).unwrap();
        Fetcher::new(&transfer, &NoProgress)
            .materialize(&mut ctx, &task)
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("model.bin")).unwrap(), content);
        assert_eq!(*transfer.offsets.lock().unwrap(), vec![None]);
        assert_eq!(*transfer.bearers.lock().unwrap(), vec![None]);
        assert_eq!(ctx.stats.files_fetched, 1);
        assert_eq!(ctx.stats.resumed_transfers, 0);
    }

    #[tokio::test]
    async fn test_retry_resumes_from_bytes_on_disk() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("model.bin"), STUB).unwrap();
        let content: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
        // 500 bytes stay below the threshold, 2000 more cross it
        let transfer = ScriptedTransfer::new(
            content.clone(),
            vec![Action::Partial(500), Action::Partial(2000), Action::Complete],
        );

        let mut ctx = context(dir.path(), 5);
        let task = TransferTask::for_entry(&ctx, &entry(dir.path(), "model.bin")).unwrap();
        Fetcher::new(&transfer, &NoProgress)
            .materialize(&mut ctx, &task)
            .await
            .unwrap();

        assert_eq!(
            *transfer.offsets.lock().unwrap(),
            vec![None, None, Some(2000)]
        );
        assert_eq!(std::fs::read(dir.path().join("model.bin")).unwrap(), content);
        assert_eq!(ctx.stats.attempts, 3);
        assert_eq!(ctx.stats.resumed_transfers, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_repository() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("model.bin"), STUB).unwrap();
        let transfer = ScriptedTransfer::new(vec![0u8; 10], vec![Action::Status(503); 4]);

        let mut ctx = context(dir.path(), 4);
        let task = TransferTask::for_entry(&ctx, &entry(dir.path(), "model.bin")).unwrap();
        let err = Fetcher::new(&transfer, &NoProgress)
            .materialize(&mut ctx, &task)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(transfer.offsets.lock().unwrap().len(), 4);
        assert_eq!(ctx.stats.files_fetched, 0);
    }

    #[tokio::test]
    async fn test_not_found_is_fatal_immediately() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("model.bin"), STUB).unwrap();
        let transfer = ScriptedTransfer::new(vec![0u8; 10], vec![Action::Status(404)]);

        let mut ctx = context(dir.path(), 10);
        let task = TransferTask::for_entry(&ctx, &entry(dir.path(), "model.bin")).unwrap();
        let err = Fetcher::new(&transfer, &NoProgress)
            .materialize(&mut ctx, &task)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Transfer { source: TransferError::Status { status: 404, .. }, .. }
        ));
        assert_eq!(transfer.offsets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        struct Token;
        impl CredentialProvider for Token {
            fn bearer_token(&self) -> Option<SecretString> {
                Some(SecretString::new("hf_secret".to_string()))
            }
            fn has_credential(&self) -> bool {
                true
            }
        }

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("empty"), b"").unwrap();
        let transfer = ScriptedTransfer::new(Vec::new(), vec![Action::Complete]);
        let mut ctx = context(dir.path(), 1);
        ctx.credentials = Arc::new(Token);

        let task = TransferTask::for_entry(&ctx, &entry(dir.path(), "empty")).unwrap();
        Fetcher::new(&transfer, &NoProgress)
            .materialize(&mut ctx, &task)
            .await
            .unwrap();
        assert_eq!(
            *transfer.bearers.lock().unwrap(),
            vec![Some("hf_secret".to_string())]
        );
    }
}
