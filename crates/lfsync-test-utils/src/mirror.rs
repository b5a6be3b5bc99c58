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

//! Version-control backend that clones hub URLs from local directories.

use async_trait::async_trait;
use lfsync_config::NoCredential;
use lfsync_git::{Consistency, Git2Backend, GitResult, ManifestEntry, VersionControl};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Maps `<endpoint>/<owner>/<name>` to `<hub>/<owner>/<name>` and delegates
/// everything else to [`Git2Backend`].
///
/// `remote_url` maps the local origin back to the endpoint form, so the
/// engine sees the same URLs it would against a real remote.
pub struct LocalMirror {
    endpoint: String,
    hub: PathBuf,
    inner: Git2Backend,
    clones: AtomicUsize,
    pulls: AtomicUsize,
}

impl LocalMirror {
    /// Mirror `endpoint` onto the repositories under `hub`.
    pub fn new(endpoint: impl Into<String>, hub: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            hub: hub.into(),
            inner: Git2Backend::new(Arc::new(NoCredential)),
            clones: AtomicUsize::new(0),
            pulls: AtomicUsize::new(0),
        }
    }

    /// Number of clone calls.
    pub fn clone_count(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    /// Number of pull calls.
    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    fn to_local(&self, url: &str) -> String {
        let local = url
            .strip_prefix(&self.endpoint)
            .map(|rest| rest.trim_matches('/'))
            .filter(|rest| !rest.is_empty())
            .map(|rest| self.hub.join(rest));
        match local {
            Some(path) => path.to_string_lossy().into_owned(),
            None => url.to_string(),
        }
    }

    fn to_remote(&self, origin: String) -> String {
        match Path::new(&origin).strip_prefix(&self.hub) {
            Ok(rel) => {
                let rel: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                format!("{}/{}", self.endpoint, rel.join("/"))
            }
            Err(_) => origin,
        }
    }
}

#[async_trait]
impl VersionControl for LocalMirror {
    async fn clone_repository(&self, url: &str, dest: &Path) -> GitResult<()> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        let local = self.to_local(url);
        self.inner.clone_repository(&local, dest).await
    }

    async fn pull(&self, path: &Path, branch: &str) -> GitResult<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.inner.pull(path, branch).await
    }

    async fn checkout(&self, path: &Path, branch: &str) -> GitResult<()> {
        self.inner.checkout(path, branch).await
    }

    async fn consistency_check(&self, path: &Path) -> GitResult<Consistency> {
        self.inner.consistency_check(path).await
    }

    async fn list_deleted_files(&self, path: &Path) -> GitResult<Vec<String>> {
        self.inner.list_deleted_files(path).await
    }

    async fn restore(&self, path: &Path, file: &str) -> GitResult<()> {
        self.inner.restore(path, file).await
    }

    async fn list_large_file_entries(&self, path: &Path) -> GitResult<Vec<ManifestEntry>> {
        self.inner.list_large_file_entries(path).await
    }

    async fn remote_url(&self, path: &Path) -> GitResult<Option<String>> {
        Ok(self
            .inner
            .remote_url(path)
            .await?
            .map(|origin| self.to_remote(origin)))
    }

    async fn is_working_tree(&self, path: &Path) -> bool {
        self.inner.is_working_tree(path).await
    }
}
