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

//! Version-control collaborator
//!
//! [`VersionControl`] is the seam the sync engine talks to. [`Git2Backend`]
//! implements it with `git2`; every libgit2 call runs on the blocking pool
//! and is awaited before the caller continues.
//!
//! LFS filters are never configured, so clones and checkouts leave pointer
//! stubs in the working tree for the fetcher to materialize.

use crate::error::{GitError, GitResult};
use crate::manifest::{open_working_tree, read_manifest, ManifestEntry};
use async_trait::async_trait;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Cred, CredentialType, ErrorClass, ErrorCode, FetchOptions, ObjectType,
    Commit, RemoteCallbacks, Repository, Status, StatusOptions, Tree, TreeWalkMode,
    TreeWalkResult,
};
use lfsync_config::CredentialProvider;
use secrecy::ExposeSecret;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a repository consistency check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consistency {
    /// All reachable objects are present and readable
    Ok,
    /// Problems found, one human-readable line each
    Corrupt(Vec<String>),
}

impl Consistency {
    /// True when no problems were found
    pub fn is_ok(&self) -> bool {
        matches!(self, Consistency::Ok)
    }
}

/// Operations the sync engine needs from version control
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `url` into `dest`, which must be missing or empty
    async fn clone_repository(&self, url: &str, dest: &Path) -> GitResult<()>;

    /// Fetch `branch` from `origin` and fast-forward the working tree to it
    async fn pull(&self, path: &Path, branch: &str) -> GitResult<()>;

    /// Switch the working tree to `branch`, creating it from `origin` if needed
    async fn checkout(&self, path: &Path, branch: &str) -> GitResult<()>;

    /// Verify that the object database and HEAD are intact
    async fn consistency_check(&self, path: &Path) -> GitResult<Consistency>;

    /// Tracked files missing from the working tree
    async fn list_deleted_files(&self, path: &Path) -> GitResult<Vec<String>>;

    /// Restore one tracked file from the index
    async fn restore(&self, path: &Path, file: &str) -> GitResult<()>;

    /// LFS pointer entries of the checked-out revision
    async fn list_large_file_entries(&self, path: &Path) -> GitResult<Vec<ManifestEntry>>;

    /// URL of the `origin` remote, if configured
    async fn remote_url(&self, path: &Path) -> GitResult<Option<String>>;

    /// Whether `path` itself is the root of a non-bare working tree
    async fn is_working_tree(&self, path: &Path) -> bool;
}

/// `git2` implementation of [`VersionControl`]
pub struct Git2Backend {
    credentials: Arc<dyn CredentialProvider>,
    username: String,
}

impl Git2Backend {
    /// Creates a backend that authenticates with `credentials` when the
    /// remote asks for it
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credentials,
            username: "git".to_string(),
        }
    }

    /// Overrides the username sent alongside the token
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    fn auth(&self) -> (Arc<dyn CredentialProvider>, String) {
        (Arc::clone(&self.credentials), self.username.clone())
    }
}

impl std::fmt::Debug for Git2Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git2Backend")
            .field("username", &self.username)
            .field("has_credential", &self.credentials.has_credential())
            .finish()
    }
}

fn fetch_options(
    credentials: Arc<dyn CredentialProvider>,
    username: String,
) -> FetchOptions<'static> {
    let mut callbacks = RemoteCallbacks::new();
    let mut asked = false;
    callbacks.credentials(move |_url, username_from_url, allowed| {
        // libgit2 keeps asking while the server rejects; answer once only
        if asked {
            return Err(git2::Error::new(
                ErrorCode::Auth,
                ErrorClass::Http,
                "credentials rejected by remote",
            ));
        }
        asked = true;
        match credentials.bearer_token() {
            Some(token) if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) => {
                Cred::userpass_plaintext(
                    username_from_url.unwrap_or(&username),
                    token.expose_secret(),
                )
            }
            _ => Err(git2::Error::new(
                ErrorCode::Auth,
                ErrorClass::Http,
                "remote requires authentication but no credential is configured",
            )),
        }
    });
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    fetch
}

async fn blocking<T, F>(f: F) -> GitResult<T>
where
    F: FnOnce() -> GitResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GitError::TaskJoin(e.to_string()))?
}

#[async_trait]
impl VersionControl for Git2Backend {
    async fn clone_repository(&self, url: &str, dest: &Path) -> GitResult<()> {
        let url = url.to_string();
        let dest = dest.to_path_buf();
        let (credentials, username) = self.auth();
        blocking(move || {
            info!(url = %url, dest = %dest.display(), "Cloning repository");
            let mut builder = RepoBuilder::new();
            builder.fetch_options(fetch_options(credentials, username));
            match builder.clone(&url, &dest) {
                Ok(_) => Ok(()),
                Err(e) => {
                    discard_partial_clone(&dest);
                    Err(e.into())
                }
            }
        })
        .await
    }

    async fn pull(&self, path: &Path, branch: &str) -> GitResult<()> {
        let path = path.to_path_buf();
        let branch = branch.to_string();
        let (credentials, username) = self.auth();
        blocking(move || {
            let repo = open_working_tree(&path)?;
            let mut fetch = fetch_options(credentials, username);
            let mut remote = repo.find_remote("origin")?;
            let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", branch);
            debug!(branch = %branch, "Fetching from origin");
            remote.fetch(&[refspec.as_str()], Some(&mut fetch), None)?;

            let target = repo
                .find_reference(&format!("refs/remotes/origin/{}", branch))
                .map_err(|_| GitError::BranchNotFound(branch.clone()))?
                .peel_to_commit()?;

            let head = match repo.head() {
                Ok(head) if head.is_branch() && head.shorthand() == Some(branch.as_str()) => head,
                _ => {
                    debug!(branch = %branch, "Branch not checked out, leaving update to checkout");
                    return Ok(());
                }
            };
            let current = head.peel_to_commit()?;
            if current.id() == target.id() {
                debug!(branch = %branch, "Already up to date");
                return Ok(());
            }

            let changed = checkout_changed_paths(&repo, &current.tree()?, &target)?;
            repo.reference(
                &format!("refs/heads/{}", branch),
                target.id(),
                true,
                "lfsync: pull",
            )?;
            info!(branch = %branch, commit = %target.id(), changed, "Updated working tree");
            Ok(())
        })
        .await
    }

    async fn checkout(&self, path: &Path, branch: &str) -> GitResult<()> {
        let path = path.to_path_buf();
        let branch = branch.to_string();
        blocking(move || {
            let repo = open_working_tree(&path)?;
            let refname = format!("refs/heads/{}", branch);
            let on_branch = repo
                .head()
                .map(|head| head.name() == Some(refname.as_str()))
                .unwrap_or(false);

            // The local branch mirrors origin; move it before switching to it
            if !on_branch {
                let upstream = format!("origin/{}", branch);
                match repo.find_branch(&upstream, BranchType::Remote) {
                    Ok(remote) => {
                        let commit = remote.get().peel_to_commit()?;
                        let mut local = repo.branch(&branch, &commit, true)?;
                        local.set_upstream(Some(upstream.as_str()))?;
                        debug!(branch = %branch, commit = %commit.id(), "Local branch set from origin");
                    }
                    Err(_) if repo.find_branch(&branch, BranchType::Local).is_ok() => {}
                    Err(_) => return Err(GitError::BranchNotFound(branch.clone())),
                }
            }

            let to_checkout_error = |e: git2::Error| GitError::Checkout {
                branch: branch.clone(),
                reason: e.message().to_string(),
            };
            let target = repo
                .find_reference(&refname)
                .and_then(|reference| reference.peel_to_commit())
                .map_err(to_checkout_error)?;
            match repo.head().and_then(|head| head.peel_to_tree()) {
                Ok(current) => {
                    let changed = checkout_changed_paths(&repo, &current, &target)
                        .map_err(to_checkout_error)?;
                    debug!(branch = %branch, changed, "Switched changed paths");
                }
                Err(_) => {
                    let mut opts = CheckoutBuilder::new();
                    opts.safe();
                    repo.checkout_tree(target.as_object(), Some(&mut opts))
                        .map_err(to_checkout_error)?;
                }
            }
            repo.set_head(&refname).map_err(to_checkout_error)?;
            debug!(branch = %branch, "Checked out branch");
            Ok(())
        })
        .await
    }

    async fn consistency_check(&self, path: &Path) -> GitResult<Consistency> {
        let path = path.to_path_buf();
        blocking(move || check_repository(&path)).await
    }

    async fn list_deleted_files(&self, path: &Path) -> GitResult<Vec<String>> {
        let path = path.to_path_buf();
        blocking(move || {
            let repo = open_working_tree(&path)?;
            let mut opts = StatusOptions::new();
            opts.include_untracked(false).include_ignored(false);
            let statuses = repo.statuses(Some(&mut opts))?;
            Ok(statuses
                .iter()
                .filter(|s| s.status().contains(Status::WT_DELETED))
                .filter_map(|s| s.path().map(str::to_string))
                .collect())
        })
        .await
    }

    async fn restore(&self, path: &Path, file: &str) -> GitResult<()> {
        let path = path.to_path_buf();
        let file = file.to_string();
        blocking(move || {
            let repo = open_working_tree(&path)?;
            let mut opts = CheckoutBuilder::new();
            opts.force().path(file.as_str());
            repo.checkout_index(None, Some(&mut opts))?;
            debug!(file = %file, "Restored deleted file");
            Ok(())
        })
        .await
    }

    async fn list_large_file_entries(&self, path: &Path) -> GitResult<Vec<ManifestEntry>> {
        let path = path.to_path_buf();
        blocking(move || {
            let repo = open_working_tree(&path)?;
            read_manifest(&repo)
        })
        .await
    }

    async fn remote_url(&self, path: &Path) -> GitResult<Option<String>> {
        let path = path.to_path_buf();
        blocking(move || {
            let repo = open_working_tree(&path)?;
            let url = match repo.find_remote("origin") {
                Ok(remote) => remote.url().map(str::to_string),
                Err(e) if e.code() == ErrorCode::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            Ok(url)
        })
        .await
    }

    async fn is_working_tree(&self, path: &Path) -> bool {
        let path = path.to_path_buf();
        blocking(move || open_working_tree(&path).map(|_| ()))
            .await
            .is_ok()
    }
}

/// Force-checks out only the paths that differ between `from` and `to`
///
/// Materialized content at unchanged paths stays in place; changed large
/// files go back to their pointer text and are fetched again.
fn checkout_changed_paths(
    repo: &Repository,
    from: &Tree<'_>,
    to: &Commit<'_>,
) -> Result<usize, git2::Error> {
    let diff = repo.diff_tree_to_tree(Some(from), Some(&to.tree()?), None)?;
    let mut opts = CheckoutBuilder::new();
    opts.force();
    let mut changed = 0usize;
    for delta in diff.deltas() {
        for file in [delta.old_file().path(), delta.new_file().path()]
            .into_iter()
            .flatten()
        {
            opts.path(file);
            changed += 1;
        }
    }
    if changed > 0 {
        repo.checkout_tree(to.as_object(), Some(&mut opts))?;
    }
    Ok(changed)
}

fn discard_partial_clone(dest: &Path) {
    let git_dir = dest.join(".git");
    if git_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(&git_dir) {
            warn!(path = %git_dir.display(), error = %e, "Failed to remove partial clone");
        }
    }
}

fn check_repository(path: &Path) -> GitResult<Consistency> {
    let repo = open_working_tree(path)?;
    let mut problems = Vec::new();

    let odb = repo.odb()?;
    let mut ids = Vec::new();
    odb.foreach(|id| {
        ids.push(*id);
        true
    })?;
    for id in &ids {
        if let Err(e) = odb.read(*id) {
            problems.push(format!("object {} unreadable: {}", id, e.message()));
        }
    }

    match repo.head() {
        Ok(head) => match head.peel_to_tree() {
            Ok(tree) => {
                tree.walk(TreeWalkMode::PreOrder, |root, entry| {
                    if entry.kind() == Some(ObjectType::Blob) && !odb.exists(entry.id()) {
                        problems.push(format!(
                            "missing blob {} for {}{}",
                            entry.id(),
                            root,
                            entry.name().unwrap_or("<non-utf8>")
                        ));
                    }
                    TreeWalkResult::Ok
                })?;
            }
            Err(e) => problems.push(format!("HEAD does not resolve to a tree: {}", e.message())),
        },
        Err(e) if e.code() == ErrorCode::UnbornBranch => {}
        Err(e) => problems.push(format!("HEAD unreadable: {}", e.message())),
    }

    if let Err(e) = repo.index() {
        problems.push(format!("index unreadable: {}", e.message()));
    }

    if problems.is_empty() {
        debug!(objects = ids.len(), "Repository is consistent");
        Ok(Consistency::Ok)
    } else {
        warn!(count = problems.len(), "Repository consistency check failed");
        Ok(Consistency::Corrupt(problems))
    }
}
