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

//! Integration tests for the git2 backend against local upstream repositories

use git2::{Repository, Signature};
use lfsync_config::NoCredential;
use lfsync_git::{Consistency, Git2Backend, GitError, PointerFile, VersionControl};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const MODEL_OID: &str = "4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393";

/// Writes files into the upstream work tree and commits them on `main`
fn commit(repo: &Repository, files: &[(&str, &[u8])], message: &str) {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full = workdir.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test User", "test@example.com").unwrap();
    let parent = repo
        .find_reference("refs/heads/main")
        .ok()
        .and_then(|r| r.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("refs/heads/main"), &sig, &sig, message, &tree, &parents)
        .unwrap();
    repo.set_head("refs/heads/main").unwrap();
}

fn upstream() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let pointer = PointerFile::new(MODEL_OID.to_string(), 4096).to_string();
    commit(
        &repo,
        &[("a.txt", b"first"), ("model.bin", pointer.as_bytes())],
        "initial",
    );
    (dir, repo)
}

fn backend() -> Git2Backend {
    Git2Backend::new(Arc::new(NoCredential))
}

#[tokio::test]
async fn test_clone_leaves_pointer_stubs() {
    let (up_dir, _up) = upstream();
    let work = TempDir::new().unwrap();
    let dest = work.path().join("clone");
    let url = up_dir.path().to_str().unwrap();

    let git = backend();
    git.clone_repository(url, &dest).await.unwrap();

    assert!(git.is_working_tree(&dest).await);
    let stub = fs::read(dest.join("model.bin")).unwrap();
    assert!(PointerFile::is_pointer(&stub));
    assert_eq!(git.remote_url(&dest).await.unwrap().as_deref(), Some(url));

    let manifest = git.list_large_file_entries(&dest).await.unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].path, "model.bin");
    assert_eq!(manifest[0].oid, MODEL_OID);
    assert_eq!(manifest[0].size, 4096);

    assert_eq!(git.consistency_check(&dest).await.unwrap(), Consistency::Ok);
}

#[tokio::test]
async fn test_checkout_unknown_branch_fails() {
    let (up_dir, _up) = upstream();
    let work = TempDir::new().unwrap();
    let dest = work.path().join("clone");
    let git = backend();
    git.clone_repository(up_dir.path().to_str().unwrap(), &dest)
        .await
        .unwrap();

    git.checkout(&dest, "main").await.unwrap();
    let err = git.checkout(&dest, "does-not-exist").await.unwrap_err();
    assert!(matches!(err, GitError::BranchNotFound(b) if b == "does-not-exist"));
}

#[tokio::test]
async fn test_pull_keeps_materialized_content() {
    let (up_dir, up) = upstream();
    let work = TempDir::new().unwrap();
    let dest = work.path().join("clone");
    let git = backend();
    git.clone_repository(up_dir.path().to_str().unwrap(), &dest)
        .await
        .unwrap();

    fs::write(dest.join("model.bin"), vec![7u8; 4096]).unwrap();
    commit(&up, &[("a.txt", b"second")], "update text");

    git.pull(&dest, "main").await.unwrap();
    git.checkout(&dest, "main").await.unwrap();

    assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"second");
    assert_eq!(fs::read(dest.join("model.bin")).unwrap(), vec![7u8; 4096]);
}

#[tokio::test]
async fn test_branch_switch_over_materialized_content() {
    let (up_dir, up) = upstream();
    {
        let head = up.head().unwrap().peel_to_commit().unwrap();
        up.branch("dev", &head, false).unwrap();
    }
    let v2 = PointerFile::new("b".repeat(64), 8192).to_string();
    commit(&up, &[("model.bin", v2.as_bytes())], "new weights");

    let work = TempDir::new().unwrap();
    let dest = work.path().join("clone");
    let git = backend();
    git.clone_repository(up_dir.path().to_str().unwrap(), &dest)
        .await
        .unwrap();
    git.checkout(&dest, "main").await.unwrap();
    fs::write(dest.join("model.bin"), vec![9u8; 8192]).unwrap();

    git.pull(&dest, "dev").await.unwrap();
    git.checkout(&dest, "dev").await.unwrap();

    let stub = fs::read(dest.join("model.bin")).unwrap();
    let pointer = PointerFile::from_bytes(&stub).unwrap();
    assert_eq!(pointer.oid, MODEL_OID);
    assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"first");
    let repo = Repository::open(&dest).unwrap();
    assert_eq!(repo.head().unwrap().shorthand(), Some("dev"));
    assert_eq!(git.consistency_check(&dest).await.unwrap(), Consistency::Ok);
}

#[tokio::test]
async fn test_restore_deleted_files() {
    let (up_dir, _up) = upstream();
    let work = TempDir::new().unwrap();
    let dest = work.path().join("clone");
    let git = backend();
    git.clone_repository(up_dir.path().to_str().unwrap(), &dest)
        .await
        .unwrap();

    fs::remove_file(dest.join("a.txt")).unwrap();
    let deleted = git.list_deleted_files(&dest).await.unwrap();
    assert_eq!(deleted, vec!["a.txt".to_string()]);

    git.restore(&dest, "a.txt").await.unwrap();
    assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"first");
    assert!(git.list_deleted_files(&dest).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_repository_paths() {
    let dir = TempDir::new().unwrap();
    let git = backend();
    assert!(!git.is_working_tree(dir.path()).await);
    assert!(matches!(
        git.list_large_file_entries(dir.path()).await,
        Err(GitError::NotATrackedRepository(_))
    ));
}
