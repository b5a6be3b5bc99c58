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

//! Upstream repositories for integration tests.
//!
//! A [`TestHub`] is a temporary directory holding repositories at
//! `<hub>/<owner>/<name>`, the same layout the remote uses in its URLs.
//! [`UpstreamRepo`] commits plain files as they are and large files as LFS
//! pointers, remembering the real content so a resolve server can serve it.

use git2::{Repository, Signature};
use lfsync_git::PointerFile;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directory of upstream repositories, removed on drop.
pub struct TestHub {
    temp_dir: TempDir,
}

impl TestHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Root of the hub.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Where `owner/name` lives inside the hub.
    pub fn repo_path(&self, owner: &str, name: &str) -> PathBuf {
        self.temp_dir.path().join(owner).join(name)
    }

    /// Initialize an empty repository whose default branch is `main`.
    pub fn create_repo(&self, owner: &str, name: &str) -> UpstreamRepo {
        UpstreamRepo::init(self.repo_path(owner, name))
    }
}

impl Default for TestHub {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of `content` as lowercase hex.
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// An upstream git repository with pending and committed files.
pub struct UpstreamRepo {
    path: PathBuf,
    repo: Repository,
    contents: BTreeMap<String, Vec<u8>>,
    lfs: BTreeMap<String, String>,
}

impl UpstreamRepo {
    /// Initialize a repository at `path` with `HEAD` on `main`.
    pub fn init(path: PathBuf) -> Self {
        fs::create_dir_all(&path).expect("Failed to create repository directory");
        let repo = Repository::init(&path).expect("Failed to init repository");
        repo.set_head("refs/heads/main")
            .expect("Failed to point HEAD at main");
        Self {
            path,
            repo,
            contents: BTreeMap::new(),
            lfs: BTreeMap::new(),
        }
    }

    /// Path of the repository work tree.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a plain file and stage it.
    pub fn write_file(&mut self, rel_path: &str, content: &[u8]) -> &mut Self {
        self.stage(rel_path, content);
        self.contents.insert(rel_path.to_string(), content.to_vec());
        self.lfs.remove(rel_path);
        self
    }

    /// Stage an LFS pointer for `content` at `rel_path`.
    pub fn write_lfs_file(&mut self, rel_path: &str, content: &[u8]) -> &mut Self {
        let oid = sha256_hex(content);
        let pointer = PointerFile::new(oid.clone(), content.len() as u64);
        self.stage(rel_path, &pointer.to_bytes());
        self.contents.insert(rel_path.to_string(), content.to_vec());
        self.lfs.insert(rel_path.to_string(), oid);
        self
    }

    fn stage(&self, rel_path: &str, bytes: &[u8]) {
        let full = self.path.join(rel_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&full, bytes).expect("Failed to write file");
        let mut index = self.repo.index().expect("Failed to open index");
        index
            .add_path(Path::new(rel_path))
            .expect("Failed to stage file");
        index.write().expect("Failed to write index");
    }

    /// Commit everything staged on `main`.
    pub fn commit(&mut self, message: &str) -> &mut Self {
        {
            let mut index = self.repo.index().expect("Failed to open index");
            let tree_id = index.write_tree().expect("Failed to write tree");
            let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");
            let sig = Signature::now("Test User", "test@example.com")
                .expect("Failed to build signature");
            let parent = self
                .repo
                .head()
                .ok()
                .and_then(|head| head.peel_to_commit().ok());
            let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
            self.repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
                .expect("Failed to commit");
        }
        self
    }

    /// Create `branch` at the current HEAD commit.
    pub fn create_branch(&mut self, branch: &str) -> &mut Self {
        {
            let head = self
                .repo
                .head()
                .and_then(|h| h.peel_to_commit())
                .expect("Repository has no commits");
            self.repo
                .branch(branch, &head, true)
                .expect("Failed to create branch");
        }
        self
    }

    /// Real content of every file written so far, keyed by path.
    pub fn contents(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.contents
    }

    /// Real content of one file.
    pub fn content(&self, rel_path: &str) -> Option<&[u8]> {
        self.contents.get(rel_path).map(Vec::as_slice)
    }

    /// Expected oid of an LFS file.
    pub fn lfs_oid(&self, rel_path: &str) -> Option<&str> {
        self.lfs.get(rel_path).map(String::as_str)
    }

    /// Paths committed as LFS pointers.
    pub fn lfs_paths(&self) -> impl Iterator<Item = &str> {
        self.lfs.keys().map(String::as_str)
    }
}
