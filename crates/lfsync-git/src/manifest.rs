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

//! Manifest of LFS-tracked content for the checked-out revision

use crate::error::{GitError, GitResult};
use crate::pointer::{PointerFile, MAX_POINTER_SIZE};
use git2::{ErrorCode, ObjectType, Repository, TreeWalkMode, TreeWalkResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One LFS-tracked file as recorded in the HEAD tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Expected SHA-256 of the content (64 lowercase hex chars)
    pub oid: String,
    /// Expected size in bytes
    pub size: u64,
    /// Repository-relative path with `/` separators
    pub path: String,
}

impl ManifestEntry {
    /// Absolute location of this entry under `root`
    pub fn local_path(&self, root: &Path) -> PathBuf {
        self.path.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

/// Opens the working tree at `path` without searching parent directories
pub(crate) fn open_working_tree(path: &Path) -> GitResult<Repository> {
    let repo = Repository::open(path)
        .map_err(|_| GitError::NotATrackedRepository(path.to_path_buf()))?;
    if repo.is_bare() {
        return Err(GitError::NotATrackedRepository(path.to_path_buf()));
    }
    Ok(repo)
}

/// Lists every pointer blob in the HEAD tree, in pre-order tree walk order
pub fn read_manifest(repo: &Repository) -> GitResult<Vec<ManifestEntry>> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            debug!("HEAD is unborn, manifest is empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    let tree = head.peel_to_tree()?;

    let mut entries = Vec::new();
    let mut failure: Option<GitError> = None;

    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() != Some(ObjectType::Blob) {
            return TreeWalkResult::Ok;
        }
        let Some(name) = entry.name() else {
            warn!(dir = root, "Skipping tree entry with non UTF-8 name");
            return TreeWalkResult::Ok;
        };
        let blob = match repo.find_blob(entry.id()) {
            Ok(blob) => blob,
            Err(e) => {
                failure = Some(e.into());
                return TreeWalkResult::Abort;
            }
        };
        if blob.size() > MAX_POINTER_SIZE {
            return TreeWalkResult::Ok;
        }
        if let Some(pointer) = PointerFile::from_bytes(blob.content()) {
            entries.push(ManifestEntry {
                oid: pointer.oid,
                size: pointer.size,
                path: format!("{}{}", root, name),
            });
        }
        TreeWalkResult::Ok
    })?;

    if let Some(e) = failure {
        return Err(e);
    }

    debug!(count = entries.len(), "Read LFS manifest");
    Ok(entries)
}

/// Reads the manifest of the working tree at `path`
pub fn read_manifest_at(path: &Path) -> GitResult<Vec<ManifestEntry>> {
    let repo = open_working_tree(path)?;
    read_manifest(&repo)
}
