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

//! Working tree traversal
//!
//! [`walk`] yields entries lazily in depth-first order with siblings sorted
//! by file name. `.git` is pruned at every depth and symlinks are not
//! followed.

use crate::error::SyncResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, FilterEntry, IntoIter, WalkDir};

/// Name of the version-control metadata directory
pub const GIT_DIR: &str = ".git";

/// Kind of a walked entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    /// Directory
    Directory,
    /// Regular file or symlink
    File,
}

/// One entry of the working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    /// Path relative to the root, `/`-separated
    pub rel_path: String,
    /// Absolute path on disk
    pub abs_path: PathBuf,
    /// Directory or file
    pub kind: EntryKind,
    /// Size on disk without following symlinks
    pub size: u64,
}

/// Lazy depth-first iterator over a working tree
pub struct TreeWalker {
    root: PathBuf,
    inner: FilterEntry<IntoIter, fn(&DirEntry) -> bool>,
}

fn is_not_git_dir(entry: &DirEntry) -> bool {
    !(entry.file_type().is_dir() && entry.file_name() == GIT_DIR)
}

/// Starts a walk below `root`; the root itself is not yielded
pub fn walk(root: &Path) -> TreeWalker {
    let inner = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(is_not_git_dir as fn(&DirEntry) -> bool);
    TreeWalker {
        root: root.to_path_buf(),
        inner,
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl Iterator for TreeWalker {
    type Item = SyncResult<TreeEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.inner.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e.into())),
        };
        let kind = if entry.file_type().is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let size = match kind {
            EntryKind::Directory => 0,
            EntryKind::File => match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => return Some(Err(e.into())),
            },
        };
        Some(Ok(TreeEntry {
            rel_path: relative(&self.root, entry.path()),
            abs_path: entry.path().to_path_buf(),
            kind,
            size,
        }))
    }
}
