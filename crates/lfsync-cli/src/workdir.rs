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

//! Locating the working tree a command operates on.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Walk up from `start` to the directory containing `.git`.
pub fn find_work_tree_root_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(".git").exists() {
            return Ok(current);
        }

        if !current.pop() {
            anyhow::bail!(
                "{} is not inside a git working tree (or any parent up to mount point)",
                start.display()
            );
        }
    }
}

/// Working tree for `path`, or for the current directory when omitted.
pub fn resolve_work_tree(path: Option<&Path>) -> Result<PathBuf> {
    let start = match path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let start = start
        .canonicalize()
        .with_context(|| format!("Cannot access {}", start.display()))?;
    find_work_tree_root_from(&start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_work_tree_root_from_nested() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir(root.join(".git")).unwrap();
        let nested = root.join("weights").join("shards");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_work_tree_root_from(&nested).unwrap(), root);
    }

    #[test]
    fn test_find_work_tree_root_from_not_found() {
        let temp = TempDir::new().unwrap();
        assert!(find_work_tree_root_from(temp.path()).is_err());
    }

    #[test]
    fn test_resolve_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(resolve_work_tree(Some(&missing)).is_err());
    }
}
