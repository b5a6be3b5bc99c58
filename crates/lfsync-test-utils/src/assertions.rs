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

//! Custom assertions for replica contents.

use lfsync_git::{PointerFile, POINTER_SIGNATURE};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Assert that `path` is still an LFS pointer stub.
pub fn assert_is_stub(path: &Path) {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assert!(
        bytes.starts_with(POINTER_SIGNATURE) && PointerFile::from_bytes(&bytes).is_some(),
        "{} should be a pointer stub",
        path.display()
    );
}

/// Assert that `path` holds exactly `expected`.
pub fn assert_materialized(path: &Path, expected: &[u8]) {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assert_eq!(
        bytes.len(),
        expected.len(),
        "{} has the wrong size",
        path.display()
    );
    assert!(bytes == expected, "{} has the wrong content", path.display());
}

/// Assert the SHA-256 of the file at `path`.
pub fn assert_sha256(path: &Path, expected_hex: &str) {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assert_eq!(
        hex::encode(Sha256::digest(&bytes)),
        expected_hex,
        "checksum of {}",
        path.display()
    );
}

/// Assert that `path` is a git working tree.
pub fn assert_working_tree(path: &Path) {
    let repo = git2::Repository::open(path)
        .unwrap_or_else(|e| panic!("{} is not a repository: {}", path.display(), e));
    assert!(!repo.is_bare(), "{} should not be bare", path.display());
}
