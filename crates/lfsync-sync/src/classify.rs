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

//! Stub classification
//!
//! A file is an unresolved stub when its first 40 bytes are the LFS pointer
//! signature. Zero-length files are reported separately; both need a fetch.
//! Real content that happens to start with the signature is misclassified,
//! which is accepted.

use lfsync_git::{POINTER_SIGNATURE, SIGNATURE_LEN};
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// What the working tree holds at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StubState {
    /// Real content
    Materialized,
    /// LFS pointer text still in place of the content
    UnresolvedStub,
    /// Zero bytes on disk
    Empty,
}

impl StubState {
    /// Stubs and empty files are handed to the fetcher
    pub fn needs_fetch(self) -> bool {
        !matches!(self, StubState::Materialized)
    }
}

/// Classifies the file at `path`, given its size on disk
///
/// Symlinks are never opened, and neither they nor paths that have
/// vanished are fetched; both are reported as [`StubState::Materialized`]
/// and left to the verifier.
pub fn classify(path: &Path, size: u64) -> io::Result<StubState> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => return Ok(StubState::Materialized),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StubState::Materialized),
        Err(e) => return Err(e),
    }
    if size == 0 {
        return Ok(StubState::Empty);
    }

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StubState::Materialized),
        Err(e) => return Err(e),
    };
    let mut prefix = Vec::with_capacity(SIGNATURE_LEN);
    file.take(SIGNATURE_LEN as u64).read_to_end(&mut prefix)?;

    Ok(classify_prefix(&prefix))
}

/// Classifies from an already-read prefix of at most 40 bytes
pub fn classify_prefix(prefix: &[u8]) -> StubState {
    if prefix.is_empty() {
        return StubState::Empty;
    }
    if prefix == POINTER_SIGNATURE.as_slice() {
        StubState::UnresolvedStub
    } else {
        StubState::Materialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    const STUB: &str = "version https://git-lfs.github.com/spec/v1\noid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393\nsize 4096\n";

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> (std::path::PathBuf, u64) {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        (path, content.len() as u64)
    }

    #[test]
    fn test_stub_is_detected() {
        let dir = TempDir::new().unwrap();
        let (path, size) = write(&dir, "model.bin", STUB.as_bytes());
        assert_eq!(classify(&path, size).unwrap(), StubState::UnresolvedStub);
    }

    #[test]
    fn test_zero_size_is_empty() {
        let dir = TempDir::new().unwrap();
        let (path, size) = write(&dir, "empty", b"");
        assert_eq!(classify(&path, size).unwrap(), StubState::Empty);
        assert!(StubState::Empty.needs_fetch());
    }

    #[test]
    fn test_short_file_is_materialized() {
        let dir = TempDir::new().unwrap();
        // Shorter than the signature even though it starts the same way
        let (path, size) = write(&dir, "short", b"version https://git-lfs");
        assert_eq!(classify(&path, size).unwrap(), StubState::Materialized);
    }

    #[test]
    fn test_real_content_is_materialized() {
        let dir = TempDir::new().unwrap();
        let (path, size) = write(&dir, "a.txt", &[b'x'; 80]);
        assert_eq!(classify(&path, size).unwrap(), StubState::Materialized);
        assert!(!StubState::Materialized.needs_fetch());
    }

    #[test]
    fn test_missing_file_is_left_to_verifier() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone");
        assert_eq!(classify(&path, 12).unwrap(), StubState::Materialized);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_stub_is_not_followed() {
        let dir = TempDir::new().unwrap();
        let (stub, _) = write(&dir, "real.bin", STUB.as_bytes());
        let link = dir.path().join("model.bin");
        std::os::unix::fs::symlink(&stub, &link).unwrap();
        let size = std::fs::symlink_metadata(&link).unwrap().len();

        assert_eq!(classify(&link, size).unwrap(), StubState::Materialized);
        assert_eq!(classify(&link, 0).unwrap(), StubState::Materialized);
        assert_eq!(classify(&stub, STUB.len() as u64).unwrap(), StubState::UnresolvedStub);
    }

    proptest! {
        #[test]
        fn prop_zero_size_is_always_empty(content in proptest::collection::vec(any::<u8>(), 0..128)) {
            let dir = TempDir::new().unwrap();
            let (path, _) = write(&dir, "f", &content);
            prop_assert_eq!(classify(&path, 0).unwrap(), StubState::Empty);
        }

        #[test]
        fn prop_signature_prefix_is_stub(tail in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut content = POINTER_SIGNATURE.to_vec();
            content.extend_from_slice(&tail);
            prop_assert_eq!(classify_prefix(&content[..SIGNATURE_LEN]), StubState::UnresolvedStub);
        }

        #[test]
        fn prop_differing_prefix_is_materialized(
            content in proptest::collection::vec(any::<u8>(), SIGNATURE_LEN..256)
        ) {
            prop_assume!(&content[..SIGNATURE_LEN] != POINTER_SIGNATURE.as_slice());
            prop_assert_eq!(classify_prefix(&content[..SIGNATURE_LEN]), StubState::Materialized);
        }
    }
}
