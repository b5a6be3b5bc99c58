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

//! # lfsync git layer
//!
//! Everything lfsync needs from version control:
//!
//! - **Pointer files**: parsing and the 40-byte stub signature
//! - **Manifest**: the `(oid, size, path)` list of LFS-tracked files in HEAD
//! - **Repository**: the [`VersionControl`] trait and its `git2` backend
//!
//! ```rust
//! use lfsync_git::PointerFile;
//!
//! let content = "version https://git-lfs.github.com/spec/v1\noid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393\nsize 12345\n";
//! let pointer = PointerFile::parse(content)?;
//! assert_eq!(pointer.size, 12345);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod manifest;
pub mod pointer;
pub mod repository;

pub use error::{GitError, GitResult};
pub use manifest::{read_manifest, read_manifest_at, ManifestEntry};
pub use pointer::{PointerFile, MAX_POINTER_SIZE, POINTER_SIGNATURE, SIGNATURE_LEN};
pub use repository::{Consistency, Git2Backend, VersionControl};
