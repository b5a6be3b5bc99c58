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

//! Git LFS pointer files
//!
//! Pointer files are the small text stubs that version control stores in
//! place of large binary content. The content itself lives in LFS storage
//! and is addressed by its SHA-256 hash.
//!
//! ## Format
//!
//! ```text
//! version https://git-lfs.github.com/spec/v1
//! oid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393
//! size 12345
//! ```
//!
//! Extension lines (`ext-<n>-<name> ...`) are accepted and ignored.

use crate::error::{GitError, GitResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version URL written by current LFS clients
pub const POINTER_VERSION: &str = "https://git-lfs.github.com/spec/v1";

/// Leading bytes shared by every pointer stub
pub const POINTER_SIGNATURE: &[u8; SIGNATURE_LEN] = b"version https://git-lfs.github.com/spec/";

/// Length of the stub signature prefix
pub const SIGNATURE_LEN: usize = 40;

/// Pointer files larger than this are never treated as pointers
pub const MAX_POINTER_SIZE: usize = 1024;

/// A parsed LFS pointer file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerFile {
    /// Version URL of the pointer format
    pub version: String,

    /// SHA-256 of the real content, lowercase hex without prefix
    pub oid: String,

    /// Size of the real content in bytes
    pub size: u64,
}

impl PointerFile {
    /// Creates a pointer for the current format version
    ///
    /// # Example
    ///
    /// ```rust
    /// use lfsync_git::PointerFile;
    ///
    /// let pointer = PointerFile::new(
    ///     "4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393".to_string(),
    ///     12345,
    /// );
    /// assert_eq!(pointer.size, 12345);
    /// ```
    pub fn new(oid: String, size: u64) -> Self {
        Self {
            version: POINTER_VERSION.to_string(),
            oid,
            size,
        }
    }

    /// Parses a pointer file from its text representation
    ///
    /// # Errors
    ///
    /// Returns a pointer error when a line is malformed, the oid is not a
    /// SHA-256 hex digest, or a required key is missing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lfsync_git::PointerFile;
    ///
    /// let content = "version https://git-lfs.github.com/spec/v1\noid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393\nsize 12345\n";
    /// let pointer = PointerFile::parse(content)?;
    /// assert_eq!(pointer.size, 12345);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn parse(content: &str) -> GitResult<Self> {
        if content.len() > MAX_POINTER_SIZE {
            return Err(GitError::InvalidPointerFormat(
                "Pointer file too large".to_string(),
            ));
        }
        if !content.as_bytes().starts_with(POINTER_SIGNATURE) {
            return Err(GitError::InvalidPointerFormat(
                "Missing LFS version line".to_string(),
            ));
        }

        let mut version: Option<String> = None;
        let mut oid: Option<String> = None;
        let mut size: Option<u64> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(' ') else {
                return Err(GitError::PointerParse(format!(
                    "Invalid line format: {}",
                    line
                )));
            };

            match key {
                "version" => version = Some(value.to_string()),
                "oid" => oid = Some(parse_oid(value)?),
                "size" => {
                    size = Some(value.parse::<u64>().map_err(|e| {
                        GitError::PointerParse(format!("Invalid size value: {}", e))
                    })?);
                }
                k if k.starts_with("ext-") => {}
                other => {
                    return Err(GitError::PointerParse(format!(
                        "Unknown field: {}",
                        other
                    )));
                }
            }
        }

        let version = version.ok_or_else(|| GitError::MissingPointerField("version".to_string()))?;
        let oid = oid.ok_or_else(|| GitError::MissingPointerField("oid".to_string()))?;
        let size = size.ok_or_else(|| GitError::MissingPointerField("size".to_string()))?;

        Ok(Self { version, oid, size })
    }

    /// Parses raw bytes, returning `None` for anything that is not a pointer
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if !Self::is_pointer(bytes) {
            return None;
        }
        std::str::from_utf8(bytes).ok().and_then(|s| Self::parse(s).ok())
    }

    /// Cheap check on the signature prefix without full parsing
    ///
    /// ```rust
    /// use lfsync_git::PointerFile;
    ///
    /// assert!(PointerFile::is_pointer(b"version https://git-lfs.github.com/spec/v1\n"));
    /// assert!(!PointerFile::is_pointer(b"plain text"));
    /// ```
    pub fn is_pointer(content: &[u8]) -> bool {
        content.len() <= MAX_POINTER_SIZE && content.starts_with(POINTER_SIGNATURE)
    }

    /// Serialized form as bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Returns the OID with its `sha256:` prefix
    pub fn oid_with_prefix(&self) -> String {
        format!("sha256:{}", self.oid)
    }
}

fn parse_oid(value: &str) -> GitResult<String> {
    let (algo, hash) = value.split_once(':').ok_or_else(|| {
        GitError::InvalidOid(format!(
            "OID must be in format 'sha256:hash', got: {}",
            value
        ))
    })?;
    if algo != "sha256" {
        return Err(GitError::InvalidOid(format!(
            "Only sha256 hashing is supported, got: {}",
            algo
        )));
    }
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GitError::InvalidOid(format!("Invalid SHA-256 hash: {}", hash)));
    }
    Ok(hash.to_ascii_lowercase())
}

impl fmt::Display for PointerFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version {}\noid {}\nsize {}\n",
            self.version,
            self.oid_with_prefix(),
            self.size
        )
    }
}
