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

//! Integrity verification
//!
//! After every queued transfer has run, each manifest entry is re-hashed
//! from disk and compared with the expected SHA-256. Verification never
//! writes to the working tree.

use lfsync_git::ManifestEntry;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const READ_BUFFER: usize = 64 * 1024;

/// What verification found at a manifest path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Observed {
    /// Nothing exists at the path
    Absent,
    /// SHA-256 of the content on disk
    Hash(String),
    /// The path exists but could not be read
    Unreadable(String),
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Absent => f.write_str("absent"),
            Observed::Hash(hash) => f.write_str(hash),
            Observed::Unreadable(reason) => write!(f, "unreadable: {}", reason),
        }
    }
}

/// A manifest entry whose file is missing, unreadable or has the wrong content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchRecord {
    /// Repository-relative path
    pub path: String,
    /// Hash listed in the manifest
    pub expected: String,
    /// What was found on disk
    pub actual: Observed,
}

impl MismatchRecord {
    /// True when the file does not exist
    pub fn is_absent(&self) -> bool {
        self.actual == Observed::Absent
    }

    /// Short label for listings: `missing`, `unreadable` or `mismatch`
    pub fn label(&self) -> &'static str {
        match self.actual {
            Observed::Absent => "missing",
            Observed::Unreadable(_) => "unreadable",
            Observed::Hash(_) => "mismatch",
        }
    }
}

impl fmt::Display for MismatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, found {}",
            self.path, self.expected, self.actual
        )
    }
}

/// Hashes manifest entries against a working tree
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Create a new integrity verifier
    pub fn new() -> Self {
        Self
    }

    /// Compute SHA-256 checksum of data
    pub fn compute_checksum(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Stream a file through SHA-256; `None` when it does not exist
    pub async fn hash_file(path: &Path) -> std::io::Result<Option<String>> {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_BUFFER];
        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(Some(hex::encode(hasher.finalize())))
    }

    /// Verify a single manifest entry, `None` when it matches
    ///
    /// Read errors become [`Observed::Unreadable`] records rather than
    /// errors, so one bad path never hides the others.
    pub async fn verify_entry(&self, entry: &ManifestEntry, root: &Path) -> Option<MismatchRecord> {
        let actual = match Self::hash_file(&entry.local_path(root)).await {
            Ok(Some(hash)) if hash == entry.oid => return None,
            Ok(Some(hash)) => Observed::Hash(hash),
            Ok(None) => Observed::Absent,
            Err(e) => Observed::Unreadable(e.to_string()),
        };
        let record = MismatchRecord {
            path: entry.path.clone(),
            expected: entry.oid.clone(),
            actual,
        };
        warn!(path = %record.path, expected = %record.expected, actual = %record.actual, "Integrity mismatch");
        Some(record)
    }

    /// Verify every entry; an empty result means the tree is verified
    pub async fn verify_all(&self, manifest: &[ManifestEntry], root: &Path) -> Vec<MismatchRecord> {
        let mut mismatches = Vec::new();
        for entry in manifest {
            if let Some(record) = self.verify_entry(entry, root).await {
                mismatches.push(record);
            }
        }
        debug!(total = manifest.len(), failed = mismatches.len(), "Verification finished");
        mismatches
    }
}

/// Verification report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Total entries verified
    pub total: usize,

    /// Entries whose hash matched
    pub passed: usize,

    /// Entries missing or mismatched
    pub failed: usize,

    /// Details of each failure
    pub failures: Vec<MismatchRecord>,
}

impl VerificationReport {
    /// Create a report from the manifest size and the mismatches found
    pub fn new(total: usize, failures: Vec<MismatchRecord>) -> Self {
        let failed = failures.len();
        Self {
            total,
            passed: total.saturating_sub(failed),
            failed,
            failures,
        }
    }

    /// Check if all verifications passed
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO_HASH: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

    fn entry(path: &str, oid: &str) -> ManifestEntry {
        ManifestEntry {
            oid: oid.to_string(),
            size: 13,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_checksum_computation() {
        assert_eq!(IntegrityVerifier::compute_checksum(b"Hello, World!"), HELLO_HASH);
    }

    #[tokio::test]
    async fn test_streaming_hash_matches_in_memory() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..(READ_BUFFER * 3 + 17)).map(|i| (i % 253) as u8).collect();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, &data).unwrap();

        let streamed = IntegrityVerifier::hash_file(&path).await.unwrap();
        assert_eq!(streamed, Some(IntegrityVerifier::compute_checksum(&data)));
    }

    #[tokio::test]
    async fn test_matching_file_has_no_record() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/hello.txt"), b"Hello, World!").unwrap();

        let records = IntegrityVerifier::new()
            .verify_all(&[entry("sub/hello.txt", HELLO_HASH)], dir.path())
            .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let records = IntegrityVerifier::new()
            .verify_all(&[entry("gone.bin", HELLO_HASH)], dir.path())
            .await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_absent());
        assert_eq!(records[0].label(), "missing");
        assert_eq!(records[0].actual.to_string(), "absent");
    }

    #[tokio::test]
    async fn test_different_content_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("model.bin"), b"Hello, World?").unwrap();
        let records = IntegrityVerifier::new()
            .verify_all(&[entry("model.bin", HELLO_HASH)], dir.path())
            .await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].expected, HELLO_HASH);
        assert_eq!(records[0].label(), "mismatch");
        assert_eq!(
            records[0].actual,
            Observed::Hash(IntegrityVerifier::compute_checksum(b"Hello, World?"))
        );
    }

    #[tokio::test]
    async fn test_unreadable_entry_does_not_stop_verification() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("weights.bin")).unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"Hello, World?").unwrap();
        let manifest = [
            entry("gone.bin", HELLO_HASH),
            entry("weights.bin", HELLO_HASH),
            entry("hello.txt", HELLO_HASH),
        ];

        let records = IntegrityVerifier::new().verify_all(&manifest, dir.path()).await;

        let labels: Vec<_> = records.iter().map(|r| (r.path.as_str(), r.label())).collect();
        assert_eq!(
            labels,
            vec![
                ("gone.bin", "missing"),
                ("weights.bin", "unreadable"),
                ("hello.txt", "mismatch"),
            ]
        );
        assert!(records[1].actual.to_string().starts_with("unreadable: "));
    }

    #[test]
    fn test_verification_report() {
        let failures = vec![MismatchRecord {
            path: "model.bin".to_string(),
            expected: "aa".to_string(),
            actual: Observed::Absent,
        }];
        let report = VerificationReport::new(3, failures);

        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.all_passed());
        assert_eq!(
            report.failures[0].to_string(),
            "model.bin: expected aa, found absent"
        );
    }
}
