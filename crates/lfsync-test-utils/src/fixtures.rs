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

//! Test content and configuration fixtures.

use lfsync_git::PointerFile;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Test fixture helpers.
pub struct TestFixtures;

impl TestFixtures {
    /// Predictable binary content of `size` bytes.
    pub fn binary_file(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i % 256) as u8).collect()
    }

    /// Repeating text pattern of `target_size` bytes.
    pub fn large_file(target_size: usize) -> Vec<u8> {
        let pattern = b"lfsync large file test pattern\n";
        let repeats = (target_size / pattern.len()) + 1;
        pattern.repeat(repeats).into_iter().take(target_size).collect()
    }

    /// Pointer stub describing `content`.
    pub fn pointer_for(content: &[u8]) -> Vec<u8> {
        let oid = hex::encode(Sha256::digest(content));
        PointerFile::new(oid, content.len() as u64).to_bytes()
    }

    /// Write `content` to `root/rel_path`, creating parent directories.
    pub fn write(root: &Path, rel_path: &str, content: &[u8]) -> PathBuf {
        let path = root.join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }

    /// Configuration file pointing at `endpoint` with fast retries.
    pub fn sample_config(endpoint: &str, destination: &Path) -> String {
        format!(
            r#"[remote]
endpoint = "{}"
probe_timeout_secs = 5

[sync]
destination = "{}"
max_attempts = 2
retry_delay_secs = 0
"#,
            endpoint,
            destination.display().to_string().replace('\\', "\\\\")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_file() {
        let data = TestFixtures::binary_file(300);
        assert_eq!(data.len(), 300);
        assert_eq!(data[0], 0);
        assert_eq!(data[256], 0);
        assert_eq!(data[299], 43);
    }

    #[test]
    fn test_large_file() {
        let data = TestFixtures::large_file(1000);
        assert_eq!(data.len(), 1000);
        assert!(data.starts_with(b"lfsync large file"));
    }

    #[test]
    fn test_pointer_for_is_a_pointer() {
        let stub = TestFixtures::pointer_for(b"weights");
        let pointer = PointerFile::from_bytes(&stub).expect("pointer should parse");
        assert_eq!(pointer.size, 7);
    }

    #[test]
    fn test_sample_config_parses() {
        let text = TestFixtures::sample_config("http://127.0.0.1:1", Path::new("/tmp/out"));
        let config: lfsync_config::Config = toml::from_str(&text).expect("valid toml");
        assert_eq!(config.sync.max_attempts, 2);
        assert_eq!(config.remote.endpoint, "http://127.0.0.1:1");
    }
}
