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

//! CLI command helpers for testing the lfsync binary.

use assert_cmd::Command;
use std::path::Path;

/// Creates a new lfsync Command for testing.
///
/// Logging is silenced through `RUST_LOG` so stdout assertions only see
/// command output.
///
/// # Example
/// ```ignore
/// use lfsync_test_utils::lfsync;
///
/// lfsync().arg("version").assert().success();
/// ```
#[allow(deprecated)] // cargo_bin is deprecated but still works for our use case
pub fn lfsync() -> Command {
    let mut cmd = Command::cargo_bin("lfsync").expect("lfsync binary not found");
    cmd.env("RUST_LOG", "off");
    for var in [
        "LFSYNC_ENDPOINT",
        "LFSYNC_DESTINATION",
        "LFSYNC_MAX_RETRIES",
        "LFSYNC_RETRY_DELAY_SECS",
        "LFSYNC_RESUME_THRESHOLD",
        "LFSYNC_ASSUME_YES",
        "LFSYNC_LOG_LEVEL",
        "LFSYNC_TOKEN",
        "LFSYNC_TOKEN_FILE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Fluent API wrapper for common lfsync command patterns.
pub struct LfsyncCommand {
    cmd: Command,
}

impl LfsyncCommand {
    /// Create a new LfsyncCommand.
    pub fn new() -> Self {
        Self { cmd: lfsync() }
    }

    /// Set the working directory for the command.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cmd.current_dir(dir);
        self
    }

    /// Add an argument to the command.
    pub fn arg(mut self, arg: &str) -> Self {
        self.cmd.arg(arg);
        self
    }

    /// Add multiple arguments to the command.
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    /// Set an environment variable for the command.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    /// Execute the command and assert success.
    pub fn run_success(mut self) -> assert_cmd::assert::Assert {
        self.cmd.assert().success()
    }

    /// Execute the command and assert failure.
    pub fn run_failure(mut self) -> assert_cmd::assert::Assert {
        self.cmd.assert().failure()
    }

    /// Get the underlying Command for custom assertions.
    pub fn into_inner(self) -> Command {
        self.cmd
    }

    /// Walk and classify a working tree.
    pub fn status(dir: &Path) -> assert_cmd::assert::Assert {
        lfsync().arg("status").arg(dir).assert()
    }

    /// Verify a working tree against its manifest.
    pub fn verify(dir: &Path) -> assert_cmd::assert::Assert {
        lfsync().arg("verify").arg(dir).assert()
    }
}

impl Default for LfsyncCommand {
    fn default() -> Self {
        Self::new()
    }
}
