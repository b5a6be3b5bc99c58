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

//! Progress reporting seam between the engine and its front end

use std::fmt;

/// Stage of a repository run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checking whether the repository is public
    Probing,
    /// Cloning into an empty destination
    Cloning,
    /// Updating an existing working tree
    Pulling,
    /// Walking the tree and fetching stubs
    Fetching,
    /// Hashing manifest entries
    Verifying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Probing => "probing",
            Phase::Cloning => "cloning",
            Phase::Pulling => "pulling",
            Phase::Fetching => "fetching",
            Phase::Verifying => "verifying",
        };
        f.write_str(name)
    }
}

/// Receives progress events; every method defaults to doing nothing
pub trait ProgressReporter: Send + Sync {
    /// A repository entered a new phase
    fn phase(&self, _repository: &str, _phase: Phase) {}

    /// A transfer started at `offset`; `total` is the full size when known
    fn transfer_started(&self, _path: &str, _offset: u64, _total: Option<u64>) {}

    /// Bytes were written for the current transfer
    fn transfer_progress(&self, _bytes: u64) {}

    /// The current transfer ended
    fn transfer_finished(&self, _path: &str, _success: bool) {}
}

/// Reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}
