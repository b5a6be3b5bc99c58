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

//! Content policy applied to tracked files before any fetch

use std::collections::BTreeSet;

/// Decides whether a tracked path is acceptable
pub trait ContentPolicy: Send + Sync {
    /// True when `path` must not be synced
    fn rejects(&self, path: &str) -> bool;

    /// Every rejected path, in input order
    fn rejected<'a>(&self, paths: &mut dyn Iterator<Item = &'a str>) -> Vec<String> {
        paths
            .filter(|p| self.rejects(p))
            .map(str::to_string)
            .collect()
    }
}

/// Rejects files by extension, case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectedExtensions {
    extensions: BTreeSet<String>,
}

impl RejectedExtensions {
    /// Builds the policy; leading dots are ignored
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// True when nothing is rejected
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl ContentPolicy for RejectedExtensions {
    fn rejects(&self, path: &str) -> bool {
        if self.extensions.is_empty() {
            return false;
        }
        let file_name = path.rsplit('/').next().unwrap_or(path);
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.extensions.contains(&ext.to_ascii_lowercase())
            }
            _ => false,
        }
    }
}
