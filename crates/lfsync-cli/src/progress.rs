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

//! Terminal progress for sync runs.
//!
//! [`ProgressTracker`] owns the `indicatif` draw target (stderr, or hidden in
//! quiet mode). [`BarReporter`] plugs it into the engine: a spinner per
//! repository phase and a byte bar per file transfer.

use indicatif::{
    HumanBytes, HumanDuration, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressFinish,
    ProgressStyle,
};
use lfsync_sync::{Phase, ProgressReporter, TransferStats};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or(fallback)
}

/// Progress bar factory
pub struct ProgressTracker {
    multi: Arc<MultiProgress>,
    quiet: bool,
}

impl ProgressTracker {
    /// Uses stderr for progress output to keep stdout clean for piping
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: Arc::new(if quiet {
                MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
            } else {
                MultiProgress::with_draw_target(ProgressDrawTarget::stderr())
            }),
            quiet,
        }
    }

    /// Byte bar for one download, starting at `offset`
    pub fn download_bar(&self, msg: &str, offset: u64, total: Option<u64>) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        let pb = self.multi.add(
            ProgressBar::new(total.unwrap_or(0)).with_finish(ProgressFinish::AndClear),
        );
        pb.set_style(
            style(
                "{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                ProgressStyle::default_bar(),
            )
            .progress_chars("█▓░"),
        );
        pb.set_message(msg.to_string());
        pb.set_position(offset);
        pb.enable_steady_tick(TICK);
        pb
    }

    /// Spinner for indeterminate steps, cleared on completion
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        let pb = self
            .multi
            .add(ProgressBar::new_spinner().with_finish(ProgressFinish::AndClear));
        pb.set_style(style("{spinner:.cyan} {msg}", ProgressStyle::default_spinner()));
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(TICK);
        pb
    }
}

/// [`ProgressReporter`] drawing `indicatif` bars
pub struct BarReporter {
    tracker: ProgressTracker,
    spinner: Mutex<Option<ProgressBar>>,
    transfer: Mutex<Option<ProgressBar>>,
}

impl BarReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            tracker: ProgressTracker::new(quiet),
            spinner: Mutex::new(None),
            transfer: Mutex::new(None),
        }
    }

    fn replace(slot: &Mutex<Option<ProgressBar>>, bar: Option<ProgressBar>) {
        let mut guard = match slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = guard.take() {
            previous.finish_and_clear();
        }
        *guard = bar;
    }

    /// Clear whatever is still on screen
    pub fn clear(&self) {
        Self::replace(&self.spinner, None);
        Self::replace(&self.transfer, None);
    }
}

impl ProgressReporter for BarReporter {
    fn phase(&self, repository: &str, phase: Phase) {
        let bar = match phase {
            // The per-file bars take over while fetching
            Phase::Fetching => None,
            other => Some(
                self.tracker
                    .spinner(&format!("{} {}", capitalize(&other.to_string()), repository)),
            ),
        };
        Self::replace(&self.spinner, bar);
    }

    fn transfer_started(&self, path: &str, offset: u64, total: Option<u64>) {
        let bar = self.tracker.download_bar(path, offset, total);
        Self::replace(&self.transfer, Some(bar));
    }

    fn transfer_progress(&self, bytes: u64) {
        if let Ok(guard) = self.transfer.lock() {
            if let Some(bar) = guard.as_ref() {
                bar.inc(bytes);
            }
        }
    }

    fn transfer_finished(&self, _path: &str, _success: bool) {
        Self::replace(&self.transfer, None);
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One-line summary of a repository's transfers
pub fn summary(stats: &TransferStats, elapsed: Option<Duration>) -> String {
    let mut parts = Vec::new();

    if stats.files_fetched > 0 {
        parts.push(format!("{} files fetched", stats.files_fetched));
    }
    if stats.bytes_downloaded > 0 {
        parts.push(format!("↓ {}", HumanBytes(stats.bytes_downloaded)));
    }
    if stats.resumed_transfers > 0 {
        parts.push(format!("{} resumed", stats.resumed_transfers));
    }
    if let Some(elapsed) = elapsed {
        parts.push(format!("in {}", HumanDuration(elapsed)));
    }

    if parts.is_empty() {
        "nothing to fetch".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_mentions_transfers() {
        let stats = TransferStats {
            files_fetched: 2,
            bytes_downloaded: 1024 * 1024,
            resumed_transfers: 1,
            attempts: 3,
        };
        let summary = summary(&stats, Some(Duration::from_secs(3)));
        assert!(summary.contains("2 files fetched"), "got: {}", summary);
        assert!(summary.contains("MiB"), "got: {}", summary);
        assert!(summary.contains("1 resumed"), "got: {}", summary);
        assert!(summary.contains("in "), "got: {}", summary);
    }

    #[test]
    fn test_summary_when_idle() {
        assert_eq!(summary(&TransferStats::default(), None), "nothing to fetch");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("cloning"), "Cloning");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_quiet_reporter_accepts_events() {
        let reporter = BarReporter::new(true);
        reporter.phase("acme/model", Phase::Cloning);
        reporter.transfer_started("model.bin", 0, Some(10));
        reporter.transfer_progress(10);
        reporter.transfer_finished("model.bin", true);
        reporter.clear();
    }
}
