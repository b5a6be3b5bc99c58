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

//! Verify command - offline integrity check of a working tree

use crate::output;
use crate::workdir::resolve_work_tree;
use crate::GlobalOpts;
use anyhow::{Context, Result};
use clap::Parser;
use lfsync_config::NoCredential;
use lfsync_git::Git2Backend;
use lfsync_sync::verify_tree;
use std::path::PathBuf;
use std::sync::Arc;

/// Verify every large file of a working tree against its recorded hash
///
/// Reads the LFS pointers of the checked-out commit and hashes the matching
/// files on disk. Nothing is downloaded. Exits non-zero when any file is
/// missing or does not match.
///
/// # Examples
///
/// ```bash
/// lfsync verify models/acme/model
/// lfsync verify --json > report.json
/// ```
#[derive(Parser, Debug)]
pub struct VerifyCmd {
    /// Working tree (defaults to the current directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Show expected and actual hashes of failures
    #[arg(long)]
    pub detailed: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl VerifyCmd {
    pub async fn execute(&self, opts: GlobalOpts) -> Result<()> {
        let root = resolve_work_tree(self.path.as_deref())?;
        let quiet = opts.quiet || self.json;

        if !quiet {
            output::header(&format!("Verifying {}", root.display()));
        }

        let vcs = Git2Backend::new(Arc::new(NoCredential));
        let report = verify_tree(&vcs, &root)
            .await
            .context("Failed to verify working tree")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if !opts.quiet {
            output::detail("Large files", &report.total.to_string());
            output::detail("Passed", &report.passed.to_string());
            output::detail("Failed", &report.failed.to_string());
            for failure in &report.failures {
                output::item(failure.label(), &failure.path);
                if self.detailed || opts.verbose {
                    output::item("expected", &failure.expected);
                    output::item("actual", &failure.actual.to_string());
                }
            }
        }

        if !report.all_passed() {
            anyhow::bail!(
                "Verification failed: {} of {} large files missing or corrupt",
                report.failed,
                report.total
            );
        }

        if !quiet {
            output::success("All large files verified");
        }
        Ok(())
    }
}
