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

//! Status command - which files still need fetching

use crate::output;
use crate::workdir::resolve_work_tree;
use crate::GlobalOpts;
use anyhow::{Context, Result};
use clap::Parser;
use lfsync_git::read_manifest_at;
use lfsync_sync::{scan_tree, StubState};
use std::collections::HashMap;
use std::path::PathBuf;

/// List pointer stubs, empty files and interrupted downloads
///
/// Walks the working tree without touching the network. A file counts as
/// partial when it holds real content shorter than its manifest size.
///
/// # Examples
///
/// ```bash
/// lfsync status models/acme/model
/// lfsync status --porcelain | grep ^stub
/// ```
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Working tree (defaults to the current directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// List materialized files too
    #[arg(short, long)]
    pub all: bool,

    /// Machine-readable `<state>\t<path>` lines
    #[arg(long)]
    pub porcelain: bool,
}

/// Per-file state shown by `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileStatus {
    Ok,
    Stub,
    Empty,
    Partial,
}

impl FileStatus {
    fn label(self) -> &'static str {
        match self {
            FileStatus::Ok => "ok",
            FileStatus::Stub => "stub",
            FileStatus::Empty => "empty",
            FileStatus::Partial => "partial",
        }
    }

    fn pending(self) -> bool {
        self != FileStatus::Ok
    }
}

fn file_status(state: StubState, size: u64, expected: Option<u64>) -> FileStatus {
    match state {
        StubState::UnresolvedStub => FileStatus::Stub,
        StubState::Empty => FileStatus::Empty,
        StubState::Materialized => match expected {
            Some(expected) if size < expected => FileStatus::Partial,
            _ => FileStatus::Ok,
        },
    }
}

impl StatusCmd {
    pub async fn execute(&self, opts: GlobalOpts) -> Result<()> {
        let root = resolve_work_tree(self.path.as_deref())?;
        let manifest = read_manifest_at(&root).context("Failed to read large-file manifest")?;
        let expected: HashMap<String, u64> =
            manifest.into_iter().map(|e| (e.path, e.size)).collect();
        let entries = scan_tree(&root).context("Failed to walk working tree")?;

        let files: Vec<(String, FileStatus)> = entries
            .into_iter()
            .map(|(entry, state)| {
                let status = file_status(state, entry.size, expected.get(&entry.rel_path).copied());
                (entry.rel_path, status)
            })
            .collect();
        let show_all = self.all || opts.verbose;

        if self.porcelain {
            for (path, status) in &files {
                if show_all || status.pending() {
                    println!("{}\t{}", status.label(), path);
                }
            }
            return Ok(());
        }

        if opts.quiet {
            return Ok(());
        }

        let count = |wanted: FileStatus| files.iter().filter(|(_, s)| *s == wanted).count();
        let pending = files.iter().filter(|(_, s)| s.pending()).count();

        output::header(&format!("Working tree {}", root.display()));
        output::detail("Files", &files.len().to_string());
        output::detail("Large files", &expected.len().to_string());
        output::detail("Materialized", &count(FileStatus::Ok).to_string());
        output::detail("Stubs", &count(FileStatus::Stub).to_string());
        output::detail("Empty", &count(FileStatus::Empty).to_string());
        output::detail("Partial", &count(FileStatus::Partial).to_string());

        for (path, status) in &files {
            if show_all || status.pending() {
                output::item(status.label(), path);
            }
        }

        if pending == 0 {
            output::success("Nothing left to fetch");
        } else {
            output::info(&format!(
                "{} file(s) need fetching; run `lfsync sync` to materialize them",
                pending
            ));
        }
        Ok(())
    }
}
