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

//! # lfsync test utilities
//!
//! Shared helpers for lfsync integration tests:
//! - [`TestHub`] and [`UpstreamRepo`]: git repositories with LFS pointer
//!   commits laid out as `<hub>/<owner>/<name>`
//! - [`ResolveServer`]: an HTTP server answering `tree` probes and
//!   `resolve` downloads, honouring `Range`
//! - [`LocalMirror`]: a version-control backend that clones hub URLs from
//!   the local hub directory
//! - CLI helpers around `assert_cmd`

pub mod assertions;
pub mod cli;
pub mod fixtures;
pub mod mirror;
pub mod repo;
pub mod server;

pub use assertions::*;
pub use cli::{lfsync, LfsyncCommand};
pub use fixtures::TestFixtures;
pub use mirror::LocalMirror;
pub use repo::{TestHub, UpstreamRepo};
pub use server::{RecordedRequest, ResolveServer};
