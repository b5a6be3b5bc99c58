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
//! Configuration for lfsync
//!
//! Supports TOML, YAML and JSON files, `LFSYNC_*` environment overrides,
//! validation with field-level errors, and the credential sources shared by
//! the HTTP and git layers.
//!
//! # Example
//!
//! ```no_run
//! use lfsync_config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Some(std::path::Path::new("lfsync.toml"))).await?;
//!     println!("Syncing from {}", config.remote.endpoint);
//!     Ok(())
//! }
//! ```

pub mod credentials;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use credentials::{CredentialProvider, CredentialScope, CredentialSource, NoCredential};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader};
pub use schema::*;
pub use validation::Validator;
