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

mod commands;
mod confirm;
mod output;
mod progress;
mod workdir;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use commands::*;
use lfsync_config::Config;
use lfsync_observability::{init_tracing, LogFormat};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lfsync")]
#[command(version, about = "Selective LFS sync with integrity verification")]
#[command(
    long_about = "lfsync clones repositories without the LFS smudge filter, downloads the \
content behind every pointer stub over plain HTTPS with resumable range requests, \
and verifies each large file against the SHA-256 recorded in the commit."
)]
#[command(propagate_version = true)]
#[command(author = "lfsync Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Colored output (always|auto|never)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Log format (pretty|compact|json), defaults to the configured one
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<String>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone or update repositories and materialize their large files
    Sync(SyncCmd),

    /// Check a working tree against its large-file manifest
    Verify(VerifyCmd),

    /// List pointer stubs and empty files in a working tree
    Status(StatusCmd),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Flags shared by every command
#[derive(Debug, Clone, Copy)]
pub struct GlobalOpts {
    pub quiet: bool,
    pub verbose: bool,
}

fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    if cli.quiet {
        return Ok(());
    }
    let format: LogFormat = cli
        .log_format
        .as_deref()
        .unwrap_or(config.observability.log_format.as_str())
        .parse()?;
    let level = if cli.verbose {
        Some("debug")
    } else if std::env::var_os("RUST_LOG").is_some() {
        None
    } else {
        Some(config.observability.log_level.as_str())
    };
    // Ignore errors if already initialized
    init_tracing(format, level).ok();
    Ok(())
}

async fn run_configured(cli: &Cli, opts: GlobalOpts) -> Result<()> {
    let config = Config::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    init_logging(cli, &config)?;

    match &cli.command {
        Commands::Sync(cmd) => cmd.execute(config, opts).await,
        Commands::Verify(cmd) => cmd.execute(opts).await,
        Commands::Status(cmd) => cmd.execute(opts).await,
        Commands::Version | Commands::Completions { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.color.as_str() {
        "never" => console::set_colors_enabled(false),
        "always" => console::set_colors_enabled(true),
        "auto" => {}
        _ => {
            output::error(&format!("Invalid color option: {}", cli.color));
            std::process::exit(2);
        }
    }

    let opts = GlobalOpts {
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let result = match &cli.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
        _ => run_configured(&cli, opts).await,
    };

    if let Err(e) = result {
        output::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

fn print_version() {
    println!("lfsync {}", env!("CARGO_PKG_VERSION"));
    println!("rust-version: {}", env!("CARGO_PKG_RUST_VERSION"));
    println!("license: {}", env!("CARGO_PKG_LICENSE"));
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "lfsync", &mut io::stdout());
}
