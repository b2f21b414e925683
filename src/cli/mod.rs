//! Command-line interface for depfetch.
//!
//! # Commands
//!
//! - `resolve` - resolve every declared dependency, writing or consuming lock files depending
//!   on the flags and the lock files present in the project
//! - `load` - replay the resolve records of the previous run without touching the network
//!
//! # Global Options
//!
//! - `--verbose` - debug output
//! - `--quiet` - errors only
//! - `--config` - global configuration file (default `~/.depfetch/config.toml`)
//!
//! # Option precedence
//!
//! Command-line flag, then the matching `DEPFETCH_*` environment variable, then the global
//! configuration file, then the built-in default.
//!
//! ```bash
//! depfetch resolve --lock-versions
//! depfetch resolve --path waf=../waf --checkout gtest=main
//! depfetch load --format json
//! ```

mod resolve;


pub use resolve::{CommonArgs, LoadCommand, OutputFormat, ResolveCommand};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runtime configuration derived from the global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Filter directive for the tracing subscriber, `None` keeps logging to errors only
    pub log_level: Option<String>,
    /// Global configuration file to read instead of the default location
    pub config_path: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "depfetch",
    about = "Resolve source dependencies to stable local paths",
    version,
    long_about = "depfetch fetches the git and http dependencies declared in resolve.json, selects \
                  versions, and pins them with version or path lock files."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the global configuration file
    #[arg(short, long, global = true, env = "DEPFETCH_CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the declared dependencies
    Resolve(ResolveCommand),

    /// Replay the resolve records of the previous run
    Load(LoadCommand),
}

impl Cli {
    /// Run the selected command.
    ///
    /// # Errors
    ///
    /// Any error of the command; `main` turns it into a user-friendly report.
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(&config)
    }

    /// Logging and configuration settings implied by the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Run the command with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Any error of the command.
    pub fn execute_with_config(self, config: &CliConfig) -> Result<()> {
        match self.command {
            Commands::Resolve(cmd) => cmd.execute(config),
            Commands::Load(cmd) => cmd.execute(config),
        }
    }
}
