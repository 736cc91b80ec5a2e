//! Command-line interface for seamless-update.
//!
//! Each command lives in its own module with its argument struct and an
//! `execute` method. Global flags select the configuration file and the log
//! level.
//!
//! # Commands
//!
//! - `check` compare deployed and published versions, schedule an update
//! - `update` run one update attempt now
//! - `progress` show the progress record (applies stall detection)
//! - `status` show the last human-readable status line
//! - `reset` clear the progress record and status of a failed attempt
//! - `backups` list retained backups
//! - `cleanup` collect orphaned working directories
//! - `init` write an example configuration
//!
//! # Exit status
//!
//! Non-zero when an attempt aborts, rolls back, or needs manual intervention,
//! and for configuration errors.
//!
//! ```bash
//! seamless-update --config /etc/seamless-update.toml check --apply
//! seamless-update -v update
//! seamless-update progress --watch
//! ```

mod backups;
mod check;
mod cleanup;
mod common;
mod init;
mod progress;
mod reset;
mod status;
mod update;

use crate::config::CONFIG_ENV_VAR;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Configuration file given with `--config` or the environment
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the tracing subscriber. `RUST_LOG` wins over the flags.
    ///
    /// Logs go to stderr so `--json` output stays parseable.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("seamless_update={}", self.log_level)));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Staged, verified updates of a live directory tree.
#[derive(Parser, Debug)]
#[command(
    name = "seamless-update",
    about = "Staged, verified, atomically switched updates with automatic rollback",
    version,
    long_about = "seamless-update downloads a published package, verifies its checksum, stages it beside the live tree, switches it into place, and restores a backup if anything fails."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file.
    ///
    /// Defaults to `~/.seamless-update/config.toml`.
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare deployed and published versions and schedule an update
    Check(check::CheckCommand),
    /// Run one update attempt for the configured target
    Update(update::UpdateCommand),
    /// Show the progress of the current or last attempt
    Progress(progress::ProgressCommand),
    /// Show the last status line
    Status(status::StatusCommand),
    /// Clear the progress record and mark the status as reset
    Reset(reset::ResetCommand),
    /// List retained backups, newest first
    Backups(backups::BackupsCommand),
    /// Remove orphaned temp and staging directories
    Cleanup(cleanup::CleanupCommand),
    /// Write an example configuration file
    Init(init::InitCommand),
}

impl Cli {
    /// Settings derived from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };
        CliConfig {
            log_level: log_level.to_string(),
            config_path: self.config.clone(),
        }
    }

    /// Run the selected command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Run the selected command with explicit settings.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let path = config.config_path;
        match self.command {
            Commands::Check(cmd) => cmd.execute(path).await,
            Commands::Update(cmd) => cmd.execute(path).await,
            Commands::Progress(cmd) => cmd.execute(path).await,
            Commands::Status(cmd) => cmd.execute(path).await,
            Commands::Reset(cmd) => cmd.execute(path).await,
            Commands::Backups(cmd) => cmd.execute(path).await,
            Commands::Cleanup(cmd) => cmd.execute(path).await,
            Commands::Init(cmd) => cmd.execute(path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::try_parse_from(["seamless-update", "-v", "status"]).unwrap();
        assert_eq!(cli.build_config().log_level, "debug");

        let cli = Cli::try_parse_from(["seamless-update", "status", "--quiet"]).unwrap();
        assert_eq!(cli.build_config().log_level, "error");

        let cli = Cli::try_parse_from(["seamless-update", "status"]).unwrap();
        assert_eq!(cli.build_config().log_level, "info");
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["seamless-update", "-v", "-q", "status"]).is_err());
    }

    #[test]
    fn test_config_flag() {
        let cli =
            Cli::try_parse_from(["seamless-update", "--config", "/tmp/c.toml", "update"]).unwrap();
        assert_eq!(cli.build_config().config_path, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn test_command_verification() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
