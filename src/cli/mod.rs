//! Command-line interface for the updater.
//!
//! The `uniconv-update` binary exposes three subcommands:
//!
//! - `check` - query the release feed and report whether an update exists
//! - `status` - report the installed version and last check without network
//! - `update` - run a full update cycle and hand off to the installer
//! - `recover` - repair an installation after an interrupted update
//!
//! Global flags control verbosity (`--verbose` / `--quiet`), progress
//! animations (`--no-progress`), and the config file location (`--config`).
//! Flags are translated into environment variables once at startup via
//! [`CliConfig::apply_to_env`], so the rest of the crate reads a single
//! source of truth.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod check;
mod recover;
mod status;
mod update;

pub use check::CheckCommand;
pub use recover::RecoverCommand;
pub use status::StatusCommand;
pub use update::UpdateCommand;

/// Structured form of the global CLI flags.
///
/// Kept separate from [`Cli`] so tests can inject a configuration without
/// parsing arguments.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Value for `RUST_LOG`; `None` leaves the environment untouched.
    pub log_level: Option<String>,
    /// Disable progress indicators.
    pub no_progress: bool,
    /// Override the updater config file location.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply this configuration to the process environment.
    ///
    /// Sets `RUST_LOG`, `UNICONV_NO_PROGRESS`, and `UNICONV_CONFIG` as
    /// needed. Called once at startup, before the async runtime spawns any
    /// other threads.
    pub fn apply_to_env(&self) {
        if let Some(level) = &self.log_level {
            if std::env::var_os("RUST_LOG").is_none() {
                unsafe {
                    std::env::set_var("RUST_LOG", level);
                }
            }
        }

        if self.no_progress {
            unsafe {
                std::env::set_var("UNICONV_NO_PROGRESS", "1");
            }
        }

        if let Some(path) = &self.config_path {
            unsafe {
                std::env::set_var("UNICONV_CONFIG", path);
            }
        }
    }
}

/// The `uniconv-update` command line.
#[derive(Parser)]
#[command(
    name = "uniconv-update",
    version,
    about = "Check for and install UniConv updates"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output for debugging.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Disable progress bars and spinners.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Path to the updater config file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a newer release is available.
    Check(CheckCommand),
    /// Show the installed version and the last check result.
    Status(StatusCommand),
    /// Download, verify, and install the latest release.
    Update(UpdateCommand),
    /// Repair the installation after an interrupted update.
    Recover(RecoverCommand),
}

impl Cli {
    /// Run the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("warn".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Run with an injected configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply_to_env();

        match self.command {
            Commands::Check(cmd) => cmd.execute().await,
            Commands::Status(cmd) => cmd.execute().await,
            Commands::Update(cmd) => cmd.execute().await,
            Commands::Recover(cmd) => cmd.execute().await,
        }
    }
}

/// Resolve the installation directory: an explicit flag wins, otherwise the
/// directory containing the current executable.
pub(crate) fn resolve_install_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    use anyhow::Context;

    if let Some(dir) = explicit {
        return Ok(dir);
    }
    let exe = std::env::current_exe().context("Cannot determine the current executable path")?;
    exe.parent()
        .map(std::path::Path::to_path_buf)
        .context("Executable has no parent directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_selects_debug_logging() {
        let cli = Cli::parse_from(["uniconv-update", "--verbose", "check"]);
        let config = cli.build_config();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn quiet_disables_logging() {
        let cli = Cli::parse_from(["uniconv-update", "--quiet", "check"]);
        let config = cli.build_config();
        assert!(config.log_level.is_none());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let result = Cli::try_parse_from(["uniconv-update", "-v", "-q", "check"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_reach_subcommands() {
        let cli = Cli::parse_from(["uniconv-update", "update", "--no-progress"]);
        let config = cli.build_config();
        assert!(config.no_progress);
    }

    #[test]
    fn config_flag_is_captured() {
        let cli = Cli::parse_from([
            "uniconv-update",
            "--config",
            "/tmp/updater.toml",
            "check",
        ]);
        let config = cli.build_config();
        assert_eq!(config.config_path, Some(PathBuf::from("/tmp/updater.toml")));
    }
}
