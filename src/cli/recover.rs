//! The `recover` subcommand.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::install;

/// Repair the installation after an interrupted update.
///
/// Restores the `.backup` directory when the installation looks broken, or
/// removes it when the installation is healthy and the backup is stale.
#[derive(Args)]
pub struct RecoverCommand {
    /// Installation directory to repair. Defaults to the directory
    /// containing this executable.
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,
}

impl RecoverCommand {
    pub async fn execute(self) -> Result<()> {
        let install_dir = super::resolve_install_dir(self.install_dir)?;

        if install::recover(&install_dir)? {
            println!(
                "{} restored the previous version at {}",
                "✓".green(),
                install_dir.display()
            );
        } else {
            println!(
                "{} installation at {} is healthy, nothing to recover",
                "✓".green(),
                install_dir.display()
            );
        }
        Ok(())
    }
}
