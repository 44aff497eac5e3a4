//! The `check` subcommand.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::UpdaterConfig;
use crate::session::UpdateSession;
use crate::version::{format_version_info, installed_version};

/// Query the release feed and report whether an update is available.
///
/// Respects the on-disk check cache unless `--force` is given, so repeated
/// invocations do not hammer the feed.
#[derive(Args)]
pub struct CheckCommand {
    /// Query the feed even when a recent cached result exists.
    #[arg(long)]
    force: bool,

    /// Installation directory to read the current version from.
    /// Defaults to the directory containing this executable.
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,
}

impl CheckCommand {
    pub async fn execute(self) -> Result<()> {
        let config = UpdaterConfig::load().await?;
        let install_dir = super::resolve_install_dir(self.install_dir)?;
        let current = installed_version(&install_dir);

        let (session, _events) = UpdateSession::new(config)?;
        let latest = session.check(&current, self.force).await?;

        println!("{}", format_version_info(&current, latest.as_ref()));
        if let Some(latest) = latest {
            println!(
                "\nRun {} to install version {}",
                "uniconv-update update".cyan(),
                latest.to_string().green()
            );
        }
        Ok(())
    }
}
