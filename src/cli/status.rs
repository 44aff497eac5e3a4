//! The `status` subcommand.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::UpdaterConfig;
use crate::version::{CheckCache, installed_version};

/// Report the installed version and the last known check result without
/// touching the network.
#[derive(Args)]
pub struct StatusCommand {
    /// Installation directory to inspect. Defaults to the directory
    /// containing this executable.
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,
}

impl StatusCommand {
    pub async fn execute(self) -> Result<()> {
        let config = UpdaterConfig::load().await?;
        let install_dir = super::resolve_install_dir(self.install_dir)?;
        let current = installed_version(&install_dir);

        println!("Installation:     {}", install_dir.display());
        println!("Current version:  {current}");
        println!("Release feed:     {}", config.feed_url);
        println!(
            "Check on startup: {}",
            if config.check_on_startup { "yes" } else { "no" }
        );

        let cache = match CheckCache::default_path() {
            Ok(path) => CheckCache::load(&path).await,
            Err(_) => None,
        };

        match cache {
            Some(cache) => {
                let fresh = cache.is_fresh(Duration::from_secs(config.check_interval));
                let freshness = if fresh { "fresh" } else { "stale" };
                println!("Last check:       {} ({freshness})", cache.last_check);
                match cache.latest_version {
                    Some(latest) if latest > current => {
                        println!(
                            "Latest known:     {} {}",
                            latest.to_string().green(),
                            "(update available)".bold()
                        );
                    }
                    Some(latest) => {
                        println!("Latest known:     {latest} (up to date)");
                    }
                    None => {
                        println!("Latest known:     none published for this platform");
                    }
                }
            }
            None => {
                println!("Last check:       never");
            }
        }
        Ok(())
    }
}
