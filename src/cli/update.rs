//! The `update` subcommand.
//!
//! Runs the full cycle: recovery sweep, feed check, download, verification,
//! unpacking, and finally the handoff that replaces this very process. On a
//! successful handoff this command never returns.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::config::UpdaterConfig;
use crate::handoff::HandoffCoordinator;
use crate::install;
use crate::session::{UpdateEvent, UpdateSession};
use crate::utils::progress::ProgressBar;
use crate::version::installed_version;

/// Download and install the latest release.
#[derive(Args)]
pub struct UpdateCommand {
    /// Reinstall even when the installed version is already current.
    #[arg(long)]
    force: bool,

    /// Stage the update but stop before handing off to the installer.
    #[arg(long)]
    no_handoff: bool,

    /// Installation directory to update. Defaults to the directory
    /// containing this executable.
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,

    /// Override the release feed URL from the config file.
    #[arg(long, value_name = "URL")]
    feed_url: Option<String>,
}

impl UpdateCommand {
    pub async fn execute(self) -> Result<()> {
        let mut config = UpdaterConfig::load().await?;
        if let Some(feed_url) = self.feed_url {
            config.feed_url = feed_url;
        }

        let install_dir = super::resolve_install_dir(self.install_dir)?;

        // Sweep up any interrupted transaction before starting a new one.
        if install::recover(&install_dir)? {
            println!(
                "{} restored the previous version from backup",
                "Recovery:".yellow().bold()
            );
        }

        let current = installed_version(&install_dir);
        let executable_name = config.executable_name.clone();
        let (session, events) = UpdateSession::new(config)?;
        let renderer = spawn_renderer(events);

        let staged = session.update(&current, self.force).await;
        let _ = renderer.await;

        let Some(staged) = staged? else {
            println!(
                "{} version {} is up to date",
                "✓".green(),
                current.to_string().bold()
            );
            return Ok(());
        };

        let version = staged.release.version.clone();
        if self.no_handoff {
            let path = staged.into_handoff_path();
            println!(
                "{} version {} staged at {}",
                "✓".green(),
                version.to_string().bold(),
                path.display()
            );
            println!("Handoff skipped; run the installer manually to finish");
            return Ok(());
        }

        println!(
            "{} installing version {} and restarting",
            "✓".green(),
            version.to_string().bold()
        );

        let coordinator = HandoffCoordinator::new(install_dir, &executable_name);
        let staged_path = staged.into_handoff_path();
        let never = coordinator.begin(&staged_path, std::process::id())?;
        match never {}
    }
}

/// Render session events to the terminal until the stream terminates.
fn spawn_renderer(mut events: UnboundedReceiver<UpdateEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;

        while let Some(event) = events.recv().await {
            match event {
                UpdateEvent::Checking => {
                    println!("Checking for updates...");
                }
                UpdateEvent::UpdateAvailable { current, latest } => {
                    println!(
                        "Update available: {} -> {}",
                        current.to_string().yellow(),
                        latest.to_string().green()
                    );
                }
                UpdateEvent::Downloading(progress) => {
                    let bar = bar.get_or_insert_with(|| {
                        let bar = match progress.bytes_total {
                            Some(total) => ProgressBar::download(total),
                            None => ProgressBar::new_spinner(),
                        };
                        bar.set_message("Downloading");
                        bar
                    });
                    bar.set_position(progress.bytes_done);
                }
                UpdateEvent::Verifying => {
                    finish(&mut bar);
                    println!("Verifying download...");
                }
                UpdateEvent::Unpacking => {
                    finish(&mut bar);
                    println!("Unpacking...");
                }
                // The session keeps its sender for later cycles, so the
                // stream only ends logically, with the terminal event.
                UpdateEvent::Terminal(_) => {
                    finish(&mut bar);
                    break;
                }
            }
        }
    })
}

fn finish(bar: &mut Option<ProgressBar>) {
    if let Some(bar) = bar.take() {
        bar.finish_and_clear();
    }
}
