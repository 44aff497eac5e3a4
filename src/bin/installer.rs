//! `uniconv-installer` entry point.
//!
//! Spawned detached by the host right before it exits. Receives exactly
//! three positional arguments: the staged update (archive or directory), the
//! host executable path, and the host PID to wait on. The install directory
//! and the executable name are derived from the host executable path.
//! Because the terminal may be gone by the time anything interesting
//! happens, all diagnostics go to a log file in the system temp directory.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uniconv_updater::config::UpdaterConfig;
use uniconv_updater::core::user_friendly_error;
use uniconv_updater::install::{self, InstallRequest, Installer};

#[derive(Parser)]
#[command(
    name = "uniconv-installer",
    version,
    about = "Swap a staged UniConv update into place (spawned by uniconv-update)"
)]
struct InstallerArgs {
    /// Staged update: a downloaded archive or an unpacked directory.
    staged: PathBuf,

    /// Path of the host application executable being replaced.
    host_exe: PathBuf,

    /// PID of the host process to wait on before touching anything.
    host_pid: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = InstallerArgs::parse();
    init_logging()?;

    info!(
        "uniconv-installer {} starting: staged={}, host_exe={}, host_pid={}",
        env!("CARGO_PKG_VERSION"),
        args.staged.display(),
        args.host_exe.display(),
        args.host_pid
    );

    let Some(install_dir) = args.host_exe.parent().map(PathBuf::from) else {
        bail!(
            "host executable {} has no parent directory",
            args.host_exe.display()
        );
    };
    let Some(executable_name) = args.host_exe.file_name().map(|n| n.to_string_lossy().into_owned())
    else {
        bail!("host executable {} has no file name", args.host_exe.display());
    };

    // A crash in an earlier cycle may have left the installation renamed
    // away to its backup. Repair that before starting a new transaction.
    match install::recover(&install_dir) {
        Ok(true) => info!("Restored the previous installation from its backup"),
        Ok(false) => {}
        Err(e) => error!("Startup recovery failed: {e}"),
    }

    let config = UpdaterConfig::load().await.unwrap_or_else(|e| {
        error!("Config load failed ({e:#}); using defaults");
        UpdaterConfig::default()
    });

    let request = InstallRequest {
        staged: args.staged,
        install_dir,
        host_pid: args.host_pid,
    };
    let installer = Installer::new(request, executable_name)
        .with_wait(config.poll_interval(), config.wait_timeout());

    let outcome = tokio::task::spawn_blocking(move || installer.run())
        .await
        .context("installer task panicked")?;

    match outcome {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Install transaction failed: {e}");
            user_friendly_error(e.into()).display();
            std::process::exit(1);
        }
    }
}

/// Log to a file in the temp directory; stderr may already be detached.
fn init_logging() -> Result<()> {
    let log_path = std::env::temp_dir().join("uniconv-installer.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Cannot open installer log at {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}
