//! `uniconv-update` entry point.
//!
//! Parses the command line, wires up logging, runs the requested command,
//! and renders failures as user-friendly errors with suggestions.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use uniconv_updater::cli;
use uniconv_updater::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    // Apply the flags before installing the subscriber so --verbose and
    // --quiet are reflected in the filter.
    let config = cli.build_config();
    config.apply_to_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match cli.execute_with_config(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
