//! Updater configuration.
//!
//! [`UpdaterConfig`] controls where releases are fetched from, how updates
//! are verified, and how the detached installer behaves. It is loaded from
//! a TOML file at the platform config location (override with the
//! `UNICONV_CONFIG` environment variable); a missing file yields defaults so
//! the updater works out of the box.
//!
//! # TOML Example
//!
//! ```toml
//! feed_url = "https://api.github.com/repos/uniconv/uniconv/releases/latest"
//! asset_suffix = ".zip"
//! executable_name = "uniconv"
//! check_on_startup = false
//! check_interval = 86400
//! verify_checksum = true
//! poll_interval_ms = 500
//! wait_timeout_secs = 120
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Configuration for update checking, download verification, and the
/// installer handoff.
///
/// All fields carry serde defaults, so a partial config file only needs to
/// name the settings it changes. The defaults favour safety: checks are
/// manual, checksums are verified, and the installer's wait on the host is
/// bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Release-metadata endpoint queried for the latest version.
    ///
    /// Expected to answer a GitHub-style release document: `tag_name` plus
    /// an `assets` array with `name` and `browser_download_url` fields.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Filename suffix identifying the downloadable package among the
    /// release assets (`.zip` for the standard bundle).
    #[serde(default = "default_asset_suffix")]
    pub asset_suffix: String,

    /// Name of the application executable to locate inside the unpacked
    /// package and to relaunch after the swap.
    #[serde(default = "default_executable_name")]
    pub executable_name: String,

    /// Whether the host checks for updates when it starts.
    ///
    /// Disabled by default to keep startup free of network latency; the
    /// check can always be triggered manually.
    #[serde(default)]
    pub check_on_startup: bool,

    /// Minimum seconds between automatic update checks. `0` disables
    /// automatic checking entirely.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Whether to verify the downloaded archive against a `.sha256`
    /// sidecar published next to the asset. Verification is skipped with a
    /// warning when no sidecar exists.
    #[serde(default = "default_verify_checksum")]
    pub verify_checksum: bool,

    /// Milliseconds between the installer's liveness polls while waiting
    /// for the host process to exit.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound in seconds on the installer's wait for the host to
    /// exit. On timeout the installer fails without touching the
    /// installation.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

fn default_feed_url() -> String {
    "https://api.github.com/repos/uniconv/uniconv/releases/latest".to_string()
}

fn default_asset_suffix() -> String {
    ".zip".to_string()
}

fn default_executable_name() -> String {
    if cfg!(windows) {
        "uniconv.exe".to_string()
    } else {
        "uniconv".to_string()
    }
}

fn default_check_interval() -> u64 {
    86400 // 24 hours
}

fn default_verify_checksum() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_wait_timeout_secs() -> u64 {
    120
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            asset_suffix: default_asset_suffix(),
            executable_name: default_executable_name(),
            check_on_startup: false,
            check_interval: default_check_interval(),
            verify_checksum: default_verify_checksum(),
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

impl UpdaterConfig {
    /// Load the configuration from the default location.
    ///
    /// Resolution order: the `UNICONV_CONFIG` environment variable, then the
    /// platform config directory (`~/.config/uniconv/updater.toml` on Linux).
    /// A missing file yields [`UpdaterConfig::default`]; a present but
    /// malformed file is an error.
    pub async fn load() -> Result<Self> {
        let path = match std::env::var_os("UNICONV_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => Self::default_path()?,
        };
        Self::load_from_optional(&path).await
    }

    /// Load from a specific path, falling back to defaults when the file
    /// does not exist.
    pub async fn load_from_optional(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load and parse a config file that is expected to exist.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read updater config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse updater config from {}", path.display()))
    }

    /// Default platform-specific config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Unable to determine the user configuration directory")?
            .join("uniconv");
        Ok(config_dir.join("updater.toml"))
    }

    /// Installer poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Installer wait timeout as a [`Duration`].
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_safe() {
        let config = UpdaterConfig::default();
        assert!(!config.check_on_startup);
        assert_eq!(config.check_interval, 86400);
        assert!(config.verify_checksum);
        assert_eq!(config.asset_suffix, ".zip");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.wait_timeout(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("updater.toml");

        let config = UpdaterConfig::load_from_optional(&path).await.unwrap();
        assert_eq!(config.feed_url, default_feed_url());
    }

    #[tokio::test]
    async fn partial_file_fills_in_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("updater.toml");
        tokio::fs::write(
            &path,
            "feed_url = \"https://releases.example.com/latest\"\ncheck_interval = 3600\n",
        )
        .await
        .unwrap();

        let config = UpdaterConfig::load_from_optional(&path).await.unwrap();
        assert_eq!(config.feed_url, "https://releases.example.com/latest");
        assert_eq!(config.check_interval, 3600);
        // Unspecified fields keep their defaults.
        assert_eq!(config.asset_suffix, ".zip");
        assert!(config.verify_checksum);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("updater.toml");
        tokio::fs::write(&path, "feed_url = [not toml").await.unwrap();

        assert!(UpdaterConfig::load_from_optional(&path).await.is_err());
    }
}
