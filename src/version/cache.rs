//! Persistent cache for update-check timestamps.
//!
//! Mirrors the behaviour users expect from auto-updating applications: the
//! feed is not hammered on every startup. The cache records when the last
//! check ran and which version it saw, persisted as JSON next to the updater
//! config. A corrupt or missing cache file simply means "check now".

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Cached result of the most recent feed check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckCache {
    /// When the feed was last queried successfully.
    pub last_check: DateTime<Utc>,
    /// The newest version the feed reported at that time.
    pub latest_version: Option<Version>,
}

impl CheckCache {
    /// Record a check that just completed.
    #[must_use]
    pub fn new(latest_version: Option<Version>) -> Self {
        Self {
            last_check: Utc::now(),
            latest_version,
        }
    }

    /// Whether the cached check is still fresh for the given interval.
    ///
    /// A zero interval means automatic checking is disabled, so any cache
    /// entry counts as fresh.
    #[must_use]
    pub fn is_fresh(&self, interval: Duration) -> bool {
        if interval.is_zero() {
            return true;
        }
        let age = Utc::now().signed_duration_since(self.last_check);
        age.num_seconds() >= 0 && (age.num_seconds() as u64) < interval.as_secs()
    }

    /// Load the cache from disk. Missing or corrupt files yield `None`.
    pub async fn load(path: &Path) -> Option<Self> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(cache) => Some(cache),
            Err(e) => {
                debug!("Ignoring corrupt check cache at {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist the cache, creating parent directories as needed.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write check cache to {}", path.display()))
    }

    /// Default cache file location, next to the updater config.
    pub fn default_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .context("Unable to determine the user cache directory")?
            .join("uniconv");
        Ok(cache_dir.join("update-check.json"))
    }
}
