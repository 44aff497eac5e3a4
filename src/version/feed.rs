//! Remote release feed.
//!
//! [`ReleaseFeed`] performs a single bounded HTTP GET against a GitHub-style
//! release endpoint and decides whether an update should be offered. The
//! check is best-effort by contract: every failure is a typed error that the
//! caller logs and ignores, and a release whose assets do not match the
//! expected package suffix is reported as "no update" rather than an error.

use reqwest::Client;
use semver::Version;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::UpdaterConfig;
use crate::constants::{FEED_TIMEOUT, user_agent};
use crate::core::UpdateError;
use crate::version::parse_version;

/// A downloadable release selected from the feed.
///
/// Immutable once produced; the URL is used verbatim for the download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Version parsed from the release tag.
    pub version: Version,
    /// Direct download URL of the matching asset.
    pub asset_url: String,
    /// Filename of the matching asset.
    pub asset_name: String,
}

/// Wire format of the release document.
#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    tag_name: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

/// Client for the remote release-metadata endpoint.
pub struct ReleaseFeed {
    client: Client,
    feed_url: String,
    asset_suffix: String,
}

impl ReleaseFeed {
    /// Build a feed client from the updater configuration.
    pub fn new(client: Client, config: &UpdaterConfig) -> Self {
        Self {
            client,
            feed_url: config.feed_url.clone(),
            asset_suffix: config.asset_suffix.clone(),
        }
    }

    /// Query the feed and return the release to install, if any.
    ///
    /// Returns `Ok(None)` when the latest release is not strictly newer than
    /// `current`, or when no asset matches the configured suffix. Network and
    /// parse failures are typed errors; callers treat them as non-fatal.
    pub async fn check_latest(&self, current: &Version) -> Result<Option<ReleaseInfo>, UpdateError> {
        match self.fetch_latest().await? {
            Some(release) if release.version > *current => {
                info!("Update available: {} -> {}", current, release.version);
                Ok(Some(release))
            }
            Some(release) => {
                debug!("Latest release {} is not newer than {}", release.version, current);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Query the feed for the latest release without comparing versions.
    ///
    /// Used by forced updates, which reinstall even when already current.
    pub async fn fetch_latest(&self) -> Result<Option<ReleaseInfo>, UpdateError> {
        debug!("Querying release feed at {}", self.feed_url);

        let response = self
            .client
            .get(&self.feed_url)
            .header("User-Agent", user_agent())
            .timeout(FEED_TIMEOUT)
            .send()
            .await
            .map_err(|source| UpdateError::Network {
                operation: "release feed check".to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Parse {
                reason: format!("feed answered HTTP {status}"),
            });
        }

        let body = response.text().await.map_err(|source| UpdateError::Network {
            operation: "release feed read".to_string(),
            source,
        })?;

        parse_release(&body, &self.asset_suffix)
    }
}

/// Parse a release document and select the asset matching `suffix`.
///
/// Returns `Ok(None)` when the release carries no matching asset. A newer
/// version without a package for this platform is deliberately treated as
/// "no update" rather than a failure.
pub fn parse_release(body: &str, suffix: &str) -> Result<Option<ReleaseInfo>, UpdateError> {
    let document: ReleaseDocument =
        serde_json::from_str(body).map_err(|e| UpdateError::Parse {
            reason: format!("malformed release document: {e}"),
        })?;

    let version = parse_version(&document.tag_name).map_err(|_| UpdateError::Parse {
        reason: format!("unparseable release tag '{}'", document.tag_name),
    })?;

    let Some(asset) = document.assets.iter().find(|a| a.name.ends_with(suffix)) else {
        warn!(
            "Release {} has no asset matching '{}'; treating as no update",
            version, suffix
        );
        return Ok(None);
    };

    Ok(Some(ReleaseInfo {
        version,
        asset_url: asset.browser_download_url.clone(),
        asset_name: asset.name.clone(),
    }))
}
