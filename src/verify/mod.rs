//! Download verification.
//!
//! Publishers may place a `<asset>.sha256` sidecar next to each release
//! asset. When one exists, the downloaded archive must match it; when none
//! exists, verification is skipped with a warning so releases without
//! sidecars still install.

use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::constants::{FEED_TIMEOUT, user_agent};
use crate::core::UpdateError;
use crate::version::ReleaseInfo;

/// Outcome of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The archive matched the published digest.
    Verified,
    /// No sidecar was published for this asset.
    NoSidecar,
}

/// Verifies downloaded archives against published SHA-256 sidecars.
pub struct ChecksumVerifier {
    client: Client,
}

impl ChecksumVerifier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Verify `archive` against the sidecar published for `release`.
    ///
    /// A missing or unreachable sidecar is not an error; a present sidecar
    /// that does not match the archive is [`UpdateError::ChecksumMismatch`].
    pub async fn verify(
        &self,
        release: &ReleaseInfo,
        archive: &Path,
    ) -> Result<VerifyOutcome, UpdateError> {
        let Some(expected) = self.fetch_sidecar(&release.asset_url).await else {
            warn!(
                "No checksum sidecar published for {}; skipping verification",
                release.asset_name
            );
            return Ok(VerifyOutcome::NoSidecar);
        };

        let actual = digest_file(archive).await?;
        if actual.eq_ignore_ascii_case(&expected) {
            info!("Checksum verified for {}", release.asset_name);
            Ok(VerifyOutcome::Verified)
        } else {
            Err(UpdateError::ChecksumMismatch {
                asset: release.asset_name.clone(),
                expected,
                actual,
            })
        }
    }

    /// Fetch `<asset_url>.sha256` and extract the digest. Best-effort:
    /// any failure reads as "no sidecar".
    async fn fetch_sidecar(&self, asset_url: &str) -> Option<String> {
        let sidecar_url = format!("{asset_url}.sha256");
        debug!("Fetching checksum sidecar from {sidecar_url}");

        let response = self
            .client
            .get(&sidecar_url)
            .header("User-Agent", user_agent())
            .timeout(FEED_TIMEOUT)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        let body = response.text().await.ok()?;
        parse_sidecar(&body)
    }
}

/// Extract the hex digest from a sidecar body.
///
/// Accepts both a bare digest and the `sha256sum` format of
/// `<digest>  <filename>`.
fn parse_sidecar(body: &str) -> Option<String> {
    let digest = body.split_whitespace().next()?;
    let valid = digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
    valid.then(|| digest.to_string())
}

/// Compute the SHA-256 digest of a file as lowercase hex.
pub async fn digest_file(path: &Path) -> Result<String, UpdateError> {
    let path = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || -> Result<String, std::io::Error> {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| UpdateError::Download {
        reason: format!("checksum task failed: {e}"),
    })??;

    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn digest_matches_known_vector() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        let digest = digest_file(&path).await.unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn sidecar_accepts_bare_and_sha256sum_formats() {
        let digest = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

        assert_eq!(parse_sidecar(digest).as_deref(), Some(digest));
        assert_eq!(
            parse_sidecar(&format!("{digest}  uniconv-1.2.0.zip\n")).as_deref(),
            Some(digest)
        );
    }

    #[test]
    fn sidecar_rejects_garbage() {
        assert!(parse_sidecar("").is_none());
        assert!(parse_sidecar("<html>404</html>").is_none());
        assert!(parse_sidecar("deadbeef").is_none());
    }
}
