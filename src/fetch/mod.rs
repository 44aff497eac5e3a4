//! Package download.
//!
//! [`PackageFetcher`] streams a release asset into a freshly created staging
//! directory, reporting progress per received chunk and honouring a
//! cooperative cancellation flag. Nothing outside the staging directory is
//! touched, so any failure here aborts the update cycle with the installed
//! application intact.

use futures::StreamExt;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::constants::{STAGING_PREFIX, user_agent};
use crate::core::UpdateError;
use crate::version::ReleaseInfo;

/// Byte-level progress of an in-flight download.
///
/// `bytes_total` is `None` when the server did not send a Content-Length;
/// consumers should fall back to an indeterminate indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes received and written so far.
    pub bytes_done: u64,
    /// Total size of the asset, when known.
    pub bytes_total: Option<u64>,
}

/// A downloaded archive inside its staging directory.
///
/// The staging directory is removed when this value is dropped. Before a
/// handoff the caller detaches it with [`DownloadedArchive::keep`], because
/// the installer outlives the host process that created the directory.
#[derive(Debug)]
pub struct DownloadedArchive {
    staging: TempDir,
    archive_path: PathBuf,
}

impl DownloadedArchive {
    /// Path of the downloaded archive file.
    pub fn archive_path(&self) -> &std::path::Path {
        &self.archive_path
    }

    /// Path of the staging directory holding the archive.
    pub fn staging_dir(&self) -> &std::path::Path {
        self.staging.path()
    }

    /// Disable automatic removal of the staging directory and return the
    /// archive path. Used at handoff, when cleanup becomes the installer's
    /// responsibility.
    pub fn keep(self) -> PathBuf {
        let _ = self.staging.keep();
        self.archive_path
    }
}

/// Streams release assets to local disk.
pub struct PackageFetcher {
    client: Client,
}

impl PackageFetcher {
    /// Create a fetcher using the shared HTTP client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download the release asset into a fresh staging directory.
    ///
    /// `on_progress` is called after every chunk is written. The `cancel`
    /// flag is checked between chunks; when it is raised the partial
    /// download is discarded and [`UpdateError::Cancelled`] is returned.
    pub async fn download(
        &self,
        release: &ReleaseInfo,
        cancel: &Arc<AtomicBool>,
        mut on_progress: impl FnMut(DownloadProgress),
    ) -> Result<DownloadedArchive, UpdateError> {
        let staging = TempDir::with_prefix(STAGING_PREFIX)?;
        let archive_path = staging.path().join(&release.asset_name);

        info!(
            "Downloading {} from {} to {}",
            release.asset_name,
            release.asset_url,
            archive_path.display()
        );

        let response = self
            .client
            .get(&release.asset_url)
            .header("User-Agent", user_agent())
            .send()
            .await
            .map_err(|source| UpdateError::Network {
                operation: format!("download of {}", release.asset_name),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Download {
                reason: format!("server answered HTTP {status} for {}", release.asset_url),
            });
        }

        let bytes_total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(&archive_path).await?;
        let mut bytes_done: u64 = 0;

        while let Some(chunk) = stream.next().await {
            if cancel.load(Ordering::SeqCst) {
                debug!("Download cancelled after {bytes_done} bytes");
                return Err(UpdateError::Cancelled);
            }

            let chunk = chunk.map_err(|source| UpdateError::Network {
                operation: format!("download of {}", release.asset_name),
                source,
            })?;

            file.write_all(&chunk).await?;
            bytes_done += chunk.len() as u64;
            on_progress(DownloadProgress {
                bytes_done,
                bytes_total,
            });
        }

        file.flush().await?;
        drop(file);

        info!("Downloaded {bytes_done} bytes to {}", archive_path.display());

        Ok(DownloadedArchive {
            staging,
            archive_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_dir_is_removed_on_drop() {
        let staging = TempDir::with_prefix(STAGING_PREFIX).unwrap();
        let archive_path = staging.path().join("pkg.zip");
        std::fs::write(&archive_path, b"archive bytes").unwrap();

        let staging_path = staging.path().to_path_buf();
        let archive = DownloadedArchive {
            staging,
            archive_path,
        };
        assert!(archive.archive_path().exists());

        drop(archive);
        assert!(!staging_path.exists());
    }

    #[test]
    fn keep_detaches_the_staging_dir() {
        let staging = TempDir::with_prefix(STAGING_PREFIX).unwrap();
        let archive_path = staging.path().join("pkg.zip");
        std::fs::write(&archive_path, b"archive bytes").unwrap();

        let staging_path = staging.path().to_path_buf();
        let archive = DownloadedArchive {
            staging,
            archive_path,
        };

        let kept = archive.keep();
        assert!(kept.exists());
        assert!(staging_path.exists());

        std::fs::remove_dir_all(&staging_path).unwrap();
    }

    async fn serve_once(body: Vec<u8>) -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt as _};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 512];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(header.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn download_writes_every_byte_and_reports_the_total() {
        let body: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let addr = serve_once(body.clone()).await;

        let release = ReleaseInfo {
            version: semver::Version::new(2, 0, 0),
            asset_url: format!("http://{addr}/uniconv-2.0.0.zip"),
            asset_name: "uniconv-2.0.0.zip".to_string(),
        };
        let cancel = Arc::new(AtomicBool::new(false));
        let mut last = None;

        let fetcher = PackageFetcher::new(Client::new());
        let archive = fetcher
            .download(&release, &cancel, |progress| last = Some(progress))
            .await
            .unwrap();

        assert_eq!(std::fs::read(archive.archive_path()).unwrap(), body);
        let last = last.unwrap();
        assert_eq!(last.bytes_done, body.len() as u64);
        assert_eq!(last.bytes_total, Some(body.len() as u64));
    }

    #[tokio::test]
    async fn cancelled_download_returns_a_typed_error() {
        let body = vec![0u8; 1024];
        let addr = serve_once(body).await;

        let release = ReleaseInfo {
            version: semver::Version::new(2, 0, 0),
            asset_url: format!("http://{addr}/uniconv-2.0.0.zip"),
            asset_name: "uniconv-2.0.0.zip".to_string(),
        };
        let cancel = Arc::new(AtomicBool::new(true));

        let fetcher = PackageFetcher::new(Client::new());
        let err = fetcher
            .download(&release, &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Cancelled));
    }

    #[test]
    fn progress_total_is_optional() {
        let with_total = DownloadProgress {
            bytes_done: 512,
            bytes_total: Some(1024),
        };
        let without = DownloadProgress {
            bytes_done: 512,
            bytes_total: None,
        };
        assert_eq!(with_total.bytes_total, Some(1024));
        assert!(without.bytes_total.is_none());
    }
}
