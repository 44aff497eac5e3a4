//! Update session orchestration.
//!
//! [`UpdateSession`] drives one update cycle end to end on the host side:
//! check the feed, download the asset, verify it, unpack it, and produce a
//! staged tree ready for handoff. Progress is reported over an event channel
//! so a UI can render it without being coupled to the pipeline.
//!
//! Two concurrency rules hold per session:
//! - **Single flight**: at most one check or update cycle runs at a time;
//!   a second attempt fails fast with [`UpdateError::UpdateInProgress`].
//! - **Cooperative cancellation**: [`UpdateSession::cancel`] aborts the
//!   cycle at the next phase boundary or download chunk. After handoff has
//!   begun there is nothing left to cancel in this process.

use reqwest::Client;
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::UpdaterConfig;
use crate::constants::{CONNECT_TIMEOUT, user_agent};
use crate::core::UpdateError;
use crate::fetch::{DownloadProgress, DownloadedArchive, PackageFetcher};
use crate::staging::{StagedPackage, StagingUnpacker};
use crate::verify::ChecksumVerifier;
use crate::version::{CheckCache, ReleaseFeed, ReleaseInfo};

/// Progress notifications emitted during a cycle.
///
/// The stream always ends with [`UpdateEvent::Terminal`]; everything before
/// it is informational.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// Querying the release feed.
    Checking,
    /// A newer (or forced) release was selected for download.
    UpdateAvailable {
        current: Version,
        latest: Version,
    },
    /// Download progress, emitted per received chunk.
    Downloading(DownloadProgress),
    /// Verifying the archive against its checksum sidecar.
    Verifying,
    /// Extracting the archive into the staging area.
    Unpacking,
    /// The cycle finished; carries the outcome or a rendered error.
    Terminal(Result<SessionOutcome, String>),
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The feed had nothing newer than the installed version.
    UpToDate,
    /// An update was downloaded and staged for handoff.
    Staged { version: Version },
}

/// A fully staged update, ready to hand to the installer.
#[derive(Debug)]
pub struct StagedUpdate {
    archive: DownloadedArchive,
    package: StagedPackage,
    /// The release this staging came from.
    pub release: ReleaseInfo,
}

impl StagedUpdate {
    /// Root of the unpacked tree inside the staging directory.
    pub fn staged_root(&self) -> &Path {
        &self.package.root
    }

    /// Detach the staging directory from this process's lifetime and return
    /// the path to pass to the installer. From here on, deleting the staging
    /// material is the installer's job.
    pub fn into_handoff_path(self) -> PathBuf {
        let _ = self.archive.keep();
        self.package.root
    }
}

/// Orchestrates update cycles for one host process.
pub struct UpdateSession {
    config: UpdaterConfig,
    feed: ReleaseFeed,
    fetcher: PackageFetcher,
    verifier: ChecksumVerifier,
    unpacker: StagingUnpacker,
    events: mpsc::UnboundedSender<UpdateEvent>,
    in_flight: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl UpdateSession {
    /// Build a session and the receiving end of its event stream.
    pub fn new(
        config: UpdaterConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<UpdateEvent>), UpdateError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| UpdateError::Network {
                operation: "HTTP client construction".to_string(),
                source,
            })?;

        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            feed: ReleaseFeed::new(client.clone(), &config),
            fetcher: PackageFetcher::new(client.clone()),
            verifier: ChecksumVerifier::new(client),
            unpacker: StagingUnpacker::new(config.executable_name.clone()),
            config,
            events,
            in_flight: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        Ok((session, receiver))
    }

    /// Request cancellation of the running cycle.
    ///
    /// Takes effect at the next phase boundary or download chunk. A no-op
    /// when nothing is running.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Check for a newer release, consulting the on-disk check cache first.
    ///
    /// With `force`, the cache is bypassed and refreshed. Returns the newer
    /// version, or `None` when up to date.
    pub async fn check(
        &self,
        current: &Version,
        force: bool,
    ) -> Result<Option<Version>, UpdateError> {
        let _guard = self.acquire()?;

        if !force {
            if let Some(cached) = self.load_fresh_cache().await {
                debug!("Using cached check result from {}", cached.last_check);
                return Ok(cached.latest_version.filter(|latest| latest > current));
            }
        }

        let latest = self.feed.fetch_latest().await?;
        self.store_cache(latest.as_ref().map(|r| r.version.clone()))
            .await;

        Ok(latest
            .map(|release| release.version)
            .filter(|latest| latest > current))
    }

    /// Run a full cycle: check, download, verify, unpack.
    ///
    /// Returns `Ok(None)` when already up to date (unless `force`), or the
    /// staged update ready for handoff. Emits [`UpdateEvent`]s throughout and
    /// always terminates the stream with [`UpdateEvent::Terminal`].
    pub async fn update(
        &self,
        current: &Version,
        force: bool,
    ) -> Result<Option<StagedUpdate>, UpdateError> {
        let _guard = match self.acquire() {
            Ok(guard) => guard,
            Err(e) => {
                self.emit(UpdateEvent::Terminal(Err(e.to_string())));
                return Err(e);
            }
        };
        self.cancel.store(false, Ordering::SeqCst);

        let result = self.run_cycle(current, force).await;

        let terminal = match &result {
            Ok(Some(staged)) => Ok(SessionOutcome::Staged {
                version: staged.release.version.clone(),
            }),
            Ok(None) => Ok(SessionOutcome::UpToDate),
            Err(e) => Err(e.to_string()),
        };
        self.emit(UpdateEvent::Terminal(terminal));

        result
    }

    async fn run_cycle(
        &self,
        current: &Version,
        force: bool,
    ) -> Result<Option<StagedUpdate>, UpdateError> {
        self.emit(UpdateEvent::Checking);
        let latest = self.feed.fetch_latest().await?;
        self.store_cache(latest.as_ref().map(|r| r.version.clone()))
            .await;

        let release = match latest {
            Some(release) if force || release.version > *current => release,
            Some(release) => {
                info!(
                    "Already up to date ({} installed, {} published)",
                    current, release.version
                );
                return Ok(None);
            }
            None => {
                info!("No installable release published for this platform");
                return Ok(None);
            }
        };

        self.ensure_live()?;
        self.emit(UpdateEvent::UpdateAvailable {
            current: current.clone(),
            latest: release.version.clone(),
        });

        let events = self.events.clone();
        let archive = self
            .fetcher
            .download(&release, &self.cancel, move |progress| {
                let _ = events.send(UpdateEvent::Downloading(progress));
            })
            .await?;

        self.ensure_live()?;
        if self.config.verify_checksum {
            self.emit(UpdateEvent::Verifying);
            self.verifier
                .verify(&release, archive.archive_path())
                .await?;
        }

        self.ensure_live()?;
        self.emit(UpdateEvent::Unpacking);
        let package = self.unpacker.unpack(archive.archive_path()).await?;

        self.ensure_live()?;
        Ok(Some(StagedUpdate {
            archive,
            package,
            release,
        }))
    }

    /// Fail the cycle if cancellation was requested.
    fn ensure_live(&self) -> Result<(), UpdateError> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(UpdateError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Claim the single-flight slot for the duration of the returned guard.
    fn acquire(&self) -> Result<FlightGuard, UpdateError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| UpdateError::UpdateInProgress)?;
        Ok(FlightGuard(Arc::clone(&self.in_flight)))
    }

    fn emit(&self, event: UpdateEvent) {
        // A dropped receiver only means nobody is rendering progress.
        let _ = self.events.send(event);
    }

    async fn load_fresh_cache(&self) -> Option<CheckCache> {
        let path = CheckCache::default_path().ok()?;
        let cache = CheckCache::load(&path).await?;
        cache
            .is_fresh(std::time::Duration::from_secs(self.config.check_interval))
            .then_some(cache)
    }

    async fn store_cache(&self, latest: Option<Version>) {
        let Ok(path) = CheckCache::default_path() else {
            return;
        };
        if let Err(e) = CheckCache::new(latest).save(&path).await {
            warn!("Could not persist check cache: {e}");
        }
    }
}

/// Releases the single-flight slot when the cycle ends, however it ends.
#[derive(Debug)]
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
