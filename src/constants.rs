//! Global constants used throughout the updater.
//!
//! Timeouts, polling intervals, and well-known filenames shared across
//! modules. Defining them centrally keeps the magic numbers discoverable
//! and the host/installer binaries in agreement about on-disk names.

use std::time::Duration;

/// Filename of the plain-text version marker co-located with the
/// installed application.
pub const VERSION_MARKER: &str = "VERSION.txt";

/// Suffix appended to the install directory path to form the backup
/// location used during the swap (e.g. `UniConv` -> `UniConv.backup`).
pub const BACKUP_SUFFIX: &str = ".backup";

/// Name of the detached installer executable, expected to live next to
/// the application inside the install directory.
#[cfg(windows)]
pub const INSTALLER_BIN: &str = "uniconv-installer.exe";
#[cfg(not(windows))]
pub const INSTALLER_BIN: &str = "uniconv-installer";

/// Timeout for a single release-feed request.
///
/// Update checks are best-effort; a hung feed must never stall the host
/// for longer than this.
pub const FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout for the download client.
///
/// No total-request timeout is applied to downloads: large assets on slow
/// links may legitimately take minutes.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix of the temporary staging directories created for downloads. The
/// installer only ever deletes a staged update's parent directory when the
/// parent carries this prefix.
pub const STAGING_PREFIX: &str = "uniconv-update-";

/// Interval at which the installer polls for the host process to exit.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on how long the installer waits for the host to exit
/// before giving up. A host that hangs on shutdown still owns the install
/// directory; proceeding against it would corrupt the installation.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);

/// User agent sent on feed and download requests.
pub fn user_agent() -> String {
    format!("uniconv-updater/{}", env!("CARGO_PKG_VERSION"))
}
