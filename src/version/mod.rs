//! Version discovery and comparison.
//!
//! The local side of the version oracle reads a plain-text `VERSION.txt`
//! marker co-located with the installed application; the remote side
//! ([`feed::ReleaseFeed`]) queries the release endpoint. Comparison uses
//! standard semver ordering, including pre-release precedence, and an update
//! is offered only when the remote version is strictly greater.
//!
//! A missing or unreadable marker never fails the caller: it reads as
//! `0.0.0`, which compares older than any parseable remote version.

use semver::Version;
use std::path::Path;
use tracing::{debug, warn};

use crate::constants::VERSION_MARKER;
use crate::core::UpdateError;

pub mod cache;
pub mod feed;

pub use cache::CheckCache;
pub use feed::{ReleaseFeed, ReleaseInfo};

/// Parse a version string, tolerating a leading `v` (release tags are
/// commonly written `v1.2.3`).
pub fn parse_version(raw: &str) -> Result<Version, UpdateError> {
    let trimmed = raw.trim().trim_start_matches('v');
    Ok(Version::parse(trimmed)?)
}

/// Read the installed version from the marker file inside `install_dir`.
///
/// Returns `0.0.0` when the marker is missing, unreadable, or unparseable:
/// an absent marker means "older than anything", never an error.
pub fn installed_version(install_dir: &Path) -> Version {
    let marker = install_dir.join(VERSION_MARKER);

    match std::fs::read_to_string(&marker) {
        Ok(content) => match parse_version(&content) {
            Ok(version) => {
                debug!("Installed version {} read from {}", version, marker.display());
                version
            }
            Err(e) => {
                warn!("Unparseable version marker {}: {}", marker.display(), e);
                Version::new(0, 0, 0)
            }
        },
        Err(e) => {
            debug!("No version marker at {} ({}); assuming 0.0.0", marker.display(), e);
            Version::new(0, 0, 0)
        }
    }
}

/// Format current/latest version information for status display.
#[must_use]
pub fn format_version_info(current: &Version, latest: Option<&Version>) -> String {
    match latest {
        Some(v) if v > current => {
            format!("Current version: {current}\nLatest version:  {v} (update available)")
        }
        _ => format!("Current version: {current} (up to date)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_tolerates_v_prefix_and_whitespace() {
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version(" v2.0.0\n").unwrap(), Version::new(2, 0, 0));
        assert!(parse_version("not-a-version").is_err());
    }

    #[test]
    fn ordering_matrix() {
        let pairs = [
            ("1.0.0", "1.0.1"),
            ("1.0.0", "1.1.0"),
            ("1.9.9", "2.0.0"),
            ("1.0.0-rc.1", "1.0.0"),
            ("1.0.0-alpha", "1.0.0-beta"),
        ];
        for (older, newer) in pairs {
            let a = parse_version(older).unwrap();
            let b = parse_version(newer).unwrap();
            assert!(a < b, "{older} should be older than {newer}");
            assert!(b > a);
        }
        let v = parse_version("1.2.3").unwrap();
        assert_eq!(v, parse_version("v1.2.3").unwrap());
    }

    #[test]
    fn missing_marker_reads_as_zero() {
        let temp = TempDir::new().unwrap();
        assert_eq!(installed_version(temp.path()), Version::new(0, 0, 0));
    }

    #[test]
    fn marker_is_read_and_trimmed() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(VERSION_MARKER), "v1.4.2\n").unwrap();
        assert_eq!(installed_version(temp.path()), Version::new(1, 4, 2));
    }

    #[test]
    fn garbage_marker_reads_as_zero() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(VERSION_MARKER), "release-candidate").unwrap();
        assert_eq!(installed_version(temp.path()), Version::new(0, 0, 0));
    }

    #[test]
    fn format_info_reports_update() {
        let current = Version::new(1, 0, 0);
        let latest = Version::new(1, 1, 0);

        let info = format_version_info(&current, Some(&latest));
        assert!(info.contains("update available"));

        let info = format_version_info(&current, Some(&current));
        assert!(info.contains("up to date"));

        let info = format_version_info(&current, None);
        assert!(info.contains("up to date"));
    }
}
