//! UniConv updater - self-update and in-place installation for the UniConv
//! desktop media converter.
//!
//! The updater is split across two executables built from this crate:
//!
//! - `uniconv-update` runs inside (or next to) the application. It checks
//!   the release feed, downloads and verifies the package, unpacks it into a
//!   staging directory, and hands off to the installer before exiting.
//! - `uniconv-installer` runs detached after the host has exited. It waits
//!   for the host PID to disappear, backs up the current installation, swaps
//!   the staged tree into place, relaunches the application, and cleans up.
//!   A failed swap rolls back from the backup.
//!
//! # Update Cycle
//!
//! ```text
//! check feed -> download -> verify -> unpack -> handoff
//!                                                  |
//!                    (host exits, installer takes over)
//!                                                  v
//!   wait-for-exit -> backup -> swap -> relaunch -> cleanup
//!                                |
//!                            rollback on swap failure
//! ```
//!
//! The ordering is the safety argument: the backup exists before the
//! installation is touched, and is only removed after the new version has
//! launched. [`install::recover`] repairs the crash windows in between at
//! the next startup.
//!
//! # Core Modules
//!
//! - [`cli`] - `uniconv-update` command-line interface
//! - [`config`] - updater configuration (`updater.toml`)
//! - [`core`] - error taxonomy and user-facing error rendering
//! - [`session`] - per-host orchestration: single flight, events, cancellation
//! - [`version`] - installed-version discovery and the release feed
//! - [`fetch`] - streaming package download
//! - [`verify`] - SHA-256 sidecar verification
//! - [`staging`] - archive extraction and executable discovery
//! - [`handoff`] - detached installer spawn
//! - [`install`] - the installer-side transaction and recovery

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod fetch;
pub mod handoff;
pub mod install;
pub mod session;
pub mod staging;
pub mod utils;
pub mod verify;
pub mod version;
