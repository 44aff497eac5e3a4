//! Error handling for the updater.
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`UpdateError`]) so callers can react to the
//!    failure class precisely: a transient feed error is logged and ignored,
//!    while a failed rollback must surface loudly.
//! 2. **User-friendly messages** ([`ErrorContext`], [`user_friendly_error`])
//!    with actionable suggestions at the CLI boundary.
//!
//! # Failure classes and their blast radius
//!
//! - [`UpdateError::Network`] / [`UpdateError::Parse`]: best-effort update
//!   checks; recovered locally, the host keeps running its current version.
//! - [`UpdateError::Download`] / [`UpdateError::Unpack`]: abort the cycle
//!   before any install-directory mutation; fully recoverable.
//! - [`UpdateError::Handoff`]: the installer could not be spawned; the host
//!   keeps running the old version.
//! - [`UpdateError::Install`]: tagged with the [`InstallPhase`] it occurred
//!   in; a `Swap` failure triggers rollback.
//! - [`UpdateError::RollbackFailed`]: the only truly fatal case: the
//!   installation may be broken and manual reinstall may be required.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Phase of the installer state machine, used to tag [`UpdateError::Install`]
/// failures so the installer knows whether a rollback is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    /// Polling for the host process to exit.
    WaitForExit,
    /// Moving the current installation aside to the backup location.
    Backup,
    /// Moving the staged tree into the install path.
    Swap,
    /// Spawning the updated application.
    Relaunch,
    /// Removing the archive and backup after a successful swap.
    Cleanup,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitForExit => "wait-for-exit",
            Self::Backup => "backup",
            Self::Swap => "swap",
            Self::Relaunch => "relaunch",
            Self::Cleanup => "cleanup",
        };
        write!(f, "{name}")
    }
}

/// The main error type for update operations.
///
/// Variants map one-to-one onto the failure classes of the update cycle; see
/// the module docs for the recovery policy attached to each class.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The release feed was unreachable, timed out, or answered non-2xx.
    #[error("network error during {operation}")]
    Network {
        /// What was being attempted ("release feed check", "checksum fetch", ...).
        operation: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The feed responded but its body could not be interpreted.
    #[error("failed to parse release feed: {reason}")]
    Parse {
        /// Why parsing failed (malformed JSON, unparseable tag, ...).
        reason: String,
    },

    /// The asset transfer failed or the archive could not be written.
    #[error("download failed: {reason}")]
    Download {
        /// Why the download failed.
        reason: String,
    },

    /// Checksum sidecar was present but did not match the archive.
    #[error("checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Asset filename.
        asset: String,
        /// Digest from the sidecar file.
        expected: String,
        /// Digest computed from the downloaded archive.
        actual: String,
    },

    /// The archive was corrupt or did not contain the expected executable.
    #[error("failed to unpack update package: {reason}")]
    Unpack {
        /// Why unpacking failed.
        reason: String,
    },

    /// The installer process could not be spawned; the host keeps running.
    #[error("could not hand off to installer: {reason}")]
    Handoff {
        /// Why the spawn failed.
        reason: String,
    },

    /// The installer failed mid-transaction.
    #[error("install failed during {phase}: {reason}")]
    Install {
        /// The state-machine phase the failure occurred in.
        phase: InstallPhase,
        /// Why the phase failed.
        reason: String,
    },

    /// Rollback after a failed swap also failed. The installation may be
    /// broken; the full transaction state is logged for diagnosis.
    #[error("rollback failed, installation may be broken: {reason}")]
    RollbackFailed {
        /// Why the backup could not be restored.
        reason: String,
    },

    /// A check or update cycle is already running (single-flight policy).
    #[error("an update cycle is already in progress")]
    UpdateInProgress,

    /// The cycle was cancelled before handoff.
    #[error("update cancelled")]
    Cancelled,

    /// Generic IO failure outside the installer transaction.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A version string could not be parsed as semver.
    #[error("invalid version string: {0}")]
    Semver(#[from] semver::Error),
}

impl UpdateError {
    /// Whether this failure left the host installation untouched.
    ///
    /// Everything up to and including handoff failure is recoverable: the
    /// host keeps running its current version and may retry later. Install
    /// and rollback failures are the installer's to report.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Install { .. } | Self::RollbackFailed { .. })
    }
}

/// User-facing wrapper around an error with optional suggestion and details.
///
/// Displayed at the CLI boundary: the error in red, details in yellow,
/// suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// Human-readable error message.
    pub message: String,
    /// Optional actionable suggestion for resolving the error.
    pub suggestion: Option<String>,
    /// Optional additional details about the error.
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with just a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion (shown in green).
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add explanatory details (shown in yellow).
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error into a user-friendly [`ErrorContext`] with suggestions
/// tailored to the failure class.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.downcast_ref::<UpdateError>() {
        return context_for(update_error);
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(format!("{error:#}"))
                .with_suggestion("Check file ownership of the install directory, or re-run with elevated permissions");
        }
    }

    ErrorContext::new(format!("{error:#}"))
}

fn context_for(error: &UpdateError) -> ErrorContext {
    let ctx = ErrorContext::new(error.to_string());
    match error {
        UpdateError::Network { .. } | UpdateError::Parse { .. } => ctx
            .with_details("Update checks are best-effort; the application keeps running on its current version")
            .with_suggestion("Check your network connection and try again later"),
        UpdateError::Download { .. } | UpdateError::Unpack { .. } | UpdateError::ChecksumMismatch { .. } => ctx
            .with_details("The update was aborted before any installed files were touched")
            .with_suggestion("The update failed; try again later"),
        UpdateError::Handoff { .. } => ctx
            .with_details("The update could not be installed; the current version keeps running")
            .with_suggestion("Verify that the installer executable is present in the install directory"),
        UpdateError::Install { phase, .. } => ctx.with_details(format!(
            "The installer failed during the {phase} phase; see the installer log for the full transaction state"
        )),
        UpdateError::RollbackFailed { .. } => ctx
            .with_details("Restoring the previous version failed; the installation may be broken")
            .with_suggestion("Reinstall the application manually, or restore the .backup directory by hand"),
        UpdateError::UpdateInProgress => {
            ctx.with_suggestion("Wait for the running update cycle to finish")
        }
        _ => ctx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_phase_names() {
        assert_eq!(InstallPhase::WaitForExit.to_string(), "wait-for-exit");
        assert_eq!(InstallPhase::Backup.to_string(), "backup");
        assert_eq!(InstallPhase::Swap.to_string(), "swap");
        assert_eq!(InstallPhase::Relaunch.to_string(), "relaunch");
        assert_eq!(InstallPhase::Cleanup.to_string(), "cleanup");
    }

    #[test]
    fn recoverability_classification() {
        let network = UpdateError::Parse {
            reason: "bad json".into(),
        };
        assert!(network.is_recoverable());

        let handoff = UpdateError::Handoff {
            reason: "spawn failed".into(),
        };
        assert!(handoff.is_recoverable());

        let install = UpdateError::Install {
            phase: InstallPhase::Swap,
            reason: "disk full".into(),
        };
        assert!(!install.is_recoverable());

        let rollback = UpdateError::RollbackFailed {
            reason: "rename failed".into(),
        };
        assert!(!rollback.is_recoverable());
    }

    #[test]
    fn user_friendly_rollback_is_distinct() {
        let err = anyhow::Error::new(UpdateError::RollbackFailed {
            reason: "permission denied".into(),
        });
        let ctx = user_friendly_error(err);
        assert!(ctx.message.contains("installation may be broken"));
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn error_context_display_includes_parts() {
        let ctx = ErrorContext::new("boom")
            .with_details("why")
            .with_suggestion("fix it");
        let rendered = format!("{ctx}");
        assert!(rendered.contains("boom"));
        assert!(rendered.contains("Details: why"));
        assert!(rendered.contains("Suggestion: fix it"));
    }
}
