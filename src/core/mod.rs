//! Core types for the updater.
//!
//! This module holds the error taxonomy shared by the host CLI, the session
//! layer, and the detached installer process. Every operation that can fail
//! returns a [`Result`] carrying an [`UpdateError`] (or an `anyhow::Error`
//! wrapping one at orchestration seams); the CLI boundary converts those into
//! colored, actionable output via [`user_friendly_error`].

pub mod error;

pub use error::{ErrorContext, InstallPhase, UpdateError, user_friendly_error};
