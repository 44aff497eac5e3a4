//! The installer-side transaction.
//!
//! Runs inside the detached `uniconv-installer` process, after the host has
//! exited. The transaction is a fixed sequence of phases:
//!
//! 1. **wait-for-exit**: poll until the host PID is gone, bounded by a
//!    timeout so a wedged host cannot leave an immortal installer behind.
//! 2. **backup**: move the current installation to `<install_dir>.backup`.
//! 3. **swap**: move the staged tree into the install path. A failure here
//!    triggers rollback from the backup.
//! 4. **relaunch**: spawn the updated application, detached.
//! 5. **cleanup**: delete the staging directory and the backup.
//!
//! Phase ordering is the safety argument: the backup exists before anything
//! destructive happens to the installation, and it is only deleted after the
//! new version has been launched. [`recover`] handles the crash windows in
//! between at the next startup.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};
use tracing::{debug, error, info, warn};

use crate::constants::{
    BACKUP_SUFFIX, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT, STAGING_PREFIX, VERSION_MARKER,
};
use crate::core::{InstallPhase, UpdateError};
use crate::staging;

/// The inputs of one install transaction, as received on the installer's
/// command line.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Staged update: either a downloaded `.zip` archive or an already
    /// unpacked directory.
    pub staged: PathBuf,
    /// Installation directory to replace.
    pub install_dir: PathBuf,
    /// PID of the host process that handed off to us.
    pub host_pid: u32,
}

/// Drives the install transaction to completion.
pub struct Installer {
    request: InstallRequest,
    executable_name: String,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl Installer {
    pub fn new(request: InstallRequest, executable_name: impl Into<String>) -> Self {
        Self {
            request,
            executable_name: executable_name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Override the host-exit polling cadence.
    #[must_use]
    pub fn with_wait(mut self, poll_interval: Duration, wait_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.wait_timeout = wait_timeout;
        self
    }

    /// Location the current installation is moved to during the swap.
    pub fn backup_dir(&self) -> PathBuf {
        backup_path(&self.request.install_dir)
    }

    /// Run the transaction to completion.
    ///
    /// Failures before the swap leave the installation untouched. A swap
    /// failure rolls back from the backup. A relaunch failure is terminal
    /// but deliberately does not roll back: the swap succeeded, the new
    /// version is installed, and the backup is kept for manual recovery.
    pub fn run(&self) -> Result<(), UpdateError> {
        let backup_dir = self.backup_dir();
        info!(
            "Starting install transaction: staged={}, install={}, backup={}, host_pid={}",
            self.request.staged.display(),
            self.request.install_dir.display(),
            backup_dir.display(),
            self.request.host_pid
        );

        self.wait_for_exit()?;
        let staged_root = self.prepare_staged()?;
        self.backup(&backup_dir)?;

        if let Err(swap_error) = self.swap(&staged_root) {
            error!("Swap failed, rolling back: {swap_error}");
            rollback(&self.request.install_dir, &backup_dir)?;
            return Err(swap_error);
        }

        self.relaunch()?;
        self.cleanup(&backup_dir);

        info!("Install transaction complete");
        Ok(())
    }

    /// Poll until the host PID disappears, bounded by the wait timeout.
    fn wait_for_exit(&self) -> Result<(), UpdateError> {
        let deadline = Instant::now() + self.wait_timeout;
        let mut system = System::new();
        let pid = Pid::from_u32(self.request.host_pid);

        loop {
            if !system.refresh_process(pid) {
                info!("Host PID {} has exited", self.request.host_pid);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(UpdateError::Install {
                    phase: InstallPhase::WaitForExit,
                    reason: format!(
                        "host PID {} still running after {:?}",
                        self.request.host_pid, self.wait_timeout
                    ),
                });
            }
            debug!("Host PID {} still running, waiting", self.request.host_pid);
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Resolve the staged input to a directory tree ready to swap in.
    ///
    /// An archive is extracted next to itself first; a directory is used
    /// as-is. Either way, a single wrapping top-level directory is unwrapped.
    fn prepare_staged(&self) -> Result<PathBuf, UpdateError> {
        let staged = &self.request.staged;
        if !staged.exists() {
            return Err(UpdateError::Install {
                phase: InstallPhase::Backup,
                reason: format!("staged update missing at {}", staged.display()),
            });
        }

        let root = if staged.is_dir() {
            staged.clone()
        } else {
            let dest = staged
                .parent()
                .ok_or_else(|| UpdateError::Unpack {
                    reason: format!("archive {} has no parent directory", staged.display()),
                })?
                .join("unpacked");
            staging::extract_zip(staged, &dest)?;
            dest
        };

        Ok(staging::package_root(&root))
    }

    /// Move the current installation aside.
    fn backup(&self, backup_dir: &Path) -> Result<(), UpdateError> {
        // A backup left over from an earlier failed cycle is superseded.
        if backup_dir.exists() {
            warn!("Removing stale backup at {}", backup_dir.display());
            std::fs::remove_dir_all(backup_dir).map_err(|e| UpdateError::Install {
                phase: InstallPhase::Backup,
                reason: format!("cannot remove stale backup: {e}"),
            })?;
        }

        info!(
            "Backing up {} to {}",
            self.request.install_dir.display(),
            backup_dir.display()
        );
        move_tree(&self.request.install_dir, backup_dir).map_err(|e| UpdateError::Install {
            phase: InstallPhase::Backup,
            reason: format!("cannot move installation to backup: {e}"),
        })
    }

    /// Move the staged tree into the install path.
    fn swap(&self, staged_root: &Path) -> Result<(), UpdateError> {
        info!(
            "Swapping {} into {}",
            staged_root.display(),
            self.request.install_dir.display()
        );
        move_tree(staged_root, &self.request.install_dir).map_err(|e| UpdateError::Install {
            phase: InstallPhase::Swap,
            reason: format!("cannot move staged update into place: {e}"),
        })
    }

    /// Launch the updated application, detached from the installer.
    fn relaunch(&self) -> Result<(), UpdateError> {
        let executable = staging::find_executable(&self.request.install_dir, &self.executable_name)
            .map_err(|e| UpdateError::Install {
                phase: InstallPhase::Relaunch,
                reason: e.to_string(),
            })?;

        info!("Relaunching {}", executable.display());
        let mut command = Command::new(&executable);
        command
            .current_dir(&self.request.install_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut command);

        command.spawn().map_err(|e| UpdateError::Install {
            phase: InstallPhase::Relaunch,
            reason: format!("cannot launch {}: {e}", executable.display()),
        })?;
        Ok(())
    }

    /// Delete the staging material and the backup. Best-effort: the update
    /// has already succeeded, so failures here are only logged.
    ///
    /// When the staged path lives inside one of our own staging directories
    /// (recognised by the [`STAGING_PREFIX`] name), the whole staging
    /// directory goes, archive included. Any other parent is left alone.
    fn cleanup(&self, backup_dir: &Path) {
        let staged = &self.request.staged;
        let staging_root = staged
            .parent()
            .filter(|parent| {
                parent
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(STAGING_PREFIX))
            })
            .map_or_else(|| staged.clone(), Path::to_path_buf);

        for path in [staging_root.as_path(), backup_dir] {
            if !path.exists() {
                continue;
            }
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(path)
            } else {
                std::fs::remove_file(path)
            };
            if let Err(e) = removed {
                warn!("Cleanup failed for {}: {e}", path.display());
            }
        }
    }
}

/// Backup location for an installation directory.
pub fn backup_path(install_dir: &Path) -> PathBuf {
    let mut name = install_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "install".to_string());
    name.push_str(BACKUP_SUFFIX);
    install_dir.with_file_name(name)
}

/// Restore the backup over a failed swap.
fn rollback(install_dir: &Path, backup_dir: &Path) -> Result<(), UpdateError> {
    warn!(
        "Rolling back: restoring {} to {}",
        backup_dir.display(),
        install_dir.display()
    );

    // The failed swap may have left a partial tree in the install path.
    if install_dir.exists() {
        std::fs::remove_dir_all(install_dir).map_err(|e| UpdateError::RollbackFailed {
            reason: format!(
                "cannot clear partial installation at {}: {e}",
                install_dir.display()
            ),
        })?;
    }

    move_tree(backup_dir, install_dir).map_err(|e| UpdateError::RollbackFailed {
        reason: format!(
            "cannot restore backup {} to {}: {e}",
            backup_dir.display(),
            install_dir.display()
        ),
    })?;

    info!("Rollback complete, previous version restored");
    Ok(())
}

/// Repair the installation after an interrupted transaction.
///
/// Called at host startup. If a backup directory exists the last cycle did
/// not finish its cleanup: when the installation looks broken the backup is
/// restored, otherwise the backup is stale and removed.
pub fn recover(install_dir: &Path) -> Result<bool, UpdateError> {
    let backup_dir = backup_path(install_dir);
    if !backup_dir.exists() {
        return Ok(false);
    }

    if install_dir.join(VERSION_MARKER).exists() {
        warn!("Removing stale backup from an interrupted cycle at {}", backup_dir.display());
        std::fs::remove_dir_all(&backup_dir).map_err(|e| UpdateError::RollbackFailed {
            reason: format!("cannot remove stale backup: {e}"),
        })?;
        return Ok(false);
    }

    warn!(
        "Installation at {} looks incomplete; restoring backup",
        install_dir.display()
    );
    rollback(install_dir, &backup_dir)?;
    Ok(true)
}

/// Move a directory tree, falling back to copy-and-delete when a plain
/// rename is refused (staging lives on a different filesystem than the
/// installation in most setups).
fn move_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_error) => {
            debug!(
                "rename {} -> {} failed ({rename_error}); copying instead",
                src.display(),
                dst.display()
            );
            copy_tree(src, dst)?;
            std::fs::remove_dir_all(src)
        }
    }
}

fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Detach the relaunched application from the installer.
#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}
