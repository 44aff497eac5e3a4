//! Handoff from the running host to the detached installer.
//!
//! The host cannot replace its own files while it runs, so the final step of
//! an update cycle spawns the `uniconv-installer` binary as a fully detached
//! process and then exits. Detachment matters: the installer must survive the
//! death of its parent, wait for the host PID to vanish, and only then swap
//! the installation.
//!
//! Spawn failure is the last recoverable error in the cycle. Once the spawn
//! succeeds the host exits and the transaction belongs to the installer.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;

use crate::constants::INSTALLER_BIN;
use crate::core::UpdateError;

/// Spawns the detached installer against a staged update.
pub struct HandoffCoordinator {
    install_dir: PathBuf,
    host_exe: PathBuf,
}

impl HandoffCoordinator {
    /// Coordinate a handoff for the installation rooted at `install_dir`,
    /// whose application executable is named `executable_name`.
    pub fn new(install_dir: impl Into<PathBuf>, executable_name: &str) -> Self {
        let install_dir = install_dir.into();
        let host_exe = install_dir.join(executable_name);
        Self {
            install_dir,
            host_exe,
        }
    }

    /// Directory being updated.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Expected location of the installer binary inside the installation.
    pub fn installer_path(&self) -> PathBuf {
        self.install_dir.join(INSTALLER_BIN)
    }

    /// Spawn the installer and exit the host process.
    ///
    /// Never returns on success. On failure the host keeps running its
    /// current version and may retry later.
    pub fn begin(&self, staged: &Path, host_pid: u32) -> Result<Infallible, UpdateError> {
        let child_pid = self.spawn_installer(staged, host_pid)?;
        info!("Installer running as PID {child_pid}; exiting for the swap");
        std::process::exit(0);
    }

    /// Spawn the detached installer without exiting the host.
    ///
    /// The installer receives three positional arguments: the staged update
    /// path, the host executable path, and the PID it must wait on. Returns
    /// the installer's PID.
    pub fn spawn_installer(&self, staged: &Path, host_pid: u32) -> Result<u32, UpdateError> {
        let installer = self.installer_path();
        if !installer.exists() {
            return Err(UpdateError::Handoff {
                reason: format!("installer binary not found at {}", installer.display()),
            });
        }
        if !staged.exists() {
            return Err(UpdateError::Handoff {
                reason: format!("staged update missing at {}", staged.display()),
            });
        }

        let mut command = Command::new(&installer);
        command
            .arg(staged)
            .arg(&self.host_exe)
            .arg(host_pid.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        detach(&mut command);

        let child = command.spawn().map_err(|e| UpdateError::Handoff {
            reason: format!("failed to spawn {}: {e}", installer.display()),
        })?;

        info!(
            "Spawned installer {} (PID {}) for staged update {}",
            installer.display(),
            child.id(),
            staged.display()
        );
        Ok(child.id())
    }
}

/// Configure the command so the child survives the parent's exit.
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn installer_path_is_inside_install_dir() {
        let coordinator = HandoffCoordinator::new("/opt/uniconv", "uniconv");
        assert_eq!(
            coordinator.installer_path(),
            PathBuf::from("/opt/uniconv").join(INSTALLER_BIN)
        );
    }

    #[test]
    fn missing_installer_is_a_handoff_error() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged.zip");
        std::fs::write(&staged, b"zip").unwrap();

        let coordinator = HandoffCoordinator::new(temp.path().join("install"), "uniconv");
        let err = coordinator.spawn_installer(&staged, 1234).unwrap_err();
        assert!(matches!(err, UpdateError::Handoff { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn missing_staged_path_is_a_handoff_error() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        std::fs::create_dir_all(&install).unwrap();
        std::fs::write(install.join(INSTALLER_BIN), b"stub").unwrap();

        let coordinator = HandoffCoordinator::new(&install, "uniconv");
        let err = coordinator
            .spawn_installer(&temp.path().join("gone.zip"), 1234)
            .unwrap_err();
        assert!(matches!(err, UpdateError::Handoff { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn spawns_a_detached_installer() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        std::fs::create_dir_all(&install).unwrap();

        // Stand-in installer that records its arguments and exits.
        let installer = install.join(INSTALLER_BIN);
        let args_file = temp.path().join("args.txt");
        std::fs::write(
            &installer,
            format!("#!/bin/sh\necho \"$@\" > {}\n", args_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&installer, std::fs::Permissions::from_mode(0o755)).unwrap();

        let staged = temp.path().join("staged.zip");
        std::fs::write(&staged, b"zip").unwrap();

        let coordinator = HandoffCoordinator::new(&install, "uniconv");
        coordinator.spawn_installer(&staged, 4242).unwrap();

        // The child runs detached, so poll briefly for its output.
        for _ in 0..50 {
            if args_file.exists() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        let recorded = std::fs::read_to_string(&args_file).unwrap();
        assert!(recorded.contains("staged.zip"));
        assert!(recorded.contains(&install.join("uniconv").display().to_string()));
        assert!(recorded.contains("4242"));
    }
}
