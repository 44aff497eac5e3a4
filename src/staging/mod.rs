//! Archive unpacking and executable discovery.
//!
//! [`StagingUnpacker`] extracts the downloaded zip into an `unpacked/`
//! directory next to the archive, then locates the application executable
//! inside the extracted tree. Unlike the best-effort feed check, failures
//! here are hard errors: a corrupt archive or a package without the expected
//! executable aborts the cycle before any installed files are touched.

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::core::UpdateError;

/// An unpacked update, ready for handoff to the installer.
#[derive(Debug, Clone)]
pub struct StagedPackage {
    /// Root of the extracted tree.
    pub root: PathBuf,
    /// The application executable found inside the tree.
    pub executable: PathBuf,
}

/// Unpacks update archives into a staging area.
pub struct StagingUnpacker {
    executable_name: String,
}

impl StagingUnpacker {
    /// `executable_name` is matched case-insensitively against extracted
    /// file names when locating the application binary.
    pub fn new(executable_name: impl Into<String>) -> Self {
        Self {
            executable_name: executable_name.into(),
        }
    }

    /// Extract `archive` and locate the executable in the result.
    pub async fn unpack(&self, archive: &Path) -> Result<StagedPackage, UpdateError> {
        let archive = archive.to_path_buf();
        let dest = archive
            .parent()
            .ok_or_else(|| UpdateError::Unpack {
                reason: format!("archive {} has no parent directory", archive.display()),
            })?
            .join("unpacked");
        let executable_name = self.executable_name.clone();

        tokio::task::spawn_blocking(move || {
            extract_zip(&archive, &dest)?;
            let executable = find_executable(&dest, &executable_name)?;
            info!(
                "Unpacked update to {}, executable at {}",
                dest.display(),
                executable.display()
            );
            Ok(StagedPackage {
                root: dest,
                executable,
            })
        })
        .await
        .map_err(|e| UpdateError::Unpack {
            reason: format!("unpack task failed: {e}"),
        })?
    }
}

/// Extract a zip archive into `dest`, rejecting entries whose paths would
/// escape the destination.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), UpdateError> {
    let file = File::open(archive_path).map_err(|e| UpdateError::Unpack {
        reason: format!("cannot open archive {}: {e}", archive_path.display()),
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| UpdateError::Unpack {
        reason: format!("corrupt archive {}: {e}", archive_path.display()),
    })?;

    std::fs::create_dir_all(dest)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| UpdateError::Unpack {
            reason: format!("corrupt archive entry {index}: {e}"),
        })?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(UpdateError::Unpack {
                reason: format!("archive entry '{}' escapes the staging directory", entry.name()),
            });
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode))?;
        }

        debug!("Extracted {}", target.display());
    }

    Ok(())
}

/// Unwrap a single top-level directory, a common packaging layout where the
/// archive wraps everything in `appname-1.2.3/`.
pub fn package_root(dir: &Path) -> PathBuf {
    let entries: Vec<_> = match std::fs::read_dir(dir) {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(_) => return dir.to_path_buf(),
    };

    match entries.as_slice() {
        [only] if only.file_type().is_ok_and(|t| t.is_dir()) => only.path(),
        _ => dir.to_path_buf(),
    }
}

/// Locate the application executable under `root` by case-insensitive
/// filename match.
pub fn find_executable(root: &Path, name: &str) -> Result<PathBuf, UpdateError> {
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|f| f.eq_ignore_ascii_case(name));
        if matches {
            return Ok(entry.into_path());
        }
    }

    Err(UpdateError::Unpack {
        reason: format!("package does not contain the expected executable '{name}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn unpacks_and_finds_executable() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("update.zip");
        write_archive(
            &archive,
            &[
                ("uniconv/VERSION.txt", b"1.2.0"),
                ("uniconv/bin/uniconv", b"\x7fELF fake"),
                ("uniconv/README.md", b"docs"),
            ],
        );

        let staged = StagingUnpacker::new("uniconv").unpack(&archive).await.unwrap();
        assert_eq!(staged.root, temp.path().join("unpacked"));
        assert!(staged.root.join("uniconv/VERSION.txt").exists());
        assert!(staged.executable.ends_with("uniconv/bin/uniconv"));
    }

    #[tokio::test]
    async fn executable_match_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("update.zip");
        write_archive(&archive, &[("UniConv.exe", b"MZ fake")]);

        let staged = StagingUnpacker::new("uniconv.exe")
            .unpack(&archive)
            .await
            .unwrap();
        assert!(staged.executable.ends_with("UniConv.exe"));
    }

    #[tokio::test]
    async fn missing_executable_is_an_unpack_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("update.zip");
        write_archive(&archive, &[("docs/CHANGELOG.md", b"notes")]);

        let err = StagingUnpacker::new("uniconv")
            .unpack(&archive)
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Unpack { .. }));
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_unpack_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("update.zip");
        tokio::fs::write(&archive, b"this is not a zip file").await.unwrap();

        let err = StagingUnpacker::new("uniconv")
            .unpack(&archive)
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Unpack { .. }));
    }

    #[test]
    fn package_root_unwraps_single_directory() {
        let temp = TempDir::new().unwrap();
        let wrapper = temp.path().join("uniconv-1.2.0");
        std::fs::create_dir_all(&wrapper).unwrap();
        std::fs::write(wrapper.join("uniconv"), b"exe").unwrap();

        assert_eq!(package_root(temp.path()), wrapper);
    }

    #[test]
    fn package_root_keeps_flat_layouts() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("bin")).unwrap();
        std::fs::write(temp.path().join("VERSION.txt"), b"1.2.0").unwrap();

        assert_eq!(package_root(temp.path()), temp.path());
    }

    #[tokio::test]
    async fn traversal_entries_are_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        write_archive(&archive, &[("../outside.txt", b"escape attempt")]);

        let err = StagingUnpacker::new("uniconv")
            .unpack(&archive)
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Unpack { .. }));
        assert!(!temp.path().join("..").join("outside.txt").exists());
    }
}
