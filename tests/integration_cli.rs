//! Black-box tests of the two binaries' command-line contracts.

use predicates::prelude::*;
use tempfile::TempDir;

fn update_cmd() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("uniconv-update").unwrap()
}

fn installer_cmd() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("uniconv-installer").unwrap()
}

#[test]
fn update_help_lists_subcommands() {
    update_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("recover"));
}

#[test]
fn status_reports_the_installed_version_offline() {
    let temp = TempDir::new().unwrap();
    let install = temp.path().join("app");
    std::fs::create_dir_all(&install).unwrap();
    std::fs::write(install.join("VERSION.txt"), "1.4.2").unwrap();

    update_cmd()
        .env("UNICONV_CONFIG", temp.path().join("no-config.toml"))
        .args(["status", "--install-dir"])
        .arg(&install)
        .assert()
        .success()
        .stdout(predicate::str::contains("1.4.2"));
}

#[test]
fn update_rejects_verbose_with_quiet() {
    update_cmd()
        .args(["--verbose", "--quiet", "check"])
        .assert()
        .failure();
}

#[test]
fn recover_reports_a_healthy_installation() {
    let temp = TempDir::new().unwrap();
    let install = temp.path().join("app");
    std::fs::create_dir_all(&install).unwrap();
    std::fs::write(install.join("VERSION.txt"), "1.0.0").unwrap();

    update_cmd()
        .args(["recover", "--install-dir"])
        .arg(&install)
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to recover"));
}

#[test]
fn recover_restores_a_broken_installation() {
    let temp = TempDir::new().unwrap();
    let install = temp.path().join("app");
    let backup = temp.path().join("app.backup");
    std::fs::create_dir_all(&backup).unwrap();
    std::fs::write(backup.join("VERSION.txt"), "1.0.0").unwrap();

    update_cmd()
        .args(["recover", "--install-dir"])
        .arg(&install)
        .assert()
        .success()
        .stdout(predicate::str::contains("restored"));

    assert_eq!(
        std::fs::read_to_string(install.join("VERSION.txt")).unwrap(),
        "1.0.0"
    );
    assert!(!backup.exists());
}

#[cfg(unix)]
fn write_app(dir: &std::path::Path, version: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("VERSION.txt"), version).unwrap();
    let exe = dir.join("uniconv");
    std::fs::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn installer_repairs_a_crashed_cycle_before_installing() {
    let temp = TempDir::new().unwrap();
    let install = temp.path().join("app");
    let backup = temp.path().join("app.backup");
    let staging = temp.path().join("staging");

    // Backup exists but the install directory does not: the signature of a
    // crash between the backup and swap phases of an earlier cycle.
    write_app(&backup, "1.0.0");
    write_app(&staging, "2.0.0");

    let pid = {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        child.wait().unwrap();
        child.id()
    };

    installer_cmd()
        .env("UNICONV_CONFIG", temp.path().join("no-config.toml"))
        .arg(&staging)
        .arg(install.join("uniconv"))
        .arg(pid.to_string())
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(install.join("VERSION.txt")).unwrap(),
        "2.0.0"
    );
    assert!(!backup.exists());
    assert!(!staging.exists());
}

#[test]
fn installer_requires_three_arguments() {
    installer_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));

    installer_cmd()
        .args(["/tmp/staged", "/opt/uniconv/uniconv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn installer_rejects_a_malformed_pid() {
    installer_cmd()
        .args(["/tmp/staged", "/opt/uniconv/uniconv", "not-a-pid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn installer_help_names_the_positional_contract() {
    installer_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("STAGED"))
        .stdout(predicate::str::contains("HOST_EXE"))
        .stdout(predicate::str::contains("HOST_PID"));
}
