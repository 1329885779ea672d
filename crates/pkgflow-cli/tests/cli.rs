//! Integration tests for the pkgflow CLI binary.
//!
//! These tests exercise the compiled binary end-to-end using `assert_cmd`.
//! Catalogs and configs are written to temp directories with `tempfile`;
//! nothing is installed because every queue test uses `--dry-run`.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CATALOG: &str = r#"
packages:
  - id: org.gimp.GIMP
    name: GIMP
    type: Flatpak
    flatpak:
      ref: org.gimp.GIMP
  - id: spotify
    name: Spotify
    type: Snap
    snap:
      classic: true
  - id: demo-app
    type: AppImage
    appimage:
      url: https://example.com/downloads/Demo-1.0-x86_64.AppImage
  - id: fedora-tool
    type: Rpm
"#;

/// Write a catalog and a config (with an explicit AppImage directory) into `dir`.
fn create_fixture(dir: &Path) {
    fs::write(dir.join("catalog.yaml"), CATALOG).unwrap();
    let config = format!(
        "snap:\n  use_sudo: false\nappimage:\n  install_dir: {}\n",
        dir.join("apps").display()
    );
    fs::write(dir.join("pkgflow.yaml"), config).unwrap();
}

/// Build a `Command` for the pkgflow binary running inside `dir`.
fn pkgflow_cmd(dir: &Path) -> Command {
    let mut cmd = assert_cmd::cargo_bin_cmd!("pkgflow");
    cmd.current_dir(dir)
        .env_remove("PKGFLOW_CONFIG")
        .env_remove("PKGFLOW_LOG")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    create_fixture(dir.path());
    dir
}

// ---------------------------------------------------------------------------
// Basic CLI tests
// ---------------------------------------------------------------------------

#[test]
fn test_help_output() {
    let dir = TempDir::new().unwrap();
    pkgflow_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    pkgflow_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pkgflow"));
}

#[test]
fn test_completion_bash() {
    let dir = TempDir::new().unwrap();
    pkgflow_cmd(dir.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pkgflow"));
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

#[test]
fn test_list_shows_packages() {
    let dir = fixture();
    pkgflow_cmd(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("org.gimp.GIMP"))
        .stdout(predicate::str::contains("Spotify"))
        .stdout(predicate::str::contains("AppImage"))
        .stdout(predicate::str::contains("unsupported"));
}

#[test]
fn test_list_json() {
    let dir = fixture();
    let output = pkgflow_cmd(dir.path())
        .args(["list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[1]["id"], "spotify");
    assert_eq!(entries[1]["backend"], "Snap");
    assert!(entries[3]["backend"].is_null());
}

#[test]
fn test_missing_catalog_fails() {
    let dir = TempDir::new().unwrap();
    pkgflow_cmd(dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load catalog"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = fixture();
    pkgflow_cmd(dir.path())
        .args(["list", "--config", "does-not-exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_catalog_warnings_reported() {
    let dir = fixture();
    pkgflow_cmd(dir.path())
        .arg("list")
        .assert()
        .success()
        .stderr(predicate::str::contains("unsupported type 'Rpm'"));
}

// ---------------------------------------------------------------------------
// install / remove
// ---------------------------------------------------------------------------

#[test]
fn test_install_dry_run_runs_in_order() {
    let dir = fixture();
    let output = pkgflow_cmd(dir.path())
        .args(["install", "org.gimp.GIMP", "spotify", "--dry-run"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let flatpak = stdout
        .find("would run: flatpak install -y --noninteractive --system flathub org.gimp.GIMP")
        .expect("flatpak command shown");
    let snap = stdout
        .find("would run: snap install spotify --classic")
        .expect("snap command shown");
    assert!(flatpak < snap);
    assert!(stdout.contains("SUCCESS"));
}

#[test]
fn test_install_dry_run_appimage_with_url() {
    let dir = fixture();
    pkgflow_cmd(dir.path())
        .args(["install", "demo-app", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would run: sh -c"))
        .stdout(predicate::str::contains("Demo-1.0-x86_64.AppImage"));
}

#[test]
fn test_remove_dry_run() {
    let dir = fixture();
    pkgflow_cmd(dir.path())
        .args(["remove", "org.gimp.GIMP", "spotify", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "would run: flatpak uninstall -y --noninteractive --system org.gimp.GIMP",
        ))
        .stdout(predicate::str::contains("would run: snap remove spotify"));
}

#[test]
fn test_unknown_id_fails_before_queuing() {
    let dir = fixture();
    pkgflow_cmd(dir.path())
        .args(["install", "spotify", "nope", "--dry-run"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("would run").not())
        .stderr(predicate::str::contains("Unknown package id 'nope'"));
}

#[test]
fn test_unsupported_type_is_skipped() {
    let dir = fixture();
    pkgflow_cmd(dir.path())
        .args(["install", "fedora-tool", "spotify", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would run: snap install spotify"))
        .stdout(predicate::str::contains("1 skipped"))
        .stderr(predicate::str::contains("Skipped 'fedora-tool'"));
}

#[test]
fn test_flatpak_install_without_home() {
    // No config file and no HOME: only AppImage jobs need an install dir.
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("catalog.yaml"), CATALOG).unwrap();
    pkgflow_cmd(dir.path())
        .env_remove("HOME")
        .args(["install", "org.gimp.GIMP", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would run: flatpak install"));
}

#[test]
fn test_empty_catalog_file_lists_nothing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("catalog.yaml"), "").unwrap();
    pkgflow_cmd(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No packages found."));
}

#[test]
fn test_quiet_hides_job_output() {
    let dir = fixture();
    pkgflow_cmd(dir.path())
        .args(["-q", "install", "spotify", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would run").not())
        .stdout(predicate::str::contains("succeeded").not());
}
