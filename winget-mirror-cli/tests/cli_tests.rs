//! End-to-end tests of the `winget-mirror` binary. None of these reach the
//! network: state is seeded on disk, and the one download test points at a
//! closed local port.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

fn mirror_cmd(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("winget-mirror"));
    cmd.arg("--root").arg(root).env_remove("WINGET_MIRROR_ROOT");
    cmd
}

fn sha256(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read json")).expect("parse json")
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).expect("write json");
}

/// Initialized root using the flat layout and no retry delay.
fn init_mirror(tmp: &TempDir) -> PathBuf {
    let root = tmp.path().join("mirror-root");
    Command::new(assert_cmd::cargo::cargo_bin!("winget-mirror"))
        .arg("init")
        .arg(&root)
        .assert()
        .success()
        .stdout(contains("Initialized mirror"));

    let config_path = root.join("config.json");
    let mut config = read_json(&config_path);
    config["manifest_layout"] = json!("flat");
    config["download"] = json!({ "workers": 1, "retries": 0, "backoff_ms": 0, "timeout_secs": 5 });
    write_json(&config_path, &config);
    root
}

fn add_manifest(root: &Path, publisher: &str, package: &str, version: &str, url: &str, sha: &str) {
    let dir = root
        .join("mirror/manifests")
        .join(publisher)
        .join(package)
        .join(version);
    fs::create_dir_all(&dir).unwrap();
    let id = format!("{publisher}.{package}");
    fs::write(
        dir.join(format!("{id}.yaml")),
        format!("PackageIdentifier: {id}\nPackageVersion: {version}\nManifestType: version\nManifestVersion: 1.6.0\n"),
    )
    .unwrap();
    fs::write(
        dir.join(format!("{id}.installer.yaml")),
        format!(
            "PackageIdentifier: {id}\nPackageVersion: {version}\nInstallers:\n- Architecture: x64\n  InstallerUrl: {url}\n  InstallerSha256: {sha}\nManifestType: installer\nManifestVersion: 1.6.0\n"
        ),
    )
    .unwrap();
}

/// Manifest + downloaded file + state record, as a finished sync leaves them.
fn seed_synced(root: &Path, publisher: &str, package: &str, version: &str, file: &str, body: &[u8]) {
    let sha = sha256(body);
    add_manifest(
        root,
        publisher,
        package,
        version,
        &format!("https://cdn.example.com/{file}"),
        &sha,
    );
    let dir = root.join("downloads").join(publisher).join(package).join(version);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), body).unwrap();

    let state_path = root.join("state.json");
    let mut state = read_json(&state_path);
    state["downloads"][format!("{publisher}.{package}")] = json!({
        "version": version,
        "timestamp": "2026-01-02T03:04:05Z",
        "files": { file: sha },
    });
    write_json(&state_path, &state);
}

#[test]
fn init_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let root = init_mirror(&tmp);
    let config = read_json(&root.join("config.json"));
    assert_eq!(config["repo_url"], "https://github.com/microsoft/winget-pkgs");
    assert_eq!(config["mirror_dir"], "mirror");
    assert!(config["server_url"].is_null());

    Command::new(assert_cmd::cargo::cargo_bin!("winget-mirror"))
        .arg("init")
        .arg(&root)
        .assert()
        .success()
        .stdout(contains("already"));
    assert_eq!(read_json(&root.join("config.json")), config);
}

#[test]
fn uninitialized_root_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    mirror_cmd(tmp.path())
        .arg("validate-hash")
        .assert()
        .code(2)
        .stderr(contains("winget-mirror init"));
}

#[test]
fn search_shows_download_status() {
    let tmp = TempDir::new().unwrap();
    let root = init_mirror(&tmp);
    seed_synced(&root, "Vendor", "Tool", "1.0", "tool.exe", b"tool");
    add_manifest(&root, "Vendor", "Tool", "1.1", "https://cdn.example.com/t11.exe", "aa");
    add_manifest(&root, "Other", "App", "2.0", "https://cdn.example.com/app.exe", "bb");

    mirror_cmd(&root)
        .args(["search", "vendor"])
        .assert()
        .success()
        .stdout(contains("Vendor.Tool"))
        .stdout(contains("1.1 (new)"))
        .stdout(contains("Downloaded"))
        .stdout(contains("Other.App").not());

    mirror_cmd(&root)
        .arg("search")
        .assert()
        .success()
        .stdout(contains("Other.App"))
        .stdout(contains("Not downloaded"));
}

#[test]
fn validate_hash_json_and_exit_code() {
    let tmp = TempDir::new().unwrap();
    let root = init_mirror(&tmp);
    seed_synced(&root, "Vendor", "Tool", "1.0", "tool.exe", b"tool");
    seed_synced(&root, "Other", "App", "2.0", "app.msi", b"app");

    let output = mirror_cmd(&root)
        .args(["validate-hash", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(report["all_valid"], true);

    fs::write(root.join("downloads/Vendor/Tool/1.0/tool.exe"), b"tampered").unwrap();
    let output = mirror_cmd(&root)
        .args(["validate-hash", "--output", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["all_valid"], false);
    assert_eq!(report["packages"]["Vendor.Tool"]["files"]["tool.exe"]["status"], "MISMATCH");
    assert_eq!(report["packages"]["Other.App"]["valid"], true);

    mirror_cmd(&root)
        .arg("validate-hash")
        .assert()
        .code(1)
        .stdout(contains("Vendor.Tool/tool.exe: MISMATCH"));
}

#[test]
fn purge_all_requires_confirmation_without_a_terminal() {
    let tmp = TempDir::new().unwrap();
    let root = init_mirror(&tmp);
    seed_synced(&root, "Vendor", "Tool", "1.0", "tool.exe", b"tool");

    mirror_cmd(&root)
        .arg("purge-all-packages")
        .assert()
        .failure()
        .stderr(contains("--yes"));
    assert!(root.join("downloads/Vendor/Tool/1.0/tool.exe").exists());

    mirror_cmd(&root)
        .args(["purge-all-packages", "--yes"])
        .assert()
        .success();
    assert!(!root.join("downloads").exists());
    assert_eq!(read_json(&root.join("state.json"))["downloads"], json!({}));
}

#[test]
fn purge_package_matches_publisher_prefix() {
    let tmp = TempDir::new().unwrap();
    let root = init_mirror(&tmp);
    seed_synced(&root, "Vendor", "Tool", "1.0", "tool.exe", b"tool");
    seed_synced(&root, "Other", "App", "2.0", "app.msi", b"app");

    mirror_cmd(&root)
        .args(["purge-package", "VEN", "--yes"])
        .assert()
        .success()
        .stdout(contains("Purged Vendor.Tool 1.0"));

    let state = read_json(&root.join("state.json"));
    assert!(state["downloads"].get("Vendor.Tool").is_none());
    assert!(state["downloads"].get("Other.App").is_some());
    assert!(root.join("downloads/Other/App/2.0/app.msi").exists());
}

#[test]
fn patch_repo_rejects_malformed_url_before_writing() {
    let tmp = TempDir::new().unwrap();
    let root = init_mirror(&tmp);
    seed_synced(&root, "Vendor", "Tool", "1.0", "tool.exe", b"tool");
    let out = tmp.path().join("patched");

    mirror_cmd(&root)
        .args(["patch-repo", "--server-url", "not a url", "--output-dir"])
        .arg(&out)
        .assert()
        .code(2)
        .stderr(contains("invalid server URL"));
    assert!(!out.exists());
}

#[test]
fn patch_repo_uses_configured_server_url() {
    let tmp = TempDir::new().unwrap();
    let root = init_mirror(&tmp);
    seed_synced(&root, "Vendor", "Tool", "1.0", "tool.exe", b"tool");
    let config_path = root.join("config.json");
    let mut config = read_json(&config_path);
    config["server_url"] = json!("https://mirror.corp.example");
    write_json(&config_path, &config);
    let out = tmp.path().join("patched");

    mirror_cmd(&root)
        .args(["patch-repo", "--output-dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("Patched 1 package(s)"));

    let patched =
        fs::read_to_string(out.join("manifests/Vendor/Tool/1.0/Vendor.Tool.installer.yaml"))
            .unwrap();
    assert!(patched
        .contains("InstallerUrl: https://mirror.corp.example/downloads/Vendor/Tool/1.0/tool.exe"));
}

#[test]
fn sync_without_matches_succeeds() {
    let tmp = TempDir::new().unwrap();
    let root = init_mirror(&tmp);
    add_manifest(&root, "Vendor", "Tool", "1.0", "https://cdn.example.com/t.exe", "aa");

    mirror_cmd(&root)
        .args(["sync", "Nobody"])
        .assert()
        .success()
        .stdout(contains("No matching packages"));
}

#[test]
fn failed_download_gives_batch_failure_exit_code() {
    let tmp = TempDir::new().unwrap();
    let root = init_mirror(&tmp);
    add_manifest(&root, "Vendor", "Tool", "1.0", "http://127.0.0.1:9/tool.exe", "aa");
    add_manifest(&root, "Vendor", "Kit", "1.0", "http://127.0.0.1:9/kit.exe", "bb");

    mirror_cmd(&root)
        .args(["sync", "Vendor"])
        .assert()
        .code(1)
        .stdout(contains("Vendor.Kit 1.0 — failed"))
        .stdout(contains("Vendor.Tool 1.0 — failed"));

    let state = read_json(&root.join("state.json"));
    assert_eq!(state["downloads"]["Vendor.Tool"]["files"], json!({}));
    assert!(state["last_sync"].is_string());
}
