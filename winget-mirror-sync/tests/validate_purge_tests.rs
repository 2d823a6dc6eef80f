//! validate-hash and purge over a synced mirror.

mod common;

use common::{Mirror, MemoryFetcher};
use winget_mirror_core::{PackageFilter, PackageId};
use winget_mirror_sync::pipeline::{self, SyncScope};
use winget_mirror_sync::purge::{matching_records, purge_all, purge_matching};
use winget_mirror_sync::validate::{validate_hashes, FileStatus};

fn synced_mirror(fetcher: &MemoryFetcher) -> Mirror {
    let mirror = Mirror::new();
    mirror.add_package(fetcher, "Vendor", "Tool", "1.0", &[("a.exe", "aaa"), ("b.exe", "bbb")]);
    mirror.add_package(fetcher, "VendorLabs", "Kit", "2.0", &[("kit.msi", "kit")]);
    mirror.add_package(fetcher, "Other", "App", "3.0", &[("app.zip", "app")]);
    let mut ctx = mirror.ctx();
    let report = pipeline::run(&mut ctx, &SyncScope::Filter(PackageFilter::all()), fetcher, None)
        .expect("sync");
    assert!(!report.has_failures());
    mirror
}

#[test]
fn clean_mirror_validates() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    let report = validate_hashes(&mirror.ctx());
    assert!(report.all_valid);
    assert_eq!(report.packages.len(), 3);
    assert!(report.failures().is_empty());
}

#[test]
fn tampered_file_is_the_only_failure() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    std::fs::write(mirror.download_path("Vendor", "Tool", "1.0", "b.exe"), "evil").unwrap();

    let report = validate_hashes(&mirror.ctx());
    assert!(!report.all_valid);
    assert_eq!(report.failures(), vec![("Vendor.Tool", "b.exe")]);

    let tool = &report.packages["Vendor.Tool"];
    assert!(!tool.valid);
    assert_eq!(tool.files["a.exe"].status, FileStatus::Match);
    assert_eq!(tool.files["b.exe"].status, FileStatus::Mismatch);
    assert!(report.packages["Other.App"].valid);
}

#[test]
fn missing_and_unexpected_files_are_reported() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    std::fs::remove_file(mirror.download_path("Vendor", "Tool", "1.0", "a.exe")).unwrap();
    std::fs::write(mirror.download_path("Other", "App", "3.0", "notes.txt"), "hi").unwrap();

    let report = validate_hashes(&mirror.ctx());
    let tool = &report.packages["Vendor.Tool"];
    assert_eq!(tool.missing_files, vec!["a.exe"]);
    assert!(!tool.valid);

    let app = &report.packages["Other.App"];
    assert_eq!(app.unexpected_files, vec!["notes.txt"]);
    assert!(app.valid, "extra files are reported, not failed");
}

#[test]
fn missing_version_directory_is_invalid() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    std::fs::remove_dir_all(mirror.root.join("downloads/Other/App/3.0")).unwrap();

    let report = validate_hashes(&mirror.ctx());
    let app = &report.packages["Other.App"];
    assert!(!app.valid);
    assert!(app.error.as_deref().unwrap_or_default().contains("not found"));
}

#[test]
fn json_report_shape() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    let report = validate_hashes(&mirror.ctx());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["all_valid"], true);
    assert_eq!(json["packages"]["Vendor.Tool"]["files"]["a.exe"]["status"], "MATCH");
}

#[test]
fn purge_by_publisher_prefix_leaves_others() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    let mut ctx = mirror.ctx();
    let filter: PackageFilter = "vendor".parse().unwrap();

    let planned = matching_records(ctx.store.state(), &filter);
    assert_eq!(
        planned,
        vec![PackageId::new("Vendor", "Tool"), PackageId::new("VendorLabs", "Kit")]
    );

    let purged = purge_matching(&mut ctx, &filter).unwrap();
    assert_eq!(purged.len(), 2);
    assert!(!mirror.root.join("downloads/Vendor").exists(), "empty parents removed");
    assert!(!mirror.root.join("downloads/VendorLabs").exists());
    assert!(mirror.download_path("Other", "App", "3.0", "app.zip").exists());

    let reloaded = mirror.ctx();
    let ids: Vec<_> = reloaded.store.state().downloads.keys().cloned().collect();
    assert_eq!(ids, vec![PackageId::new("Other", "App")]);
}

#[test]
fn purge_with_no_match_changes_nothing() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    let before = std::fs::read_to_string(mirror.root.join("state.json")).unwrap();
    let mut ctx = mirror.ctx();
    let purged = purge_matching(&mut ctx, &"Nobody".parse().unwrap()).unwrap();
    assert!(purged.is_empty());

    let after: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(mirror.root.join("state.json")).unwrap())
            .unwrap();
    let before: serde_json::Value = serde_json::from_str(&before).unwrap();
    assert_eq!(after["downloads"], before["downloads"]);
}

#[test]
fn purge_all_empties_state_and_downloads() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    let mut ctx = mirror.ctx();
    let purged = purge_all(&mut ctx).unwrap();
    assert_eq!(purged.len(), 3);
    assert!(!mirror.root.join("downloads").exists());
    assert!(mirror.ctx().store.state().downloads.is_empty());
}

#[test]
fn package_without_installers_validates() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    mirror.add_package(&fetcher, "Vendor", "Empty", "1.0", &[]);
    let mut ctx = mirror.ctx();
    let filter: PackageFilter = "Vendor/Empty".parse().unwrap();
    let report = pipeline::run(&mut ctx, &SyncScope::Filter(filter), &fetcher, None).unwrap();
    assert!(!report.has_failures());
    assert!(!mirror.root.join("downloads/Vendor/Empty").exists());

    let report = validate_hashes(&mirror.ctx());
    let empty = &report.packages["Vendor.Empty"];
    assert!(empty.valid, "{empty:?}");
    assert!(empty.error.is_none());
    assert!(report.all_valid);
}

#[test]
fn purge_removes_superseded_versions() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    mirror.add_package(&fetcher, "Vendor", "Tool", "1.1", &[("a.exe", "aaa-2")]);
    let mut ctx = mirror.ctx();
    let report = pipeline::run(&mut ctx, &SyncScope::Synced, &fetcher, None).unwrap();
    assert!(!report.has_failures());
    assert!(mirror.download_path("Vendor", "Tool", "1.0", "a.exe").exists(), "kept by default");

    let mut ctx = mirror.ctx();
    let purged = purge_matching(&mut ctx, &"Vendor/Tool".parse().unwrap()).unwrap();
    assert_eq!(purged.len(), 1);
    assert_eq!(purged[0].version.as_str(), "1.1");
    assert!(!mirror.download_path("Vendor", "Tool", "1.0", "a.exe").exists());
    assert!(!mirror.root.join("downloads/Vendor").exists());
    assert!(mirror.download_path("VendorLabs", "Kit", "2.0", "kit.msi").exists());
}

#[test]
fn purge_leaves_last_sync_alone() {
    let fetcher = MemoryFetcher::new();
    let mirror = synced_mirror(&fetcher);
    let before = mirror.state_json()["last_sync"].clone();
    assert!(before.is_string());

    let mut ctx = mirror.ctx();
    purge_matching(&mut ctx, &"Other".parse().unwrap()).unwrap();
    assert_eq!(mirror.state_json()["last_sync"], before);

    let mut ctx = mirror.ctx();
    purge_all(&mut ctx).unwrap();
    assert_eq!(mirror.state_json()["last_sync"], before);
}
