//! Common test utilities for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use syncbench::domain::models::{seconds_to_time, SyncReport};
use tempfile::TempDir;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Initialize a test subscriber; later calls are no-ops.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Write an executable `/bin/sh` script.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).expect("Failed to create script dir");
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path
}

/// True while a process with `pid` exists.
pub fn process_exists(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

pub fn sample_report(env: &str) -> SyncReport {
    SyncReport {
        platform_system: "Linux".to_string(),
        platform_release: "6.1.0-18-amd64".to_string(),
        platform_version: "#1 SMP PREEMPT_DYNAMIC".to_string(),
        no_of_cpu_cores: 8,
        total_ram_in_gb: 31,
        env: env.to_string(),
        node_tag: Some("8.1.2".to_string()),
        db_sync_branch: Some("release/13.1.1.x".to_string()),
        node_cli_version: "cardano-cli 8.1.2 - linux-x86_64 - ghc-8.10".to_string(),
        node_git_revision: "d2d90b48c5577b4412d5c9c9968b55f8ab4b9767".to_string(),
        db_sync_version: Some("cardano-db-sync 13.1.1.3 - linux-x86_64 - ghc-8.10".to_string()),
        db_sync_git_rev: Some("ea7b2e1f".to_string()),
        start_test_time: "04/03/2024 08:00:00".to_string(),
        end_test_time: "05/03/2024 10:30:15".to_string(),
        node_start_time_in_sec: 21,
        total_sync_time_in_sec: 95_415,
        total_sync_time_in_h_m_s: seconds_to_time(95_415),
        last_synced_epoch_no: Some(466),
        last_synced_block_no: 10_012_345,
    }
}
