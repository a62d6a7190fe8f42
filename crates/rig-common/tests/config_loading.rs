//! ---
//! rig_section: "02-core-functionality"
//! rig_subsection: "integration-tests"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Configuration file discovery tests."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use rig_common::RigConfig;
use tempfile::tempdir;

// RIG_CONFIG is process-global; these tests never set it.

#[test]
fn first_existing_candidate_wins() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("rig.toml");
    fs::write(
        &present,
        "[server]\nmax_workers = 4\n\n[timing]\nshutdown_grace_ms = 750\n",
    )
    .unwrap();

    let loaded = RigConfig::load_with_source(&[&missing, &present]).expect("config loads");
    assert_eq!(loaded.source.as_deref(), Some(present.as_path()));
    assert_eq!(loaded.config.server.max_workers, 4);
    assert_eq!(loaded.config.timing.shutdown_grace, Duration::from_millis(750));
}

#[test]
fn missing_candidates_report_inspected_paths() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("nowhere.toml");
    let err = RigConfig::load_with_source(&[&missing]).expect_err("no config present");
    assert!(err.to_string().contains("nowhere.toml"));
}

#[test]
fn load_or_default_falls_back_without_files() {
    let dir = tempdir().expect("tempdir");
    let loaded =
        RigConfig::load_or_default(&[dir.path().join("absent.toml")]).expect("defaults load");
    assert!(loaded.source.is_none());
    assert_eq!(loaded.config.server.max_workers, 10);
}

#[test]
fn invalid_file_is_not_silently_replaced_by_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("rig.toml");
    fs::write(&path, "[server]\nmax_workers = 0\n").unwrap();
    assert!(RigConfig::load_or_default(&[&path]).is_err());
}
