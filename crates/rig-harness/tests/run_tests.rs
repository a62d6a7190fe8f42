//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "integration-tests"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "End-to-end runs against the rig-worker and rig-driver binaries."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::time::Duration;

use rig_client::TerminateOrigin;
use rig_common::RigConfig;
use rig_harness::{Harness, HarnessError, RunReport, ServiceDescriptor};

fn config(root: &Path) -> RigConfig {
    let mut config = RigConfig::default();
    config.runtime.artifact_root = root.to_path_buf();
    config.runtime.worker_binary = Some(PathBuf::from(env!("CARGO_BIN_EXE_rig-worker")));
    config.runtime.driver_binary = Some(PathBuf::from(env!("CARGO_BIN_EXE_rig-driver")));
    config.ports.bind_host = "127.0.0.1".into();
    config.ports.connect_host = "127.0.0.1".into();
    config.timing.readiness_timeout = Duration::from_secs(10);
    config.timing.call_timeout = Duration::from_secs(5);
    config.timing.terminate_timeout = Duration::from_secs(2);
    config
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn assert_no_artifacts(root: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(root)
        .map(|entries| entries.filter_map(Result::ok).map(|entry| entry.path()).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "leftover artifacts: {leftovers:?}");
}

fn assert_all_exited(report: &RunReport) {
    for (name, server) in &report.servers {
        assert!(
            server.exit_code.is_some() || server.forced,
            "server {name} was not reaped: {server:?}"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_service_without_routine_is_terminated() {
    let root = tempfile::tempdir().unwrap();
    let port = free_port();
    let harness = Harness::new(config(root.path()));

    let report = harness
        .run_test(&[ServiceDescriptor::new("Checkout", "checkout").with_port(port)], None)
        .await
        .expect("run completes");

    assert_eq!(report.services[0].port, port);
    assert!(!report.services[0].auto_assigned);
    let server = &report.servers["Checkout"];
    assert_eq!(server.port, Some(port));
    assert!(server.printed(&format!("Server started on port {port}")), "{server:?}");
    assert_eq!(server.exit_code, Some(0));
    assert!(!server.forced);
    assert!(report.acknowledged_by("Checkout"));
    assert_eq!(report.terminate_attempts("Checkout"), 1);
    assert!(report.cleanup_errors.is_empty());
    assert!(report.succeeded(), "{report:?}");
    assert_no_artifacts(root.path());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn smoke_routine_reaches_every_service() {
    let root = tempfile::tempdir().unwrap();
    let harness = Harness::new(config(root.path()));

    let report = harness
        .run_test(
            &[
                ServiceDescriptor::new("Checkout", "checkout"),
                ServiceDescriptor::new("Inventory", "inventory"),
            ],
            Some("smoke"),
        )
        .await
        .expect("run completes");

    assert_eq!(report.routine_error, None);
    assert_eq!(report.acknowledged(), 2);
    assert!(report.services.iter().all(|service| service.auto_assigned));
    assert_ne!(report.services[0].port, report.services[1].port);
    let client = report.client.as_ref().expect("driver ran");
    assert!(client.success);
    assert!(client.stdout.iter().any(|line| line.contains("Order ID")));
    assert!(report.succeeded(), "{report:?}");
    assert_all_exited(&report);
    assert_no_artifacts(root.path());
}

#[tokio::test]
async fn unknown_implementation_spawns_nothing() {
    let root = tempfile::tempdir().unwrap();
    let harness = Harness::new(config(root.path()));

    let err = harness
        .run_test(&[ServiceDescriptor::new("Payments", "payments")], Some("smoke"))
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::Binding { ref service, .. } if service == "Payments"));
    assert_no_artifacts(root.path());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_routine_still_terminates_everything() {
    let root = tempfile::tempdir().unwrap();
    let harness = Harness::new(config(root.path()));

    let report = harness
        .run_test(&[ServiceDescriptor::new("Inventory", "inventory")], Some("place-order"))
        .await
        .expect("routine failure is reported, not raised");

    let error = report.routine_error.as_deref().expect("routine error recorded");
    assert!(error.contains("checkout"), "{error}");
    assert!(report.acknowledged_by("Inventory"));
    let client = report.client.as_ref().expect("driver ran");
    assert_eq!(client.exit_code, Some(1));
    assert!(!report.succeeded());
    assert_all_exited(&report);
    assert_no_artifacts(root.path());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn occupied_port_is_not_ready_and_cleaned_up() {
    let root = tempfile::tempdir().unwrap();
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();
    let harness = Harness::new(config(root.path()));

    let err = harness
        .run_test(
            &[
                ServiceDescriptor::new("Inventory", "inventory"),
                ServiceDescriptor::new("Checkout", "checkout").with_port(port),
            ],
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::NotReady { .. }), "{err}");
    assert_no_artifacts(root.path());
    drop(blocker);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn orchestrator_terminates_when_driver_does_not() {
    let root = tempfile::tempdir().unwrap();
    let mut config = config(root.path());
    config.runtime.driver_binary = Some(PathBuf::from("/bin/true"));
    let harness = Harness::new(config);

    let report = harness
        .run_test(
            &[
                ServiceDescriptor::new("Checkout", "checkout"),
                ServiceDescriptor::new("Inventory", "inventory"),
            ],
            None,
        )
        .await
        .expect("run completes");

    assert!(report.summary_error.is_some());
    assert_eq!(report.acknowledged(), 2);
    assert!(report
        .terminations
        .iter()
        .all(|outcome| outcome.origin == TerminateOrigin::Orchestrator));
    assert!(report.servers.values().all(|server| server.success));
    assert!(!report.succeeded());
    assert_no_artifacts(root.path());
}
