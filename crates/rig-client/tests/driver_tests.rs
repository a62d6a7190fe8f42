//! ---
//! rig_section: "04-client"
//! rig_subsection: "integration-tests"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Driver runs against in-process servers."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rig_client::{drive, ClientPlan, ClientTarget, RoutineCatalog, StubSet, TestRoutine};
use rig_common::RigConfig;
use rig_server::{BoundServer, ServerError, ServerPlan, ServiceCatalog};
use tokio::task::JoinHandle;
use tokio::time::timeout;

fn loopback_config() -> RigConfig {
    let mut config = RigConfig::default();
    config.ports.bind_host = "127.0.0.1".into();
    config.ports.connect_host = "127.0.0.1".into();
    config
}

async fn spawn_server(
    name: &str,
    implementation: &str,
    config: &RigConfig,
) -> (ClientTarget, JoinHandle<Result<(), ServerError>>) {
    let plan = ServerPlan::new(name, implementation, 0, config);
    let server = BoundServer::bind(plan, &ServiceCatalog::builtin())
        .await
        .expect("server binds");
    let target = ClientTarget {
        name: name.into(),
        implementation: implementation.into(),
        port: server.local_addr().port(),
    };
    (target, tokio::spawn(server.run()))
}

async fn assert_stopped(task: JoinHandle<Result<(), ServerError>>) {
    timeout(Duration::from_secs(3), task)
        .await
        .expect("server stops after terminate")
        .expect("server task joined")
        .expect("server exits cleanly");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn smoke_routine_then_every_service_terminated() {
    let config = loopback_config();
    let (checkout, checkout_task) = spawn_server("Checkout", "checkout", &config).await;
    let (inventory, inventory_task) = spawn_server("Inventory", "inventory", &config).await;

    let plan = ClientPlan::new(
        vec![checkout, inventory],
        Some("smoke".into()),
        PathBuf::from("unused.json"),
        &config,
    );
    let summary = drive(&plan, &RoutineCatalog::builtin()).await;

    assert!(summary.succeeded(), "{:?}", summary.routine_error);
    assert_eq!(summary.terminations.len(), 2);
    assert!(summary.acknowledged("Checkout"));
    assert!(summary.acknowledged("Inventory"));
    assert_stopped(checkout_task).await;
    assert_stopped(inventory_task).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn routine_error_still_terminates() {
    let config = loopback_config();
    let (inventory, inventory_task) = spawn_server("Inventory", "inventory", &config).await;

    let plan = ClientPlan::new(
        vec![inventory],
        Some("place-order".into()),
        PathBuf::from("unused.json"),
        &config,
    );
    let summary = drive(&plan, &RoutineCatalog::builtin()).await;

    let error = summary.routine_error.as_deref().expect("routine fails");
    assert!(error.contains("no registered service implements checkout"));
    assert!(summary.acknowledged("Inventory"));
    assert_stopped(inventory_task).await;
}

struct Explode;

#[async_trait]
impl TestRoutine for Explode {
    fn description(&self) -> &'static str {
        "panics on purpose"
    }

    async fn run(&self, _stubs: &StubSet) -> Result<()> {
        panic!("routine blew up");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_routine_is_captured() {
    let config = loopback_config();
    let (checkout, checkout_task) = spawn_server("Checkout", "checkout", &config).await;

    let plan = ClientPlan::new(
        vec![checkout],
        Some("explode".into()),
        PathBuf::from("unused.json"),
        &config,
    );
    let routines = RoutineCatalog::builtin().with("explode", Explode);
    let summary = drive(&plan, &routines).await;

    assert_eq!(
        summary.routine_error.as_deref(),
        Some("routine panicked: routine blew up")
    );
    assert!(summary.acknowledged("Checkout"));
    assert_stopped(checkout_task).await;
}

#[tokio::test]
async fn unreachable_service_is_recorded() {
    let config = loopback_config();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let plan = ClientPlan::new(
        vec![ClientTarget {
            name: "Ghost".into(),
            implementation: "checkout".into(),
            port,
        }],
        None,
        PathBuf::from("unused.json"),
        &config,
    );
    let summary = drive(&plan, &RoutineCatalog::builtin()).await;

    assert!(summary.succeeded());
    assert_eq!(summary.terminations.len(), 1);
    assert!(!summary.terminations[0].acknowledged);
    assert!(summary.terminations[0].error.is_some());
}
