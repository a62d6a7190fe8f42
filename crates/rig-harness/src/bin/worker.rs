//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "binary"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Entry point serving one registered service from a plan file."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rig_common::init_tracing;
use rig_server::{forward_os_signals, BoundServer, ServerPlan, ServiceCatalog};
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "Serve one rig service until it is told to terminate", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Server plan written by the orchestrator")]
    plan: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let plan = ServerPlan::from_path(&cli.plan)?;
    init_tracing("rig-worker", &plan.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(plan.max_workers)
        .enable_all()
        .build()
        .context("failed to build worker runtime")?;

    runtime.block_on(async move {
        info!(service = %plan.service, implementation = %plan.implementation, port = plan.port, "starting worker");
        let service = plan.service.clone();
        let server = BoundServer::bind(plan, &ServiceCatalog::builtin()).await?;
        forward_os_signals(server.shutdown_handle());
        server.run().await?;
        info!(%service, "worker exiting");
        Ok::<(), anyhow::Error>(())
    })
}
