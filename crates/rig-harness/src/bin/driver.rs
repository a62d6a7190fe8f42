//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "binary"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Entry point running the client side of a rig run."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use rig_client::{drive, ClientPlan, RoutineCatalog};
use rig_common::init_tracing;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about = "Run a test routine, then terminate every rig service", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Client plan written by the orchestrator")]
    plan: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let plan = ClientPlan::from_path(&cli.plan)?;
    init_tracing("rig-driver", &plan.logging)?;

    info!(services = plan.targets.len(), routine = plan.routine.as_deref().unwrap_or("-"), "driver starting");
    let summary = drive(&plan, &RoutineCatalog::builtin()).await;
    summary.write_to(&plan.summary_path)?;

    match &summary.routine_error {
        Some(reason) => {
            error!(%reason, "test routine failed");
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}
