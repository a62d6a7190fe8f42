//! ---
//! rig_section: "06-operator-interface"
//! rig_subsection: "binary"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "`rigctl terminate`: stop a running service by port."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use rig_client::{terminate_endpoint, TerminateOrigin};
use rig_common::RigConfig;
use tokio::runtime::Runtime;

/// Options for a manual terminate.
#[derive(Debug, Args)]
pub struct TerminateArgs {
    /// Port the service listens on.
    #[arg(long)]
    pub port: u16,
    /// Host to dial; defaults to `ports.connect_host`.
    #[arg(long)]
    pub host: Option<String>,
    /// Request bound in milliseconds; defaults to `timing.terminate_timeout_ms`.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

/// Send the terminate action and report the outcome.
pub fn run(config: &RigConfig, args: TerminateArgs) -> Result<ExitCode> {
    let host = args
        .host
        .unwrap_or_else(|| config.ports.connect_host.clone());
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(config.timing.terminate_timeout);
    let label = format!("{host}:{}", args.port);

    let runtime = Runtime::new()?;
    let outcome = runtime.block_on(terminate_endpoint(
        &label,
        &host,
        args.port,
        timeout,
        TerminateOrigin::Operator,
    ));

    if outcome.acknowledged {
        println!("Terminate acknowledged by {label} in {} ms", outcome.elapsed_ms);
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "Terminate not acknowledged by {label}: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
        Ok(ExitCode::FAILURE)
    }
}
