//! ---
//! rig_section: "06-operator-interface"
//! rig_subsection: "binary"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "`rigctl run`: one orchestrated run."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use rig_common::RigConfig;
use rig_harness::{Harness, RunReport, ServiceDescriptor};
use tokio::runtime::Runtime;

/// Options for a single run.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Service registration as NAME[=IMPL][:PORT]; repeat for more services.
    #[arg(long = "service", value_name = "SPEC", required = true)]
    pub services: Vec<ServiceDescriptor>,
    /// Test routine executed by the driver.
    #[arg(long, value_name = "NAME")]
    pub routine: Option<String>,
    /// Print the full report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the run and print its report.
pub fn run(config: RigConfig, args: RunArgs) -> Result<ExitCode> {
    let harness = Harness::new(config);
    let runtime = Runtime::new()?;
    let report = runtime.block_on(harness.run_test(&args.services, args.routine.as_deref()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_report(&report);
    }

    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn render_report(report: &RunReport) {
    println!("Run {}", report.run_id);
    if let Some(routine) = &report.routine {
        match &report.routine_error {
            Some(error) => println!("  routine   : {routine} (failed: {error})"),
            None => println!("  routine   : {routine} (passed)"),
        }
    }
    for service in &report.services {
        let exit = report
            .servers
            .get(&service.name)
            .map(|server| {
                let code = server
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_owned());
                if server.forced {
                    format!("exit {code}, forced")
                } else {
                    format!("exit {code}")
                }
            })
            .unwrap_or_else(|| "not started".to_owned());
        println!(
            "  {:<10}: {}:{} terminate {} ({} attempt(s)), {}",
            service.name,
            service.implementation,
            service.port,
            if report.acknowledged_by(&service.name) {
                "acknowledged"
            } else {
                "NOT acknowledged"
            },
            report.terminate_attempts(&service.name),
            exit
        );
    }
    if let Some(client) = &report.client {
        for line in &client.stdout {
            println!("  | {line}");
        }
    }
    if let Some(error) = &report.summary_error {
        println!("  summary   : {error}");
    }
    for error in &report.cleanup_errors {
        println!("  cleanup   : {error}");
    }
    println!(
        "  result    : {}",
        if report.succeeded() { "ok" } else { "failed" }
    );
}
