//! ---
//! rig_section: "06-operator-interface"
//! rig_subsection: "binary"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Operator CLI for rig runs."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rig_common::{init_tracing, LoadedRigConfig, RigConfig};
use tracing::debug;

mod catalog;
mod run;
mod terminate;

#[derive(Debug, Parser)]
#[command(author, version, about = "Run ad-hoc gRPC services as isolated processes", long_about = None)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Start services, run a routine, terminate everything, clean up")]
    Run(run::RunArgs),
    #[command(about = "Send the terminate action to a running service")]
    Terminate(terminate::TerminateArgs),
    #[command(about = "List service implementations and test routines")]
    Catalog,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let loaded = load_config(cli.config.as_ref())?;
    init_tracing("rigctl", &loaded.config.logging)?;
    match &loaded.source {
        Some(path) => debug!(config_path = %path.display(), "configuration loaded"),
        None => debug!("using default configuration"),
    }

    match cli.command {
        Commands::Run(args) => run::run(loaded.config, args),
        Commands::Terminate(args) => terminate::run(&loaded.config, args),
        Commands::Catalog => {
            catalog::run();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedRigConfig> {
    match explicit {
        Some(path) => RigConfig::load_with_source(&[path]),
        None => RigConfig::load_or_default(&[
            PathBuf::from("rig.toml"),
            PathBuf::from("configs/rig.toml"),
        ]),
    }
}
