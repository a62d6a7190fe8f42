//! ---
//! rig_section: "02-core-functionality"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Shared primitives for rig processes."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
//! Shared primitives for the rig workspace: configuration loading and the
//! tracing bootstrap used by the orchestrator, workers, and drivers.

pub mod config;
pub mod logging;

pub use config::{
    LoadedRigConfig, LoggingConfig, PortConfig, RigConfig, RuntimeConfig, ServerConfig,
    TimingConfig, DRIVER_BINARY, MIN_SERVICE_PORT, WORKER_BINARY,
};
pub use logging::{init_tracing, LogFormat};
