//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Registry binding and process orchestration for rig runs."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
//! Turns a list of service registrations into running `rig-worker`
//! processes, drives them from one `rig-driver` process, makes sure every
//! server receives a terminate request, and leaves nothing behind on disk
//! or in the process table.
#![warn(missing_docs)]

pub mod artifacts;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod registry;
pub mod report;

pub use artifacts::RunArena;
pub use error::HarnessError;
pub use orchestrator::{Harness, RunPhase, CLIENT_PROCESS};
pub use process::{ProcessHandle, ProcessOutcome};
pub use registry::{bind_services, BoundService, ServiceDescriptor};
pub use report::RunReport;
