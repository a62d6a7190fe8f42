//! ---
//! rig_section: "01-contract"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Generated protobuf modules for control and demo services."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
//! Re-exports the generated protobuf modules so the worker, the driver, and
//! the orchestrator depend on one stable contract.

#[allow(missing_docs)]
pub mod rig {
    pub mod v1 {
        tonic::include_proto!("rig.v1");
    }
}

pub use rig::v1 as proto;

/// Action value understood by `ServerControlService.TerminateServer`.
pub const TERMINATE_ACTION: &str = "terminate";

/// Build the control request asking a server to stop.
pub fn terminate_request() -> proto::ControlRequest {
    proto::ControlRequest {
        action: TERMINATE_ACTION.to_owned(),
    }
}
