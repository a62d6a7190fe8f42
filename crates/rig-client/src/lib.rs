//! ---
//! rig_section: "04-client"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Client materializer for rig runs."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
//! The client side of a rig run: one lazily connected stub set per registered
//! service, an optional test routine, and a terminate request to every
//! service no matter how the routine ended.
#![warn(missing_docs)]

pub mod driver;
pub mod plan;
pub mod routine;
pub mod stubs;
pub mod summary;
pub mod terminate;

pub use driver::drive;
pub use plan::{ClientPlan, ClientTarget};
pub use routine::{RoutineCatalog, TestRoutine};
pub use stubs::{ServiceStub, StubSet};
pub use summary::ClientSummary;
pub use terminate::{terminate_endpoint, TerminateOrigin, TerminateOutcome};

/// Errors raised while materializing the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Reading, parsing, or writing a plan or summary file failed.
    #[error("unable to access {path}: {reason}")]
    File {
        /// File location.
        path: std::path::PathBuf,
        /// Underlying failure.
        reason: String,
    },
    /// A target address does not form a valid endpoint URI.
    #[error("invalid endpoint for service '{service}': {reason}")]
    Endpoint {
        /// Service name.
        service: String,
        /// Underlying failure.
        reason: String,
    },
}
