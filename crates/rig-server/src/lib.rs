//! ---
//! rig_section: "03-server"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Server materializer for rig-managed gRPC services."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
//! Builds a runnable gRPC server for one service from a [`ServerPlan`]: the
//! business handler resolved through the [`ServiceCatalog`], the control
//! endpoint, and an explicit [`ShutdownHandle`] tying the two together.
#![warn(missing_docs)]

pub mod catalog;
pub mod control;
pub mod demo;
pub mod plan;
pub mod server;

pub use catalog::{ServiceCatalog, ServiceFactory};
pub use control::{ControlSvc, ShutdownHandle};
pub use plan::ServerPlan;
pub use server::{forward_os_signals, BoundServer, DRAIN_LIMIT, READY_BANNER_PREFIX};

/// Errors raised while materializing or running a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The plan names an implementation the catalog does not provide.
    #[error("implementation '{implementation}' is not registered (known: {known})")]
    UnknownImplementation {
        /// Requested implementation name.
        implementation: String,
        /// Comma separated list of registered implementations.
        known: String,
    },
    /// The plan is structurally invalid.
    #[error("invalid server plan: {0}")]
    InvalidPlan(String),
    /// Reading or parsing a plan file failed.
    #[error("unable to load plan {path}: {reason}")]
    PlanFile {
        /// Plan location.
        path: std::path::PathBuf,
        /// Underlying failure.
        reason: String,
    },
    /// Binding the listening socket failed.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that could not be bound.
        address: std::net::SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The incoming connection stream could not be built.
    #[error("failed to build incoming listener: {0}")]
    Incoming(String),
    /// The transport failed while serving.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
