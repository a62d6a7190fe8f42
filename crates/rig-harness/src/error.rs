//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Errors surfaced by a rig run."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a run.
///
/// Everything else (routine errors, unacknowledged terminates, cleanup
/// problems) is recorded in the [`crate::RunReport`] instead.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A registration cannot be bound; raised before anything is created.
    #[error("cannot bind service '{service}': {reason}")]
    Binding {
        /// Offending service name (may be empty).
        service: String,
        /// Why binding failed.
        reason: String,
    },
    /// The configuration handed to the harness is invalid.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Validation failure.
        reason: String,
    },
    /// The requested routine is not registered with the driver.
    #[error("unknown test routine '{name}' (known: {known})")]
    UnknownRoutine {
        /// Requested routine.
        name: String,
        /// Comma-separated known routines.
        known: String,
    },
    /// A process could not be launched.
    #[error("failed to spawn {process}: {source}")]
    Spawn {
        /// Process label.
        process: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// A server never announced readiness.
    #[error("server '{service}' did not become ready: {reason}")]
    NotReady {
        /// Service name.
        service: String,
        /// Timeout or early exit description, with captured output.
        reason: String,
    },
    /// Writing or locating a run artifact failed.
    #[error("artifact {path}: {source}")]
    Artifact {
        /// Artifact path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    pub(crate) fn binding(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Binding {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any process or artifact existed.
    pub fn is_pre_spawn(&self) -> bool {
        matches!(
            self,
            Self::Binding { .. } | Self::Config { .. } | Self::UnknownRoutine { .. }
        )
    }
}
