//! ---
//! rig_section: "04-client"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Summary the driver hands back to the orchestrator."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::terminate::TerminateOutcome;
use crate::ClientError;

/// What the driver observed during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    /// Routine that was requested, if any.
    #[serde(default)]
    pub routine: Option<String>,
    /// Error or panic message raised by the routine.
    #[serde(default)]
    pub routine_error: Option<String>,
    /// One outcome per target, in registration order.
    #[serde(default)]
    pub terminations: Vec<TerminateOutcome>,
}

impl ClientSummary {
    /// Whether the routine finished without error.
    pub fn succeeded(&self) -> bool {
        self.routine_error.is_none()
    }

    /// Whether `service` acknowledged a terminate request.
    pub fn acknowledged(&self, service: &str) -> bool {
        self.terminations
            .iter()
            .any(|outcome| outcome.service == service && outcome.acknowledged)
    }

    /// Persist as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<(), ClientError> {
        let file_error = |reason: String| ClientError::File {
            path: path.to_path_buf(),
            reason,
        };
        let body = serde_json::to_vec_pretty(self).map_err(|err| file_error(err.to_string()))?;
        std::fs::write(path, body).map_err(|err| file_error(err.to_string()))
    }

    /// Load a summary written by [`ClientSummary::write_to`].
    pub fn read_from(path: &Path) -> Result<Self, ClientError> {
        let file_error = |reason: String| ClientError::File {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read(path).map_err(|err| file_error(err.to_string()))?;
        serde_json::from_slice(&raw).map_err(|err| file_error(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminate::TerminateOrigin;

    fn outcome(service: &str, acknowledged: bool) -> TerminateOutcome {
        TerminateOutcome {
            service: service.into(),
            port: 50051,
            origin: TerminateOrigin::Client,
            acknowledged,
            error: (!acknowledged).then(|| "Unavailable: connection refused".to_owned()),
            elapsed_ms: 3,
        }
    }

    #[test]
    fn acknowledged_looks_at_matching_service_only() {
        let summary = ClientSummary {
            routine: Some("smoke".into()),
            routine_error: None,
            terminations: vec![outcome("Checkout", true), outcome("Inventory", false)],
        };
        assert!(summary.succeeded());
        assert!(summary.acknowledged("Checkout"));
        assert!(!summary.acknowledged("Inventory"));
        assert!(!summary.acknowledged("Payments"));
    }

    #[test]
    fn summary_file_is_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = ClientSummary {
            routine: None,
            routine_error: Some("boom".into()),
            terminations: vec![outcome("Checkout", true)],
        };
        summary.write_to(&path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["terminations"][0]["origin"], "client");
        assert_eq!(ClientSummary::read_from(&path).unwrap(), summary);
    }

    #[test]
    fn missing_summary_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientSummary::read_from(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ClientError::File { .. }));
    }
}
