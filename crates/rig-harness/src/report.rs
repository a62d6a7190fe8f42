//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Outcome of one rig run."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rig_client::TerminateOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::process::ProcessOutcome;
use crate::registry::BoundService;

/// Everything observed during one [`crate::Harness::run_test`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier; also names the artifact directory.
    pub run_id: Uuid,
    /// When binding finished and the arena was created.
    pub started_at: DateTime<Utc>,
    /// When cleanup finished.
    pub finished_at: DateTime<Utc>,
    /// Requested routine.
    pub routine: Option<String>,
    /// Error or panic reported by the routine.
    pub routine_error: Option<String>,
    /// Why the driver's summary could not be read, if it could not.
    #[serde(default)]
    pub summary_error: Option<String>,
    /// Services with their resolved ports, in registration order.
    pub services: Vec<BoundService>,
    /// Server outcomes keyed by service name, in registration order.
    pub servers: IndexMap<String, ProcessOutcome>,
    /// Driver outcome.
    pub client: Option<ProcessOutcome>,
    /// Terminate attempts from the driver, then from the orchestrator.
    pub terminations: Vec<TerminateOutcome>,
    /// Artifacts that could not be removed.
    pub cleanup_errors: Vec<String>,
}

impl RunReport {
    /// Number of services that acknowledged at least one terminate request.
    pub fn acknowledged(&self) -> usize {
        self.services
            .iter()
            .filter(|service| self.acknowledged_by(&service.name))
            .count()
    }

    /// Whether `service` acknowledged a terminate request.
    pub fn acknowledged_by(&self, service: &str) -> bool {
        self.terminations
            .iter()
            .any(|outcome| outcome.service == service && outcome.acknowledged)
    }

    /// Terminate attempts recorded for `service`.
    pub fn terminate_attempts(&self, service: &str) -> usize {
        self.terminations
            .iter()
            .filter(|outcome| outcome.service == service)
            .count()
    }

    /// Routine passed, the driver exited 0, every server acknowledged and
    /// exited cleanly on its own.
    pub fn succeeded(&self) -> bool {
        self.routine_error.is_none()
            && self.summary_error.is_none()
            && self.client.as_ref().is_some_and(|client| client.success)
            && self.acknowledged() == self.services.len()
            && self
                .servers
                .values()
                .all(|server| server.success && !server.forced)
    }
}

#[cfg(test)]
mod tests {
    use rig_client::TerminateOrigin;

    use super::*;

    fn outcome(service: &str, origin: TerminateOrigin, acknowledged: bool) -> TerminateOutcome {
        TerminateOutcome {
            service: service.into(),
            port: 50051,
            origin,
            acknowledged,
            error: None,
            elapsed_ms: 1,
        }
    }

    fn server(name: &str) -> ProcessOutcome {
        ProcessOutcome {
            name: name.into(),
            port: Some(50051),
            exit_code: Some(0),
            success: true,
            ..ProcessOutcome::default()
        }
    }

    fn sample_report() -> RunReport {
        let services = ["Checkout", "Inventory"]
            .into_iter()
            .map(|name| BoundService {
                name: name.into(),
                implementation: name.to_lowercase(),
                port: 50051,
                auto_assigned: false,
            })
            .collect();
        RunReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            routine: None,
            routine_error: None,
            summary_error: None,
            services,
            servers: ["Checkout", "Inventory"]
                .into_iter()
                .map(|name| (name.to_owned(), server(name)))
                .collect(),
            client: Some(ProcessOutcome {
                name: "client".into(),
                exit_code: Some(0),
                success: true,
                ..ProcessOutcome::default()
            }),
            terminations: vec![
                outcome("Checkout", TerminateOrigin::Client, true),
                outcome("Inventory", TerminateOrigin::Client, false),
                outcome("Inventory", TerminateOrigin::Orchestrator, true),
            ],
            cleanup_errors: Vec::new(),
        }
    }

    #[test]
    fn counts_acknowledgments_per_service() {
        let report = sample_report();
        assert_eq!(report.acknowledged(), 2);
        assert_eq!(report.terminate_attempts("Inventory"), 2);
        assert_eq!(report.terminate_attempts("Checkout"), 1);
        assert!(report.succeeded());
    }

    #[test]
    fn forced_server_or_routine_error_fails_the_run() {
        let mut report = sample_report();
        report.servers["Inventory"].forced = true;
        assert!(!report.succeeded());

        let mut report = sample_report();
        report.routine_error = Some("boom".into());
        assert!(!report.succeeded());
    }

    #[test]
    fn report_serializes_to_json() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(json["servers"]["Checkout"]["exit_code"], 0);
        assert_eq!(json["terminations"][2]["origin"], "orchestrator");
        assert!(json["client"]["success"].as_bool().unwrap());
    }
}
