//! ---
//! rig_section: "04-client"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Terminate requests and their recorded outcomes."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use rig_proto::proto::server_control_service_client::ServerControlServiceClient;
use serde::{Deserialize, Serialize};
use tonic::transport::{Channel, Endpoint};
use tracing::{info, warn};

use crate::plan::endpoint_uri;
use crate::stubs::ServiceStub;

/// Who issued a terminate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminateOrigin {
    /// The driver process, after the routine.
    Client,
    /// The orchestrator, for services the driver did not reach.
    Orchestrator,
    /// An operator via `rigctl terminate`.
    Operator,
}

/// Result of one terminate attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateOutcome {
    /// Target service name.
    pub service: String,
    /// Target port.
    pub port: u16,
    /// Issuer of the request.
    pub origin: TerminateOrigin,
    /// Whether the server returned the empty acknowledgment.
    pub acknowledged: bool,
    /// Transport status or timeout when not acknowledged.
    #[serde(default)]
    pub error: Option<String>,
    /// Wall time spent on the attempt.
    pub elapsed_ms: u64,
}

/// Send `terminate` through an existing control stub, bounded by `timeout`.
pub async fn terminate(
    mut control: ServerControlServiceClient<Channel>,
    service: &str,
    port: u16,
    timeout: Duration,
    origin: TerminateOrigin,
) -> TerminateOutcome {
    let started = Instant::now();
    let result = tokio::time::timeout(
        timeout,
        control.terminate_server(rig_proto::terminate_request()),
    )
    .await;
    let error = match result {
        Ok(Ok(_)) => None,
        Ok(Err(status)) => Some(format!("{:?}: {}", status.code(), status.message())),
        Err(_) => Some(format!("timed out after {} ms", timeout.as_millis())),
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &error {
        None => info!(%service, port, ?origin, elapsed_ms, "terminate acknowledged"),
        Some(reason) => warn!(%service, port, ?origin, %reason, "terminate failed"),
    }
    TerminateOutcome {
        service: service.to_owned(),
        port,
        origin,
        acknowledged: error.is_none(),
        error,
        elapsed_ms,
    }
}

/// Terminate the service behind `stub`.
pub async fn terminate_stub(stub: &ServiceStub, timeout: Duration) -> TerminateOutcome {
    terminate(
        stub.control(),
        stub.name(),
        stub.port(),
        timeout,
        TerminateOrigin::Client,
    )
    .await
}

/// Terminate whatever listens on `host:port` without a prepared stub.
pub async fn terminate_endpoint(
    service: &str,
    host: &str,
    port: u16,
    timeout: Duration,
    origin: TerminateOrigin,
) -> TerminateOutcome {
    match Endpoint::from_shared(endpoint_uri(host, port)) {
        Ok(endpoint) => {
            let control = ServerControlServiceClient::new(endpoint.connect_lazy());
            terminate(control, service, port, timeout, origin).await
        }
        Err(err) => TerminateOutcome {
            service: service.to_owned(),
            port,
            origin,
            acknowledged: false,
            error: Some(format!("invalid endpoint: {err}")),
            elapsed_ms: 0,
        },
    }
}
