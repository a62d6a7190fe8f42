//! ---
//! rig_section: "03-server"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Control endpoint and explicit shutdown handle."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::sync::Arc;

use rig_proto::proto::server_control_service_server::ServerControlService;
use rig_proto::proto::{ControlRequest, Empty};
use rig_proto::TERMINATE_ACTION;
use tokio::sync::watch;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

/// Latch that stops exactly one server once triggered.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    /// Fresh, untriggered handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown. Further calls are no-ops.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// `ServerControlService` implementation bound to one server's shutdown handle.
#[derive(Debug, Clone)]
pub struct ControlSvc {
    service: String,
    shutdown: ShutdownHandle,
}

impl ControlSvc {
    /// Control handler that stops the server owning `shutdown`.
    pub fn new(service: impl Into<String>, shutdown: ShutdownHandle) -> Self {
        Self {
            service: service.into(),
            shutdown,
        }
    }
}

#[tonic::async_trait]
impl ServerControlService for ControlSvc {
    async fn terminate_server(
        &self,
        request: Request<ControlRequest>,
    ) -> Result<Response<Empty>, Status> {
        let action = request.into_inner().action;
        if action != TERMINATE_ACTION {
            warn!(service = %self.service, %action, "ignoring unsupported control action");
            return Err(Status::invalid_argument(format!(
                "unsupported control action '{action}'"
            )));
        }
        info!(service = %self.service, "terminating server");
        // The acknowledgment still goes out: graceful shutdown finishes in-flight calls.
        self.shutdown.trigger();
        Ok(Response::new(Empty {}))
    }
}
