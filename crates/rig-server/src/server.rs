//! ---
//! rig_section: "03-server"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Binding and serving a materialized server."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rig_proto::proto::server_control_service_server::ServerControlServiceServer;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tonic::transport::server::TcpIncoming;
use tonic::transport::Server;
use tracing::{info, warn};

use crate::catalog::{ServiceCatalog, ServiceFactory};
use crate::control::{ControlSvc, ShutdownHandle};
use crate::plan::ServerPlan;
use crate::ServerError;

/// Stdout line prefix announcing that the listener is bound.
///
/// The full line is `Server started on port <port>`; the orchestrator treats it
/// as the readiness signal.
pub const READY_BANNER_PREFIX: &str = "Server started on port ";

/// Upper bound on connection draining once shutdown has been requested.
pub const DRAIN_LIMIT: Duration = Duration::from_millis(500);

/// A server whose handler is resolved and whose socket is bound, not yet serving.
pub struct BoundServer {
    plan: ServerPlan,
    factory: Arc<dyn ServiceFactory>,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
}

impl BoundServer {
    /// Resolve the plan's implementation and bind its listener.
    ///
    /// Resolution happens before the bind so a bad plan never opens a socket.
    pub async fn bind(plan: ServerPlan, catalog: &ServiceCatalog) -> Result<Self, ServerError> {
        plan.validate()?;
        let factory = catalog.resolve(&plan.implementation)?;
        let address = plan.listen_addr()?;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { address, source })?;
        info!(service = %plan.service, implementation = %plan.implementation, contract = factory.contract(), address = %local_addr, "grpc listener bound");
        Ok(Self {
            plan,
            factory,
            listener,
            local_addr,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Address actually bound (differs from the plan when the plan asked for port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle that stops this server; the control endpoint holds a clone.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Announce readiness on stdout and serve until the shutdown handle fires.
    pub async fn run(self) -> Result<(), ServerError> {
        let BoundServer {
            plan,
            factory,
            listener,
            local_addr,
            shutdown,
        } = self;

        let incoming = TcpIncoming::from_listener(listener, true, None)
            .map_err(|err| ServerError::Incoming(err.to_string()))?;
        let control = ControlSvc::new(plan.service.clone(), shutdown.clone());
        let router = Server::builder()
            .concurrency_limit_per_connection(plan.max_workers)
            .add_service(ServerControlServiceServer::new(control));
        let router = factory.register(router);

        println!("{}{}", READY_BANNER_PREFIX, local_addr.port());

        let signal = {
            let shutdown = shutdown.clone();
            async move { shutdown.triggered().await }
        };
        let drain_deadline = {
            let shutdown = shutdown.clone();
            async move {
                shutdown.triggered().await;
                sleep(DRAIN_LIMIT).await;
            }
        };

        let serve = router.serve_with_incoming_shutdown(incoming, signal);
        tokio::pin!(serve);
        tokio::select! {
            result = &mut serve => result?,
            _ = drain_deadline => {
                warn!(service = %plan.service, limit_ms = DRAIN_LIMIT.as_millis() as u64, "drain limit reached; dropping open connections");
            }
        }

        info!(service = %plan.service, "server stopped");
        Ok(())
    }
}

/// Trigger `shutdown` on Ctrl+C or SIGTERM.
pub fn forward_os_signals(shutdown: ShutdownHandle) {
    tokio::spawn(async move {
        os_signal().await;
        info!("termination signal received");
        shutdown.trigger();
    });
}

#[cfg(unix)]
async fn os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                Ok(()) = tokio::signal::ctrl_c() => {},
                _ = term.recv() => {},
            }
        }
        Err(err) => {
            warn!(?err, "failed to install SIGTERM handler");
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn os_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
