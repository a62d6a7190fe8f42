//! ---
//! rig_section: "03-server"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Serializable launch plan for one worker process."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use rig_common::{LoggingConfig, RigConfig};
use serde::{Deserialize, Serialize};

use crate::ServerError;

/// Everything a worker process needs to serve one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerPlan {
    /// Unique service name within the run.
    pub service: String,
    /// Catalog key of the business handler.
    pub implementation: String,
    /// Port to listen on. `0` asks the OS for an ephemeral port.
    pub port: u16,
    /// IP literal to listen on.
    pub bind_host: String,
    /// Bound on concurrent request handling.
    pub max_workers: usize,
    /// Logging settings forwarded from the orchestrator.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerPlan {
    /// Build a plan using the addressing and pool settings from `config`.
    pub fn new(
        service: impl Into<String>,
        implementation: impl Into<String>,
        port: u16,
        config: &RigConfig,
    ) -> Self {
        Self {
            service: service.into(),
            implementation: implementation.into(),
            port,
            bind_host: config.ports.bind_host.clone(),
            max_workers: config.server.max_workers,
            logging: config.logging.clone(),
        }
    }

    /// Read a plan written by the orchestrator.
    pub fn from_path(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ServerError::PlanFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let plan: ServerPlan = toml::from_str(&raw).map_err(|err| ServerError::PlanFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check the fields a worker cannot recover from at runtime.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.service.trim().is_empty() {
            return Err(ServerError::InvalidPlan("service name is empty".into()));
        }
        if self.max_workers == 0 {
            return Err(ServerError::InvalidPlan("max_workers must be at least 1".into()));
        }
        self.listen_addr().map(|_| ())
    }

    /// Socket address the worker binds.
    pub fn listen_addr(&self) -> Result<SocketAddr, ServerError> {
        let ip: IpAddr = self.bind_host.parse().map_err(|_| {
            ServerError::InvalidPlan(format!("bind_host '{}' is not an IP address", self.bind_host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
