//! ---
//! rig_section: "04-client"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Serializable launch plan for the driver process."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rig_common::{LoggingConfig, RigConfig};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::ClientError;

/// One registered service the driver talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTarget {
    /// Unique service name within the run.
    pub name: String,
    /// Catalog key of the business handler, used to pick typed stubs.
    pub implementation: String,
    /// Port the service listens on.
    pub port: u16,
}

/// Everything the driver process needs for one run.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPlan {
    /// Host the driver dials for every target.
    pub connect_host: String,
    /// Routine to execute before terminating, if any.
    #[serde(default)]
    pub routine: Option<String>,
    /// Bound applied to routine calls made through [`crate::StubSet::call`].
    #[serde(rename = "call_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub call_timeout: Duration,
    /// Bound applied to each terminate request.
    #[serde(rename = "terminate_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub terminate_timeout: Duration,
    /// Where the driver writes its [`crate::ClientSummary`].
    pub summary_path: PathBuf,
    /// Logging settings forwarded from the orchestrator.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Services in registration order.
    pub targets: Vec<ClientTarget>,
}

impl ClientPlan {
    /// Build a plan using the addressing and timing settings from `config`.
    pub fn new(
        targets: Vec<ClientTarget>,
        routine: Option<String>,
        summary_path: PathBuf,
        config: &RigConfig,
    ) -> Self {
        Self {
            connect_host: config.ports.connect_host.clone(),
            routine,
            call_timeout: config.timing.call_timeout,
            terminate_timeout: config.timing.terminate_timeout,
            summary_path,
            logging: config.logging.clone(),
            targets,
        }
    }

    /// Read a plan written by the orchestrator.
    pub fn from_path(path: &Path) -> Result<Self, ClientError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ClientError::File {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        toml::from_str(&raw).map_err(|err| ClientError::File {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

/// Plaintext gRPC endpoint URI; IPv6 literals are bracketed.
pub fn endpoint_uri(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("http://[{host}]:{port}")
    } else {
        format!("http://{host}:{port}")
    }
}
