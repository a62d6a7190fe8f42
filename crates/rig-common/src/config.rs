//! ---
//! rig_section: "02-core-functionality"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Configuration model and loading for rig processes."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Lowest port a service may be bound to.
pub const MIN_SERVICE_PORT: u16 = 1024;

/// Binary name of the per-service server entry point.
pub const WORKER_BINARY: &str = "rig-worker";

/// Binary name of the client driver entry point.
pub const DRIVER_BINARY: &str = "rig-driver";

fn default_artifact_root() -> PathBuf {
    std::env::temp_dir().join("rig-runs")
}

fn default_port_range_start() -> u16 {
    50000
}

fn default_port_range_end() -> u16 {
    59999
}

fn default_bind_host() -> String {
    "::".to_owned()
}

fn default_connect_host() -> String {
    "localhost".to_owned()
}

fn default_readiness_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_terminate_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_client_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_max_workers() -> usize {
    10
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Top-level configuration shared by the orchestrator, workers, and drivers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub ports: PortConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`RigConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedRigConfig {
    pub config: RigConfig,
    /// `None` when no file was found and defaults were used.
    pub source: Option<PathBuf>,
}

impl RigConfig {
    pub const ENV_CONFIG_PATH: &str = "RIG_CONFIG";

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedRigConfig> {
        if let Some(path) = Self::env_override() {
            let config = Self::from_path(&path)?;
            return Ok(LoadedRigConfig {
                config,
                source: Some(path),
            });
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedRigConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Like [`RigConfig::load_with_source`], but falls back to defaults when
    /// neither the override nor any candidate exists.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedRigConfig> {
        let any_present =
            Self::env_override().is_some() || candidates.iter().any(|c| c.as_ref().exists());
        if any_present {
            return Self::load_with_source(candidates);
        }
        debug!("no configuration file present; using defaults");
        let config = RigConfig::default();
        config.validate()?;
        Ok(LoadedRigConfig {
            config,
            source: None,
        })
    }

    fn env_override() -> Option<PathBuf> {
        std::env::var(Self::ENV_CONFIG_PATH)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<RigConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.ports.validate()?;
        self.timing.validate()?;
        self.server.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for RigConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: RigConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Where the rig finds its entry points and writes per-run artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub worker_binary: Option<PathBuf>,
    #[serde(default)]
    pub driver_binary: Option<PathBuf>,
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_binary: None,
            driver_binary: None,
            artifact_root: default_artifact_root(),
        }
    }
}

impl RuntimeConfig {
    /// Effective path of the worker entry point.
    pub fn worker_binary(&self) -> Result<PathBuf> {
        resolve_binary(self.worker_binary.as_deref(), WORKER_BINARY)
    }

    /// Effective path of the driver entry point.
    pub fn driver_binary(&self) -> Result<PathBuf> {
        resolve_binary(self.driver_binary.as_deref(), DRIVER_BINARY)
    }
}

/// Explicit paths win; otherwise the binary is expected next to the running executable.
fn resolve_binary(explicit: Option<&Path>, name: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let current = std::env::current_exe().context("unable to locate the running executable")?;
    let mut sibling = current.with_file_name(name);
    if cfg!(windows) {
        sibling.set_extension("exe");
    }
    Ok(sibling)
}

/// Port assignment and addressing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    #[serde(default = "default_port_range_start")]
    pub range_start: u16,
    #[serde(default = "default_port_range_end")]
    pub range_end: u16,
    /// IP literal servers listen on.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// Host name or IP the driver dials.
    #[serde(default = "default_connect_host")]
    pub connect_host: String,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            range_start: default_port_range_start(),
            range_end: default_port_range_end(),
            bind_host: default_bind_host(),
            connect_host: default_connect_host(),
        }
    }
}

impl PortConfig {
    pub fn validate(&self) -> Result<()> {
        if self.range_start < MIN_SERVICE_PORT {
            return Err(anyhow!(
                "port range must start at or above {}, got {}",
                MIN_SERVICE_PORT,
                self.range_start
            ));
        }
        if self.range_start > self.range_end {
            return Err(anyhow!(
                "port range start {} exceeds end {}",
                self.range_start,
                self.range_end
            ));
        }
        self.bind_host
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("bind_host '{}' is not an IP address", self.bind_host))?;
        if self.connect_host.trim().is_empty() {
            return Err(anyhow!("connect_host cannot be empty"));
        }
        Ok(())
    }
}

/// Readiness, call, and shutdown bounds.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_readiness_timeout", rename = "readiness_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub readiness_timeout: Duration,
    #[serde(default = "default_call_timeout", rename = "call_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub call_timeout: Duration,
    #[serde(default = "default_terminate_timeout", rename = "terminate_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub terminate_timeout: Duration,
    #[serde(default = "default_shutdown_grace", rename = "shutdown_grace_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub shutdown_grace: Duration,
    #[serde(default = "default_client_timeout", rename = "client_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub client_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: default_readiness_timeout(),
            call_timeout: default_call_timeout(),
            terminate_timeout: default_terminate_timeout(),
            shutdown_grace: default_shutdown_grace(),
            client_timeout: default_client_timeout(),
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("readiness_timeout_ms", self.readiness_timeout),
            ("call_timeout_ms", self.call_timeout),
            ("terminate_timeout_ms", self.terminate_timeout),
            ("shutdown_grace_ms", self.shutdown_grace),
            ("client_timeout_ms", self.client_timeout),
        ] {
            if value.is_zero() {
                return Err(anyhow!("timing.{} must be greater than zero", name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Size of each worker's request-handling pool.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(anyhow!("server.max_workers must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Directory for an additional daily rolling JSON log; disabled when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            directory: None,
            file_prefix: None,
        }
    }
}
