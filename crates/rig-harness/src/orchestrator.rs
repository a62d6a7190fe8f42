//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Drives one run from binding to cleanup."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use futures::future::join_all;
use indexmap::IndexMap;
use rig_client::{
    terminate_endpoint, ClientPlan, ClientSummary, ClientTarget, RoutineCatalog, TerminateOrigin,
};
use rig_common::RigConfig;
use rig_server::{ServerPlan, ServiceCatalog, READY_BANNER_PREFIX};
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::artifacts::RunArena;
use crate::error::HarnessError;
use crate::process::{ProcessHandle, ProcessOutcome};
use crate::registry::{bind_services, BoundService, ServiceDescriptor};
use crate::report::RunReport;

/// Label used for the driver process in logs and reports.
pub const CLIENT_PROCESS: &str = "client";

/// Stderr lines quoted in a readiness failure.
const STDERR_TAIL: usize = 5;

/// Lifecycle of a run, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Nothing started.
    Idle,
    /// Writing plans and spawning workers.
    ServersStarting,
    /// Waiting for readiness banners.
    WarmingUp,
    /// Driver running.
    ClientRunning,
    /// Fallback terminates and bounded waits on workers.
    ServersDraining,
    /// Removing artifacts.
    CleaningUp,
    /// Report assembled.
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunPhase::Idle => "idle",
            RunPhase::ServersStarting => "servers-starting",
            RunPhase::WarmingUp => "warming-up",
            RunPhase::ClientRunning => "client-running",
            RunPhase::ServersDraining => "servers-draining",
            RunPhase::CleaningUp => "cleaning-up",
            RunPhase::Done => "done",
        };
        f.write_str(label)
    }
}

fn enter(phase: RunPhase) {
    info!(%phase, "run phase");
}

/// Spawns workers and a driver for a set of registrations and reports what happened.
#[derive(Debug, Clone)]
pub struct Harness {
    config: RigConfig,
    services: ServiceCatalog,
    routines: RoutineCatalog,
}

/// Fields gathered before cleanup.
struct Execution {
    servers: IndexMap<String, ProcessOutcome>,
    client: ProcessOutcome,
    summary: Option<ClientSummary>,
    summary_error: Option<String>,
    fallback: Vec<rig_client::TerminateOutcome>,
}

impl Harness {
    /// Harness validating against the catalogs built into `rig-worker` and `rig-driver`.
    pub fn new(config: RigConfig) -> Self {
        Self::with_catalogs(config, ServiceCatalog::builtin(), RoutineCatalog::builtin())
    }

    /// Harness for entry points built with other catalogs.
    pub fn with_catalogs(
        config: RigConfig,
        services: ServiceCatalog,
        routines: RoutineCatalog,
    ) -> Self {
        Self {
            config,
            services,
            routines,
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// Implementations a registration may name.
    pub fn services(&self) -> &ServiceCatalog {
        &self.services
    }

    /// Routines a run may request.
    pub fn routines(&self) -> &RoutineCatalog {
        &self.routines
    }

    /// Run `routine` against freshly spawned servers for `descriptors`.
    ///
    /// Binding and routine errors are raised before anything is created.
    /// Later failures are raised only after every spawned process has been
    /// reaped and the run's artifacts removed.
    pub async fn run_test(
        &self,
        descriptors: &[ServiceDescriptor],
        routine: Option<&str>,
    ) -> Result<RunReport, HarnessError> {
        enter(RunPhase::Idle);
        self.config
            .validate()
            .map_err(|err| HarnessError::Config {
                reason: format!("{err:#}"),
            })?;
        if let Some(name) = routine {
            if !self.routines.contains(name) {
                return Err(HarnessError::UnknownRoutine {
                    name: name.to_owned(),
                    known: self
                        .routines
                        .entries()
                        .map(|(name, _)| name)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }
        let bound = bind_services(
            descriptors,
            &self.services,
            &self.config.ports,
            &mut rand::thread_rng(),
        )?;
        let worker = locate(self.config.runtime.worker_binary(), rig_common::WORKER_BINARY)?;
        let driver = locate(self.config.runtime.driver_binary(), rig_common::DRIVER_BINARY)?;

        let started_at = Utc::now();
        let mut arena = RunArena::create(&self.config.runtime.artifact_root).await?;
        let run_id = arena.run_id();
        let span = info_span!("run", %run_id);

        let result = self
            .execute(&mut arena, &bound, routine, &worker, &driver)
            .instrument(span.clone())
            .await;

        let cleanup_errors = async {
            enter(RunPhase::CleaningUp);
            arena.cleanup().await
        }
        .instrument(span.clone())
        .await;

        let execution = match result {
            Ok(execution) => execution,
            Err(err) => {
                let _guard = span.enter();
                error!(error = %err, cleanup_errors = cleanup_errors.len(), "run aborted");
                return Err(err);
            }
        };

        let (routine_error, mut terminations) = match execution.summary {
            Some(summary) => (summary.routine_error, summary.terminations),
            None => (None, Vec::new()),
        };
        terminations.extend(execution.fallback);

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            routine: routine.map(str::to_owned),
            routine_error,
            summary_error: execution.summary_error,
            services: bound,
            servers: execution.servers,
            client: Some(execution.client),
            terminations,
            cleanup_errors,
        };
        let _guard = span.enter();
        enter(RunPhase::Done);
        info!(
            acknowledged = report.acknowledged(),
            services = report.services.len(),
            succeeded = report.succeeded(),
            "run finished"
        );
        Ok(report)
    }

    async fn execute(
        &self,
        arena: &mut RunArena,
        bound: &[BoundService],
        routine: Option<&str>,
        worker: &Path,
        driver: &Path,
    ) -> Result<Execution, HarnessError> {
        enter(RunPhase::ServersStarting);
        let mut servers = Vec::with_capacity(bound.len());
        for service in bound {
            match self.start_server(arena, service, worker).await {
                Ok(handle) => servers.push(handle),
                Err(err) => {
                    kill_all(servers).await;
                    return Err(err);
                }
            }
        }

        enter(RunPhase::WarmingUp);
        let deadline = Instant::now() + self.config.timing.readiness_timeout;
        let mut not_ready = None;
        for handle in servers.iter_mut() {
            if let Err(reason) = handle.wait_ready(deadline).await {
                not_ready = Some((handle.name().to_owned(), reason));
                break;
            }
        }
        if let Some((service, reason)) = not_ready {
            let outcomes = kill_all(servers).await;
            let tail = outcomes
                .get(&service)
                .map(|outcome| stderr_tail(outcome))
                .unwrap_or_default();
            let reason = if tail.is_empty() {
                reason
            } else {
                format!("{reason}; stderr: {tail}")
            };
            return Err(HarnessError::NotReady { service, reason });
        }
        info!(servers = servers.len(), "all servers ready");

        enter(RunPhase::ClientRunning);
        let client = match self.start_client(arena, bound, routine, driver).await {
            Ok(client) => client,
            Err(err) => {
                kill_all(servers).await;
                return Err(err);
            }
        };
        let client = client.finish(self.config.timing.client_timeout).await;
        if client.forced {
            warn!(
                timeout_ms = self.config.timing.client_timeout.as_millis() as u64,
                "driver exceeded its time limit"
            );
        }

        let (summary, summary_error) = match ClientSummary::read_from(&arena.summary_path()) {
            Ok(summary) => (Some(summary), None),
            Err(err) => {
                warn!(error = %err, "driver summary unavailable");
                (None, Some(err.to_string()))
            }
        };

        enter(RunPhase::ServersDraining);
        let mut fallback = Vec::new();
        for handle in servers.iter_mut() {
            let (acknowledged, attempted) = summary
                .as_ref()
                .map(|summary| {
                    (
                        summary.acknowledged(handle.name()),
                        summary
                            .terminations
                            .iter()
                            .any(|outcome| outcome.service == handle.name()),
                    )
                })
                .unwrap_or((false, false));
            if acknowledged || (attempted && !handle.is_running()) {
                continue;
            }
            let Some(port) = handle.port() else { continue };
            info!(service = %handle.name(), port, "terminating service the driver did not stop");
            fallback.push(
                terminate_endpoint(
                    handle.name(),
                    &self.config.ports.connect_host,
                    port,
                    self.config.timing.terminate_timeout,
                    TerminateOrigin::Orchestrator,
                )
                .await,
            );
        }

        let grace = self.config.timing.shutdown_grace;
        let servers = join_all(servers.into_iter().map(|handle| handle.finish(grace)))
            .await
            .into_iter()
            .map(|outcome| (outcome.name.clone(), outcome))
            .collect();

        Ok(Execution {
            servers,
            client,
            summary,
            summary_error,
            fallback,
        })
    }

    async fn start_server(
        &self,
        arena: &mut RunArena,
        service: &BoundService,
        worker: &Path,
    ) -> Result<ProcessHandle, HarnessError> {
        let plan = ServerPlan::new(
            service.name.clone(),
            service.implementation.clone(),
            service.port,
            &self.config,
        );
        let path = arena.server_plan_path(&service.name);
        let path = arena.write_toml(path, &plan).await?;
        let handle = ProcessHandle::spawn(
            service.name.clone(),
            Some(service.port),
            worker,
            [OsString::from("--plan"), path.into_os_string()],
            Some(format!("{READY_BANNER_PREFIX}{}", service.port)),
        )?;
        info!(service = %service.name, implementation = %service.implementation, port = service.port, "server spawned");
        Ok(handle)
    }

    async fn start_client(
        &self,
        arena: &mut RunArena,
        bound: &[BoundService],
        routine: Option<&str>,
        driver: &Path,
    ) -> Result<ProcessHandle, HarnessError> {
        let targets = bound
            .iter()
            .map(|service| ClientTarget {
                name: service.name.clone(),
                implementation: service.implementation.clone(),
                port: service.port,
            })
            .collect();
        let summary_path = arena.summary_path();
        arena.track(summary_path.clone());
        let plan = ClientPlan::new(
            targets,
            routine.map(str::to_owned),
            summary_path,
            &self.config,
        );
        let path = arena.client_plan_path();
        let path = arena.write_toml(path, &plan).await?;
        let handle = ProcessHandle::spawn(
            CLIENT_PROCESS,
            None,
            driver,
            [OsString::from("--plan"), path.into_os_string()],
            None,
        )?;
        info!(routine = routine.unwrap_or("-"), "driver spawned");
        Ok(handle)
    }
}

async fn kill_all(servers: Vec<ProcessHandle>) -> IndexMap<String, ProcessOutcome> {
    join_all(servers.into_iter().map(ProcessHandle::kill))
        .await
        .into_iter()
        .map(|outcome| (outcome.name.clone(), outcome))
        .collect()
}

fn stderr_tail(outcome: &ProcessOutcome) -> String {
    let skip = outcome.stderr.len().saturating_sub(STDERR_TAIL);
    outcome.stderr[skip..].join(" | ")
}

fn locate(resolved: anyhow::Result<PathBuf>, binary: &str) -> Result<PathBuf, HarnessError> {
    resolved.map_err(|err| HarnessError::Spawn {
        process: binary.to_owned(),
        source: io::Error::new(io::ErrorKind::NotFound, format!("{err:#}")),
    })
}
