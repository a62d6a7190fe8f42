//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Child process handles: output capture, readiness, bounded waits."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, warn};

use crate::error::HarnessError;

/// Captured lines kept per stream.
const MAX_CAPTURED_LINES: usize = 2_000;

/// Bound on collecting output after the process exited.
const OUTPUT_DRAIN: Duration = Duration::from_secs(2);

/// What a finished process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// Service name, or `client` for the driver.
    pub name: String,
    /// Port of a server process.
    #[serde(default)]
    pub port: Option<u16>,
    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Whether the harness had to kill the process.
    pub forced: bool,
    /// Captured stdout lines.
    pub stdout: Vec<String>,
    /// Captured stderr lines.
    pub stderr: Vec<String>,
}

impl ProcessOutcome {
    /// Whether any stdout line equals `line`.
    pub fn printed(&self, line: &str) -> bool {
        self.stdout.iter().any(|captured| captured == line)
    }
}

/// A spawned child with its output readers.
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    port: Option<u16>,
    child: Child,
    stdout: JoinHandle<Vec<String>>,
    stderr: JoinHandle<Vec<String>>,
    ready: Option<oneshot::Receiver<()>>,
}

impl ProcessHandle {
    /// Spawn `program args...` with piped output, killed if the handle is dropped.
    ///
    /// With `banner` set, the first stdout line equal to it resolves
    /// [`ProcessHandle::wait_ready`].
    pub fn spawn<I, S>(
        name: impl Into<String>,
        port: Option<u16>,
        program: &std::path::Path,
        args: I,
        banner: Option<String>,
    ) -> Result<Self, HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let name = name.into();
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| HarnessError::Spawn {
            process: format!("{name} ({})", program.display()),
            source,
        })?;
        debug!(process = %name, pid = ?child.id(), program = %program.display(), "process spawned");

        let (ready_tx, ready_rx) = oneshot::channel();
        let (ready_tx, ready) = match banner {
            Some(banner) => (Some((banner, ready_tx)), Some(ready_rx)),
            None => (None, None),
        };
        let stdout = match child.stdout.take() {
            Some(pipe) => tokio::spawn(collect_lines(
                BufReader::new(pipe),
                name.clone(),
                "stdout",
                ready_tx,
            )),
            None => tokio::spawn(async { Vec::new() }),
        };
        let stderr = match child.stderr.take() {
            Some(pipe) => tokio::spawn(collect_lines(
                BufReader::new(pipe),
                name.clone(),
                "stderr",
                None,
            )),
            None => tokio::spawn(async { Vec::new() }),
        };

        Ok(Self {
            name,
            port,
            child,
            stdout,
            stderr,
            ready,
        })
    }

    /// Process label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port of a server process.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Whether the child has not exited yet.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait for the readiness banner until `deadline`.
    ///
    /// Fails when the deadline passes or stdout closes first.
    pub async fn wait_ready(&mut self, deadline: Instant) -> Result<(), String> {
        let Some(ready) = self.ready.as_mut() else {
            return Ok(());
        };
        match timeout_at(deadline, ready).await {
            Ok(Ok(())) => {
                self.ready = None;
                Ok(())
            }
            Ok(Err(_)) => Err("stdout closed before the readiness banner".to_owned()),
            Err(_) => Err("readiness banner not seen before the deadline".to_owned()),
        }
    }

    /// Wait up to `grace` for the process to exit, then kill it.
    pub async fn finish(mut self, grace: Duration) -> ProcessOutcome {
        let (status, forced) = match timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => (Some(status), false),
            Ok(Err(err)) => {
                warn!(process = %self.name, error = %err, "failed to await process");
                (self.force().await, true)
            }
            Err(_) => {
                warn!(process = %self.name, grace_ms = grace.as_millis() as u64, "process outlived its grace period; killing");
                (self.force().await, true)
            }
        };
        self.into_outcome(status, forced).await
    }

    /// Kill the process immediately and reap it.
    pub async fn kill(mut self) -> ProcessOutcome {
        let status = match self.child.try_wait() {
            Ok(Some(status)) => Some(status),
            _ => self.force().await,
        };
        self.into_outcome(status, true).await
    }

    async fn force(&mut self) -> Option<ExitStatus> {
        if let Err(err) = self.child.start_kill() {
            warn!(process = %self.name, error = %err, "failed to kill process");
        }
        match self.child.wait().await {
            Ok(status) => Some(status),
            Err(err) => {
                warn!(process = %self.name, error = %err, "failed to reap process");
                None
            }
        }
    }

    async fn into_outcome(self, status: Option<ExitStatus>, forced: bool) -> ProcessOutcome {
        let stdout = drain(self.stdout).await;
        let stderr = drain(self.stderr).await;
        let exit_code = status.and_then(|status| status.code());
        let success = status.map(|status| status.success()).unwrap_or(false);
        debug!(process = %self.name, ?exit_code, success, forced, "process finished");
        ProcessOutcome {
            name: self.name,
            port: self.port,
            exit_code,
            success,
            forced,
            stdout,
            stderr,
        }
    }
}

async fn drain(reader: JoinHandle<Vec<String>>) -> Vec<String> {
    let abort = reader.abort_handle();
    match timeout(OUTPUT_DRAIN, reader).await {
        Ok(Ok(lines)) => lines,
        Ok(Err(_)) => Vec::new(),
        Err(_) => {
            abort.abort();
            Vec::new()
        }
    }
}

async fn collect_lines<R>(
    mut reader: BufReader<R>,
    process: String,
    stream: &'static str,
    mut banner: Option<(String, oneshot::Sender<()>)>,
) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                debug!(target: "rig::child", %process, stream, message = trimmed);
                if banner.as_ref().is_some_and(|(expected, _)| expected == trimmed) {
                    if let Some((_, ready)) = banner.take() {
                        let _ = ready.send(());
                    }
                }
                if lines.len() < MAX_CAPTURED_LINES {
                    lines.push(trimmed.to_owned());
                }
            }
            Err(err) => {
                warn!(%process, stream, error = %err, "failed to read child output");
                break;
            }
        }
    }
    lines
}
