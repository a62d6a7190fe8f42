//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Per-run artifact directory and its cleanup."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::HarnessError;

const SERVER_PLAN_DIR: &str = "servers";
const CLIENT_PLAN_FILE: &str = "client.toml";
const SUMMARY_FILE: &str = "summary.json";

/// Directory holding every file generated for one run.
///
/// Files are tracked before they are written so a partial write is still
/// cleaned up.
#[derive(Debug)]
pub struct RunArena {
    run_id: Uuid,
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl RunArena {
    /// Create `<root>/run-<uuid>` and its `servers/` plan directory.
    pub async fn create(root: &Path) -> Result<Self, HarnessError> {
        let run_id = Uuid::new_v4();
        let dir = root.join(format!("run-{run_id}"));
        let servers = dir.join(SERVER_PLAN_DIR);
        tokio::fs::create_dir_all(&servers)
            .await
            .map_err(|source| HarnessError::Artifact {
                path: servers,
                source,
            })?;
        debug!(%run_id, dir = %dir.display(), "run arena created");
        Ok(Self {
            run_id,
            dir,
            files: Vec::new(),
        })
    }

    /// Identifier shared by the directory name and the run report.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Arena directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Plan file for the server named `service`, kept apart from the driver's files.
    pub fn server_plan_path(&self, service: &str) -> PathBuf {
        self.dir.join(SERVER_PLAN_DIR).join(format!("{service}.toml"))
    }

    /// Plan file for the driver.
    pub fn client_plan_path(&self) -> PathBuf {
        self.dir.join(CLIENT_PLAN_FILE)
    }

    /// Where the driver writes its summary.
    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    /// Register a file another process will create.
    pub fn track(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    /// Serialize `value` as TOML into `path`.
    pub async fn write_toml<T: Serialize>(
        &mut self,
        path: PathBuf,
        value: &T,
    ) -> Result<PathBuf, HarnessError> {
        self.track(path.clone());
        let body = toml::to_string_pretty(value).map_err(|err| HarnessError::Artifact {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        })?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| HarnessError::Artifact {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Remove every tracked file and the directory itself.
    ///
    /// Missing files are fine. Other failures are returned as messages.
    pub async fn cleanup(self) -> Vec<String> {
        let mut errors = Vec::new();
        for path in &self.files {
            if let Err(err) = tokio::fs::remove_file(path).await {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "failed to remove artifact");
                    errors.push(format!("{}: {err}", path.display()));
                }
            }
        }
        if let Err(err) = tokio::fs::remove_dir_all(&self.dir).await {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %err, "failed to remove run directory");
                errors.push(format!("{}: {err}", self.dir.display()));
            }
        }
        debug!(run_id = %self.run_id, errors = errors.len(), "run arena cleaned up");
        errors
    }
}
