//! Team Workspace (C7): a scratch directory created on team-mode entry
//! and torn down on exit, holding one JSON file per task result.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

/// A per-team-run directory with `tasks/` and `artifacts/`
/// subdirectories. Dropping this struct does not remove anything on
/// disk — call [`TeamWorkspace::teardown`] explicitly so cleanup
/// failures can be logged instead of panicking in a destructor.
pub struct TeamWorkspace {
    pub root: PathBuf,
    pub tasks_dir: PathBuf,
    pub artifacts_dir: PathBuf,
}

#[derive(Serialize)]
struct TaskResultRecord<'a> {
    id: &'a str,
    status: &'a str,
    output: &'a str,
    timestamp: u64,
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Turn an arbitrary team or task name into a filesystem-safe
/// component: ASCII alphanumerics, `-`, and `_` survive, everything
/// else becomes `-`.
pub fn sanitize_id(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "task".to_string()
    } else {
        cleaned
    }
}

impl TeamWorkspace {
    /// Create `<tmp_dir>/pi-<safe-team-name>-<epoch>-<suffix>/` with
    /// `tasks/` and `artifacts/` underneath.
    pub fn create(tmp_dir: &Path, team_name: &str) -> Result<Self> {
        let safe_name = sanitize_id(team_name);
        let root = tmp_dir.join(format!("pi-{safe_name}-{}-{:x}", epoch_seconds(), std::process::id()));
        let tasks_dir = root.join("tasks");
        let artifacts_dir = root.join("artifacts");
        fs::create_dir_all(&tasks_dir)
            .with_context(|| format!("creating workspace tasks dir at {}", tasks_dir.display()))?;
        fs::create_dir_all(&artifacts_dir)
            .with_context(|| format!("creating workspace artifacts dir at {}", artifacts_dir.display()))?;
        Ok(Self {
            root,
            tasks_dir,
            artifacts_dir,
        })
    }

    /// Write `tasks/<sanitized-id>.json` with `{id, status, output, timestamp}`.
    pub fn write_task_result(&self, id: &str, output: &str, status: &str) -> Result<()> {
        let record = TaskResultRecord {
            id,
            status,
            output,
            timestamp: epoch_seconds(),
        };
        let path = self.tasks_dir.join(format!("{}.json", sanitize_id(id)));
        let body = serde_json::to_vec_pretty(&record).context("serializing task result record")?;
        fs::write(&path, body).with_context(|| format!("writing task result to {}", path.display()))
    }

    /// Remove the entire workspace root. Errors are logged and
    /// swallowed: a team run's result must not fail because cleanup
    /// of its own scratch space didn't succeed.
    pub fn teardown(self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            tracing::warn!(root = %self.root.display(), error = %e, "failed to tear down team workspace");
        }
    }
}
