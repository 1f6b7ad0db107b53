use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{DriftError, InitFailureKind, Result};

use super::summary::extract_plan_summary;

/// Tri-state reading of terraform's `-detailed-exitcode` protocol.
/// Exit code 2 means drift, and is deliberately not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Clean,
    Drifted,
    Error,
}

impl Classification {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => Self::Clean,
            2 => Self::Drifted,
            _ => Self::Error,
        }
    }
}

/// Outcome of one project's drift check. Closed sum so every call site
/// handles all three cases explicitly.
#[derive(Debug)]
pub enum DriftCheck {
    Clean,
    Drifted { summary: String, raw: String },
    Failed(DriftError),
}

pub struct TerraformRunner {
    bin: PathBuf,
}

impl Default for TerraformRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TerraformRunner {
    pub fn new() -> Self {
        Self {
            bin: PathBuf::from("terraform"),
        }
    }

    /// Point the runner at a different binary (stub scripts in tests).
    pub fn with_bin(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Verify the terraform binary is reachable. Checked once per run,
    /// before any project is touched.
    pub async fn ensure_available(&self) -> Result<()> {
        let available = Command::new(&self.bin)
            .arg("version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false);

        if available {
            Ok(())
        } else {
            Err(DriftError::ToolUnavailable)
        }
    }

    /// Run `init` then `plan -detailed-exitcode` against a project
    /// directory and classify the result.
    pub async fn check_drift(&self, dir: &Path) -> DriftCheck {
        if !dir.exists() {
            return DriftCheck::Failed(DriftError::PathNotFound(dir.to_path_buf()));
        }

        // A lock file left by a prior failed run blocks init.
        remove_artifact(&dir.join(".terraform.lock.hcl")).await;

        if let Err(e) = self.run_init(dir).await {
            cleanup_lock_artifacts(dir).await;
            return DriftCheck::Failed(e);
        }

        let (raw, code) = match self.run_plan(dir).await {
            Ok(r) => r,
            Err(e) => {
                cleanup_lock_artifacts(dir).await;
                return DriftCheck::Failed(e);
            }
        };

        match Classification::from_exit_code(code) {
            Classification::Clean => DriftCheck::Clean,
            // Artifacts are intentionally left in place after a successful
            // drift-positive plan; only failure paths clean up.
            Classification::Drifted => DriftCheck::Drifted {
                summary: extract_plan_summary(&raw),
                raw,
            },
            Classification::Error => {
                cleanup_lock_artifacts(dir).await;
                DriftCheck::Failed(DriftError::CompareFailure { code, output: raw })
            }
        }
    }

    async fn run_init(&self, dir: &Path) -> Result<String> {
        let output = self
            .run(dir, &["init", "-input=false", "-no-color", "-upgrade=false"])
            .await?;
        let combined = combined_output(&output);

        if output.status.success() {
            Ok(combined)
        } else {
            Err(DriftError::InitFailure {
                kind: classify_init_failure(&combined),
                output: combined,
            })
        }
    }

    async fn run_plan(&self, dir: &Path) -> Result<(String, i32)> {
        let output = self
            .run(dir, &["plan", "-input=false", "-no-color", "-detailed-exitcode"])
            .await?;
        // Treat signal-terminated processes (no exit code) as errors.
        let code = output.status.code().unwrap_or(-1);
        Ok((combined_output(&output), code))
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        debug!(bin = %self.bin.display(), args = ?args, dir = %dir.display(), "Running terraform command");

        let mut cmd = Command::new(&self.bin);
        cmd.args(args).current_dir(dir);
        if std::env::var("TF_IN_AUTOMATION").unwrap_or_default().is_empty() {
            cmd.env("TF_IN_AUTOMATION", "true");
        }

        Ok(cmd.output().await?)
    }
}

fn combined_output(output: &Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn classify_init_failure(output: &str) -> InitFailureKind {
    const BACKEND_MARKERS: [&str; 3] = [
        "Error loading backend config",
        "Backend initialization required",
        "Error configuring the backend",
    ];
    const PROVIDER_MARKERS: [&str; 2] =
        ["Could not load plugin", "Provider produced inconsistent"];

    if BACKEND_MARKERS.iter().any(|m| output.contains(m)) {
        InitFailureKind::Backend
    } else if PROVIDER_MARKERS.iter().any(|m| output.contains(m)) {
        InitFailureKind::Provider
    } else {
        InitFailureKind::Generic
    }
}

/// Remove terraform lock artifacts left behind by a failed init or plan.
/// Best effort: the run must not fail because cleanup did.
async fn cleanup_lock_artifacts(dir: &Path) {
    remove_artifact(&dir.join(".terraform.lock.hcl")).await;
    remove_artifact(&dir.join(".terraform.tfstate.lock.info")).await;
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed lock artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, path = %path.display(), "Failed to clean up lock artifact"),
    }
}
