//! Cross-process run lock backed by a filesystem marker.
//!
//! The marker's existence is the concurrency signal; its content (pid and
//! acquisition time) is diagnostic only. A marker older than the staleness
//! threshold is treated as abandoned and reclaimed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{DriftError, Result};

const LOCK_FILE_NAME: &str = "driftwatch.lock";

/// Locks held longer than this are assumed to come from a crashed or
/// interrupted run and may be reclaimed.
const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

pub struct RunLock {
    path: PathBuf,
    stale_after: Duration,
}

impl RunLock {
    /// A lock rooted in `dir`, defaulting to the process temp directory.
    pub fn new(dir: Option<&Path>) -> Self {
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        Self {
            path: dir.join(LOCK_FILE_NAME),
            stale_after: STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the run slot via exclusive file creation.
    ///
    /// If the marker already exists but is older than the staleness
    /// threshold it is removed and creation retried once; a fresh marker
    /// fails with `LockContention`. Any other IO failure is fatal.
    pub fn acquire(&self) -> Result<RunLockHandle> {
        match self.try_create() {
            Ok(handle) => Ok(handle),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if self.is_stale()? {
                    info!(path = %self.path.display(), "Reclaiming stale lock");
                    match std::fs::remove_file(&self.path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                    self.try_create().map_err(|e| self.contention_or_io(e))
                } else {
                    Err(DriftError::LockContention {
                        path: self.path.clone(),
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of whatever marker exists, for `--force` runs.
    /// Failures are logged, not propagated.
    pub fn force_release(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Force-released existing lock"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %self.path.display(), "Failed to force release lock"),
        }
    }

    fn try_create(&self) -> std::io::Result<RunLockHandle> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;

        let pid = std::process::id();
        // Diagnostic content only; existence is what matters.
        writeln!(file, "pid: {}", pid)?;
        writeln!(file, "acquired: {}", Utc::now().to_rfc3339())?;

        debug!(pid, path = %self.path.display(), "Lock acquired");
        Ok(RunLockHandle {
            path: self.path.clone(),
            pid,
        })
    }

    fn is_stale(&self) -> Result<bool> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => {
                let age = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.elapsed().ok())
                    .unwrap_or(Duration::ZERO);
                Ok(age > self.stale_after)
            }
            // Holder released between the failed create and the stat:
            // the slot is free again.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn contention_or_io(&self, e: std::io::Error) -> DriftError {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            DriftError::LockContention {
                path: self.path.clone(),
            }
        } else {
            e.into()
        }
    }
}

/// Exclusive ownership of the process-wide run slot. Dropping the handle
/// deletes the marker; a missing marker is not an error.
#[derive(Debug)]
pub struct RunLockHandle {
    path: PathBuf,
    pid: u32,
}

impl RunLockHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for RunLockHandle {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Lock released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                if !std::thread::panicking() {
                    warn!(error = %e, path = %self.path.display(), "Failed to release lock");
                } else {
                    eprintln!("[driftwatch] failed to release lock {}: {}", self.path.display(), e);
                }
            }
        }
    }
}
