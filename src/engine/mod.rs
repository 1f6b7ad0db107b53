//! Orchestration engine: serializes runs behind the run lock and drives
//! each enabled project through credential scoping, the terraform check,
//! and alert dispatch, aggregating the outcome.

mod signal;

use tracing::{error, info, warn};

use crate::config::{Project, WatcherConfig};
use crate::credentials::CredentialScope;
use crate::error::{DriftError, Result};
use crate::lock::RunLock;
use crate::notify::{AlertDispatcher, DEFAULT_MAX_RETRIES};
use crate::terraform::{DriftCheck, TerraformRunner, relevant_lines};

pub use signal::{EXIT_INTERRUPTED, ShutdownListener};

/// Consulted once per drift event to choose full-vs-summarized console
/// output. Set by the CLI's `--verbose` flag.
pub const VERBOSE_ENV: &str = "DRIFTWATCH_VERBOSE";

const PREVIEW_LINES: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Delete any existing lock marker before acquiring.
    pub force_lock: bool,
}

/// Aggregate outcome of one invocation. Drift and errors are separate
/// signals so callers can react to either independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub drift_detected: bool,
    pub had_errors: bool,
}

pub struct DriftEngine {
    config: WatcherConfig,
    lock: RunLock,
    runner: TerraformRunner,
    dispatcher: AlertDispatcher,
    max_retries: u32,
}

impl DriftEngine {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            lock: RunLock::new(None),
            runner: TerraformRunner::new(),
            dispatcher: AlertDispatcher::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_lock(mut self, lock: RunLock) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_runner(mut self, runner: TerraformRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: AlertDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Run drift detection across all configured projects.
    ///
    /// Lock contention and a missing terraform binary are fatal and abort
    /// before any project is touched. Per-project failures are recorded in
    /// the report and do not stop later projects.
    pub async fn run(&self, opts: &RunOptions) -> Result<RunReport> {
        if opts.force_lock {
            self.lock.force_release();
        }

        // Held for the rest of the function; Drop releases it on every
        // normal exit path, including early error returns.
        let _lock = self.lock.acquire()?;

        let listener = ShutdownListener::arm();

        self.runner.ensure_available().await?;

        info!("Starting drift detection");
        let mut report = RunReport::default();

        for project in &self.config.projects {
            if !project.enabled {
                info!(project = %project.name, "Skipping disabled project");
                continue;
            }

            info!(project = %project.name, "Checking for drift");
            self.check_project(project, &mut report).await;
        }

        listener.disarm().await;
        info!(
            drift_detected = report.drift_detected,
            had_errors = report.had_errors,
            "Drift detection completed"
        );
        Ok(report)
    }

    async fn check_project(&self, project: &Project, report: &mut RunReport) {
        // Guard drop clears the credential window whatever happens below.
        let _credentials = match &project.credential_profile {
            Some(name) => match self.config.credential_profile(name) {
                Some(profile) => Some(CredentialScope::apply(profile)),
                None => {
                    let e = DriftError::UnknownProfile(name.clone());
                    error!(project = %project.name, error = %e, "Cannot apply credentials");
                    report.had_errors = true;
                    return;
                }
            },
            None => None,
        };

        match self.runner.check_drift(&project.path).await {
            DriftCheck::Clean => {
                info!(project = %project.name, "No drift detected");
            }
            DriftCheck::Drifted { summary, raw } => {
                report.drift_detected = true;
                warn!(project = %project.name, "Drift detected, dispatching alerts");
                print_drift_detail(&project.name, &summary, &raw);
                self.dispatch_alerts(project, &summary, &raw, report).await;
            }
            DriftCheck::Failed(e) => {
                error!(project = %project.name, error = %e, "Drift check failed");
                report.had_errors = true;
            }
        }
    }

    async fn dispatch_alerts(
        &self,
        project: &Project,
        summary: &str,
        raw: &str,
        report: &mut RunReport,
    ) {
        let mut delivered = 0usize;

        for name in &project.alert_channels {
            let Some(channel) = self.config.alert_channel(name) else {
                let e = DriftError::UnknownChannel(name.clone());
                error!(project = %project.name, error = %e, "Cannot dispatch alert");
                report.had_errors = true;
                continue;
            };

            match self
                .dispatcher
                .send(channel, &project.name, summary, raw, self.max_retries)
                .await
            {
                Ok(()) => {
                    info!(project = %project.name, channel = %channel.name, "Alert sent");
                    delivered += 1;
                }
                Err(e) => {
                    error!(
                        project = %project.name,
                        channel = %channel.name,
                        error = %e,
                        "Failed to send alert"
                    );
                    report.had_errors = true;
                }
            }
        }

        if delivered == 0 && !project.alert_channels.is_empty() {
            warn!(project = %project.name, "Drift detected but no alerts were delivered");
        }
    }
}

/// Console detail for one drift event: always the summary, then either the
/// full plan output (verbose) or a short relevant-line preview.
fn print_drift_detail(project: &str, summary: &str, raw: &str) {
    println!();
    println!("Drift summary for '{}':", project);
    for line in summary.lines() {
        println!("  {}", line);
    }

    let verbose = std::env::var(VERBOSE_ENV).map(|v| v == "true").unwrap_or(false);

    if verbose {
        println!();
        println!("Full terraform plan output:");
        println!("{}", "=".repeat(80));
        println!("{}", raw);
        println!("{}", "=".repeat(80));
    } else {
        let preview = relevant_lines(raw, PREVIEW_LINES);
        if !preview.is_empty() {
            println!();
            println!("Drift details (first {} relevant lines):", preview.len());
            for line in &preview {
                println!("  {}", line);
            }
            println!("  ... (use --verbose or run terraform plan manually for full details)");
        }
    }
}
