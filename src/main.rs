use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use driftwatch::cli::{Cli, Commands, Display};
use driftwatch::config::WatcherConfig;
use driftwatch::engine::{DriftEngine, RunOptions, VERBOSE_ENV};
use driftwatch::error::{DriftError, Result};

/// Exit status when drift was found and `--fail-on-drift` was requested.
const EXIT_DRIFT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("driftwatch=debug")
    } else {
        EnvFilter::new("driftwatch=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let display = Display::new();

    match cli.command {
        Commands::Run {
            fail_on_drift,
            force,
        } => cmd_run(&display, &cli.config, cli.verbose, fail_on_drift, force).await,
        Commands::Validate => cmd_validate(&display, &cli.config).await,
    }
}

async fn cmd_run(
    display: &Display,
    config_path: &Path,
    verbose: bool,
    fail_on_drift: bool,
    force: bool,
) -> Result<ExitCode> {
    if verbose {
        // SAFETY: set once at startup, before the engine spawns any task.
        unsafe { std::env::set_var(VERBOSE_ENV, "true") };
    }

    tracing::info!(config = %config_path.display(), "Loading configuration");
    let config = WatcherConfig::load(config_path).await?;
    tracing::info!(
        projects = config.projects.len(),
        credential_profiles = config.credential_profiles.len(),
        alert_channels = config.alert_channels.len(),
        "Configuration loaded"
    );

    let engine = DriftEngine::new(config);
    let report = engine.run(&RunOptions { force_lock: force }).await?;

    if report.had_errors {
        display.print_error(&DriftError::CompletedWithErrors.to_string());
        return Ok(ExitCode::FAILURE);
    }

    if report.drift_detected {
        display.print_warning("Drift detected in at least one project.");
        if fail_on_drift {
            return Ok(ExitCode::from(EXIT_DRIFT));
        }
    } else {
        display.print_success("No drift detected.");
    }

    Ok(ExitCode::SUCCESS)
}

async fn cmd_validate(display: &Display, config_path: &Path) -> Result<ExitCode> {
    let config = WatcherConfig::load(config_path).await?;

    display.print_success(&format!(
        "Configuration is valid: {} projects, {} credential profiles, {} alert channels",
        config.projects.len(),
        config.credential_profiles.len(),
        config.alert_channels.len()
    ));

    Ok(ExitCode::SUCCESS)
}
