use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "driftwatch")]
#[command(author, version, about = "Detects configuration drift in Terraform projects", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "config.yml")]
    pub config: PathBuf,

    /// Debug logging, and full terraform plan output for drifted projects
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run drift detection for all configured projects
    Run {
        /// Exit with code 2 if drift is detected
        #[arg(long)]
        fail_on_drift: bool,

        /// Force release any existing run lock and proceed
        #[arg(long)]
        force: bool,
    },

    /// Load and validate the configuration, then exit
    Validate,
}
