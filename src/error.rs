use std::path::PathBuf;

use thiserror::Error;

/// How a `terraform init` failure should be presented to the operator.
///
/// Backend and provider failures usually need manual intervention, so they
/// get a more actionable message than a generic init error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitFailureKind {
    Backend,
    Provider,
    Generic,
}

impl std::fmt::Display for InitFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend => write!(f, "backend"),
            Self::Provider => write!(f, "provider"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DriftError {
    #[error("another instance is already running (lock file: {path})")]
    LockContention { path: PathBuf },

    #[error("terraform is not installed or not in PATH")]
    ToolUnavailable,

    #[error("project path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("terraform init failed ({kind}): {output}")]
    InitFailure {
        kind: InitFailureKind,
        output: String,
    },

    #[error("terraform plan failed with exit code {code}: {output}")]
    CompareFailure { code: i32, output: String },

    #[error("unknown credential profile: {0}")]
    UnknownProfile(String),

    #[error("unknown alert channel: {0}")]
    UnknownChannel(String),

    #[error("channel '{channel}' has unsupported kind '{kind}'")]
    UnsupportedChannel { channel: String, kind: String },

    #[error("channel '{channel}' is missing required config key '{key}'")]
    ChannelConfig { channel: String, key: String },

    #[error("delivery failed after {attempts} attempts: {source}")]
    DeliveryFailed {
        attempts: u32,
        #[source]
        source: Box<DriftError>,
    },

    #[error("webhook returned HTTP {0}")]
    HttpStatus(u16),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("drift detection completed with errors")]
    CompletedWithErrors,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DriftError>;
