use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;

use crate::error::{DriftError, Result};

fn default_true() -> bool {
    true
}

/// Root configuration: the projects to watch, the credential profiles they
/// reference, and the alert channels drift is reported to. Loaded once per
/// invocation and immutable for the duration of the run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub projects: Vec<Project>,
    pub credential_profiles: Vec<CredentialProfile>,
    pub alert_channels: Vec<AlertChannel>,
}

/// A Terraform project to check for drift.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub credential_profile: Option<String>,
    #[serde(default)]
    pub alert_channels: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Aws,
    Azure,
    Gcp,
    /// Unrecognized providers: credential keys pass through verbatim.
    #[serde(other)]
    Other,
}

/// Cloud credentials exposed to terraform as environment variables for the
/// duration of one project check.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialProfile {
    pub name: String,
    pub provider: ProviderKind,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Slack,
    Teams,
    Email,
    #[serde(other)]
    Other,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Teams => "teams",
            Self::Email => "email",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertChannel {
    pub name: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl WatcherConfig {
    /// Load a YAML config file, expanding `$VAR`/`${VAR}` references in the
    /// raw text before parsing and resolving relative project paths against
    /// the config file's directory.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).await.map_err(|e| {
            DriftError::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;

        let mut config: WatcherConfig = serde_yaml_bw::from_str(&expand_env(&raw))?;

        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }

        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for project in &mut self.projects {
            if project.path.is_relative() {
                project.path = base.join(&project.path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.projects.is_empty() {
            errors.push("no projects defined in configuration".to_string());
        }

        let mut profiles = HashSet::new();
        for profile in &self.credential_profiles {
            if profile.name.is_empty() {
                errors.push("credential profile with empty name".to_string());
            }
            profiles.insert(profile.name.as_str());
        }

        let mut channels = HashSet::new();
        for channel in &self.alert_channels {
            if channel.name.is_empty() {
                errors.push("alert channel with empty name".to_string());
            }
            channels.insert(channel.name.as_str());
        }

        let mut seen = HashSet::new();
        for project in &self.projects {
            if project.name.is_empty() {
                errors.push("project with empty name".to_string());
                continue;
            }
            if !seen.insert(project.name.as_str()) {
                errors.push(format!("duplicate project name: {}", project.name));
            }
            if project.path.as_os_str().is_empty() {
                errors.push(format!("project {} has no path specified", project.name));
            } else if !project.path.exists() {
                errors.push(format!(
                    "project {} path not found: {}",
                    project.name,
                    project.path.display()
                ));
            }
            if let Some(profile) = &project.credential_profile
                && !profiles.contains(profile.as_str())
            {
                errors.push(format!(
                    "project {} references unknown credential profile: {}",
                    project.name, profile
                ));
            }
            for channel in &project.alert_channels {
                if !channels.contains(channel.as_str()) {
                    errors.push(format!(
                        "project {} references unknown alert channel: {}",
                        project.name, channel
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DriftError::Config(errors.join("; ")))
        }
    }

    pub fn credential_profile(&self, name: &str) -> Option<&CredentialProfile> {
        self.credential_profiles.iter().find(|p| p.name == name)
    }

    pub fn alert_channel(&self, name: &str) -> Option<&AlertChannel> {
        self.alert_channels.iter().find(|c| c.name == name)
    }
}

/// Expand `$VAR` and `${VAR}` references from the process environment.
/// Unset variables expand to the empty string.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + 1..];

        if let Some(braced) = rest.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    out.push_str(&std::env::var(&braced[..end]).unwrap_or_default());
                    rest = &braced[end + 1..];
                }
                None => out.push('$'),
            }
        } else {
            let end = rest
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            if end == 0 {
                out.push('$');
            } else {
                out.push_str(&std::env::var(&rest[..end]).unwrap_or_default());
                rest = &rest[end..];
            }
        }
    }

    out.push_str(rest);
    out
}
