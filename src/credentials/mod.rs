//! Credential scope manager.
//!
//! Cloud credentials are handed to terraform through process environment
//! variables. Nothing else in the crate touches the environment for
//! credentials; `apply`/`clear` is the only surface, and `clear` is total:
//! it unsets every variable any provider could have set, regardless of
//! which profile (if any) was last applied.

use std::env;

use tracing::debug;

use crate::config::{CredentialProfile, ProviderKind};

const AWS_VARS: [(&str, &str); 4] = [
    ("access_key_id", "AWS_ACCESS_KEY_ID"),
    ("secret_access_key", "AWS_SECRET_ACCESS_KEY"),
    ("session_token", "AWS_SESSION_TOKEN"),
    ("region", "AWS_DEFAULT_REGION"),
];

const AZURE_VARS: [(&str, &str); 4] = [
    ("client_id", "ARM_CLIENT_ID"),
    ("client_secret", "ARM_CLIENT_SECRET"),
    ("subscription_id", "ARM_SUBSCRIPTION_ID"),
    ("tenant_id", "ARM_TENANT_ID"),
];

/// Every variable `clear` unsets. GCP has no logical-key mapping (its keys
/// pass through verbatim) but its conventional variables are cleared too.
const ALL_CREDENTIAL_VARS: [&str; 10] = [
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_DEFAULT_REGION",
    "ARM_CLIENT_ID",
    "ARM_CLIENT_SECRET",
    "ARM_SUBSCRIPTION_ID",
    "ARM_TENANT_ID",
    "GOOGLE_APPLICATION_CREDENTIALS",
    "GOOGLE_CLOUD_PROJECT",
];

fn env_var_for(provider: ProviderKind, key: &str) -> Option<&'static str> {
    let table: &[(&str, &str)] = match provider {
        ProviderKind::Aws => &AWS_VARS,
        ProviderKind::Azure => &AZURE_VARS,
        ProviderKind::Gcp | ProviderKind::Other => return None,
    };
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Guard for one project's credential window. Construction applies the
/// profile; drop clears everything, so the window cannot outlive the
/// project check even on error paths.
pub struct CredentialScope {
    _private: (),
}

impl CredentialScope {
    pub fn apply(profile: &CredentialProfile) -> Self {
        // Never let a previous profile's variables bleed into this one.
        clear();

        for (key, value) in &profile.config {
            let var = env_var_for(profile.provider, key).unwrap_or(key.as_str());
            // SAFETY: credential env mutation happens only here and in
            // `clear`, serialized by the engine's sequential project loop.
            unsafe { env::set_var(var, value) };
        }

        debug!(profile = %profile.name, "Applied credential profile");
        Self { _private: () }
    }
}

impl Drop for CredentialScope {
    fn drop(&mut self) {
        clear();
    }
}

/// Unset the full fixed credential variable set. Idempotent; safe to call
/// whether or not `apply` ever ran.
pub fn clear() {
    for var in ALL_CREDENTIAL_VARS {
        // SAFETY: see `CredentialScope::apply`.
        unsafe { env::remove_var(var) };
    }
}
