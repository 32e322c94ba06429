//! API key resolution.
//!
//! Order: backend-specific environment variable, then the config file value
//! (which discovery has already flagged with a plaintext warning).

use crate::Backend;

/// An API key and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    pub value: String,
    pub source: SecretSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    EnvVar(String),
    /// Plaintext in a config file.
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve an API key from the process environment or the config value.
pub fn resolve_api_key(backend: &Backend, config_value: Option<&str>) -> Option<ResolvedSecret> {
    resolve_api_key_with(backend, config_value, |var| std::env::var(var).ok())
}

/// Resolution with an injectable environment lookup.
pub fn resolve_api_key_with(
    backend: &Backend,
    config_value: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<ResolvedSecret> {
    let env_var = backend.env_var();
    if let Some(value) = env(env_var).filter(|v| !v.is_empty()) {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var.to_string()),
        });
    }

    config_value
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}
