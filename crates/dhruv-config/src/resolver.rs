//! LLM config resolution: turns a [`ModelRole`] into a concrete, validated
//! backend configuration with its API key looked up.

use crate::secrets::{self, SecretSource};
use crate::{Backend, ConfigError, DhruvConfig, LlmConfig, ModelRole, Result};

/// A fully resolved LLM configuration ready to construct a backend.
#[derive(Debug, Clone)]
pub struct ResolvedLlm {
    pub backend: Backend,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_key_source: Option<SecretSource>,
    pub api_version: Option<String>,
    pub resolved_from: ResolvedFrom,
    pub retry_max: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

/// Which config section supplied the settings, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// A role-specific `[llm.<profile>]` section.
    Profile(String),
    /// The bare `[llm]` section.
    GlobalDefault,
}

impl std::fmt::Display for ResolvedFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedFrom::Profile(name) => write!(f, "[llm.{}]", name),
            ResolvedFrom::GlobalDefault => write!(f, "[llm] (global default)"),
        }
    }
}

/// Resolve the LLM for a model role.
///
/// Fails when no section applies, when `backend`/`model` are missing, or when a
/// backend that needs a key has none in the environment or config.
pub fn resolve_for_role(config: &DhruvConfig, role: ModelRole) -> Result<ResolvedLlm> {
    resolve_with_env(config, role, |var| std::env::var(var).ok())
}

pub(crate) fn resolve_with_env(
    config: &DhruvConfig,
    role: ModelRole,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedLlm> {
    let (llm, resolved_from) = select(config, role)?;
    let context = format!("LLM config (resolved via {})", resolved_from);

    let backend = llm.backend.ok_or_else(|| ConfigError::Incomplete {
        field: "backend".to_string(),
        context: context.clone(),
    })?;
    let model = llm.model.clone().ok_or_else(|| ConfigError::Incomplete {
        field: "model".to_string(),
        context: context.clone(),
    })?;
    if backend == Backend::Azure && llm.base_url.is_none() {
        return Err(ConfigError::Incomplete {
            field: "base_url".to_string(),
            context,
        });
    }

    let secret = secrets::resolve_api_key_with(&backend, llm.api_key.as_deref(), env);
    if secret.is_none() && backend.requires_api_key() {
        return Err(ConfigError::MissingApiKey {
            backend: backend.to_string(),
            env_var: backend.env_var().to_string(),
        });
    }
    let (api_key, api_key_source) = match secret {
        Some(s) => (Some(s.value), Some(s.source)),
        None => (None, None),
    };

    Ok(ResolvedLlm {
        backend,
        model,
        base_url: llm.base_url.clone(),
        api_key,
        api_key_source,
        api_version: llm.api_version.clone(),
        resolved_from,
        retry_max: llm.retry_max,
        retry_backoff_ms: llm.retry_backoff_ms,
    })
}

fn select(config: &DhruvConfig, role: ModelRole) -> Result<(&LlmConfig, ResolvedFrom)> {
    let name = role.profile_name();
    if let Some(llm) = config.llm_profiles.get(name) {
        return Ok((llm, ResolvedFrom::Profile(name.to_string())));
    }
    let llm = config.llm_for(role)?;
    Ok((llm, ResolvedFrom::GlobalDefault))
}
