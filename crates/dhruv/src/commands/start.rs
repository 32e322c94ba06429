//! Start command - launches the Dhruv server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use clap::Args;

use dhruv_agent::{MemoryClassifier, MemoryExtractor, MemoryPipeline};
use dhruv_config::{Backend, DhruvConfig, LlmConfig, ModelRole, ResolvedLlm};
use dhruv_llm::{OpenAiBackend, OpenAiConfig, SharedBackend};
use dhruv_server::{AppState, ChatModels, Entitlements, ModelHandle, Server, ServerConfig};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// LLM backend for the default [llm] section: openai, azure, ollama or custom
    #[arg(long)]
    pub backend: Option<String>,

    /// Model for the default [llm] section (deployment name for Azure)
    #[arg(long)]
    pub model: Option<String>,

    /// API key (overrides env and config)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Custom base URL (overrides config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Disable the background memory pipeline
    #[arg(long)]
    pub no_memory: bool,

    /// Disable resumable streams
    #[arg(long)]
    pub no_resume: bool,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.load_config()?.config;
    apply_cli_overrides(&mut config, &args)?;

    // ── LLM backends ────────────────────────────────────────────────────

    let chat = model_for(&config, ModelRole::Chat, ctx)?;
    let models = ChatModels {
        reasoning: model_for(&config, ModelRole::Reasoning, ctx)?,
        title: model_for(&config, ModelRole::Title, ctx)?,
        chat,
    };

    // ── Storage ─────────────────────────────────────────────────────────

    let store = Arc::new(ctx.open_store()?);
    tracing::info!(path = %config.database_path().display(), "Opened database");

    // ── Server ──────────────────────────────────────────────────────────

    let server_config = server_config(&config, &args)?;
    let addr = server_config.bind_address;
    let mut state = AppState::new(store.clone(), models, server_config);

    if config.memory_or_default().enabled && !args.no_memory {
        let memory = model_for(&config, ModelRole::Memory, ctx)?;
        state = state.with_memory_pipeline(MemoryPipeline::new(
            MemoryClassifier::new(memory.backend.clone(), memory.model.clone()),
            MemoryExtractor::new(memory.backend, memory.model),
            store,
        ));
    } else {
        tracing::info!("Memory pipeline disabled");
    }

    if !ctx.json_output {
        println!("Dhruv listening on http://{}", addr);
    }

    Server::from_state(state).run().await?;
    Ok(())
}

/// Fold `--backend/--model/--api-key/--base-url` into the default `[llm]`
/// section. Role profiles keep precedence over it.
fn apply_cli_overrides(config: &mut DhruvConfig, args: &StartArgs) -> Result<()> {
    let overridden = args.backend.is_some()
        || args.model.is_some()
        || args.api_key.is_some()
        || args.base_url.is_some();
    if !overridden {
        return Ok(());
    }

    let llm = config.llm.get_or_insert_with(LlmConfig::default);
    if let Some(ref backend) = args.backend {
        llm.backend = Some(backend.parse::<Backend>()?);
    }
    if let Some(ref model) = args.model {
        llm.model = Some(model.clone());
    }
    if let Some(ref api_key) = args.api_key {
        llm.api_key = Some(api_key.clone());
    }
    if let Some(ref base_url) = args.base_url {
        llm.base_url = Some(base_url.clone());
    }
    Ok(())
}

fn server_config(config: &DhruvConfig, args: &StartArgs) -> Result<ServerConfig> {
    let server = config.server_or_default();
    let chat = config.chat_or_default();

    let bind = args.bind.as_deref().unwrap_or(&server.bind);
    let port = args.port.unwrap_or(server.port);
    let bind_address: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", bind, port))?;

    Ok(ServerConfig::new()
        .with_bind_address(bind_address)
        .with_cors_origins(server.cors_origins)
        .with_request_logging(server.request_logging)
        .with_resumable_streams(server.resumable_streams && !args.no_resume)
        .with_max_steps(chat.max_steps)
        .with_max_tokens(chat.max_tokens)
        .with_entitlements(Entitlements {
            guest_messages_per_day: chat.guest_messages_per_day,
            regular_messages_per_day: chat.regular_messages_per_day,
        }))
}

fn model_for(config: &DhruvConfig, role: ModelRole, ctx: &Context) -> Result<ModelHandle> {
    let resolved = dhruv_config::resolve_for_role(config, role)
        .with_context(|| format!("resolving the {} model", role.profile_name()))?;

    tracing::info!(
        role = role.profile_name(),
        backend = %resolved.backend,
        model = %resolved.model,
        from = %resolved.resolved_from,
        "Resolved LLM"
    );
    if ctx.verbose {
        eprintln!(
            "{:<9} {} / {} ({})",
            role.profile_name(),
            resolved.backend,
            resolved.model,
            resolved.resolved_from
        );
    }

    let backend = create_backend(&resolved)?;
    Ok(ModelHandle::new(backend, resolved.model))
}

/// Create an LLM backend from a resolved config.
fn create_backend(resolved: &ResolvedLlm) -> Result<SharedBackend> {
    let mut config = match resolved.backend {
        Backend::Openai => {
            let api_key = resolved.api_key.clone().ok_or_else(|| {
                anyhow!("OpenAI API key required. Set OPENAI_API_KEY or add api_key to config")
            })?;
            let mut config = OpenAiConfig::openai(api_key);
            if let Some(ref base_url) = resolved.base_url {
                config = config.with_base_url(base_url);
            }
            config
        }
        Backend::Azure => {
            let endpoint = resolved
                .base_url
                .as_deref()
                .ok_or_else(|| anyhow!("Azure backend requires base_url (the resource endpoint)"))?;
            let api_key = resolved.api_key.clone().ok_or_else(|| {
                anyhow!("Azure API key required. Set AZURE_OPENAI_API_KEY or add api_key to config")
            })?;
            let mut config = OpenAiConfig::azure(endpoint, &resolved.model, api_key);
            if let Some(ref version) = resolved.api_version {
                config = config.with_api_version(version);
            }
            config
        }
        Backend::Ollama => {
            let mut config = OpenAiConfig::ollama();
            if let Some(ref base_url) = resolved.base_url {
                config = config.with_base_url(base_url);
            }
            config
        }
        Backend::Custom => {
            let base_url = resolved.base_url.as_deref().ok_or_else(|| {
                anyhow!("Custom backend requires base_url in config or --base-url")
            })?;
            OpenAiConfig::custom(base_url, resolved.api_key.clone())
        }
    };

    config = config.with_model(&resolved.model);
    if let Some(retries) = resolved.retry_max {
        config = config.with_max_retries(retries);
    }
    if let Some(ms) = resolved.retry_backoff_ms {
        config = config.with_retry_backoff(Duration::from_millis(ms));
    }

    Ok(OpenAiBackend::shared(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhruv_config::ResolvedFrom;

    fn resolved(backend: Backend) -> ResolvedLlm {
        ResolvedLlm {
            backend,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: Some("sk-test".to_string()),
            api_key_source: None,
            api_version: None,
            resolved_from: ResolvedFrom::GlobalDefault,
            retry_max: None,
            retry_backoff_ms: None,
        }
    }

    #[test]
    fn test_create_backend_per_provider() {
        assert!(create_backend(&resolved(Backend::Openai)).is_ok());
        assert!(create_backend(&resolved(Backend::Ollama)).is_ok());

        assert!(create_backend(&resolved(Backend::Azure)).is_err());
        let mut azure = resolved(Backend::Azure);
        azure.base_url = Some("https://coach.openai.azure.com".to_string());
        assert!(create_backend(&azure).is_ok());

        assert!(create_backend(&resolved(Backend::Custom)).is_err());
    }

    #[test]
    fn test_cli_overrides_default_section() {
        let mut config = DhruvConfig::new();
        let args = StartArgs {
            backend: Some("ollama".to_string()),
            model: Some("llama3.2".to_string()),
            ..Default::default()
        };
        apply_cli_overrides(&mut config, &args).unwrap();

        let llm = config.llm.unwrap();
        assert_eq!(llm.backend, Some(Backend::Ollama));
        assert_eq!(llm.model.as_deref(), Some("llama3.2"));
    }

    #[test]
    fn test_cli_rejects_unknown_backend() {
        let mut config = DhruvConfig::new();
        let args = StartArgs {
            backend: Some("anthropic".to_string()),
            ..Default::default()
        };
        assert!(apply_cli_overrides(&mut config, &args).is_err());
    }

    #[test]
    fn test_server_config_from_file_and_flags() {
        let config = DhruvConfig::from_toml(
            r#"
[server]
port = 9090
resumable_streams = true

[chat]
max_steps = 3
guest_messages_per_day = 5
"#,
        )
        .unwrap();
        let args = StartArgs {
            bind: Some("0.0.0.0".to_string()),
            no_resume: true,
            ..Default::default()
        };

        let server = server_config(&config, &args).unwrap();
        assert_eq!(server.bind_address.to_string(), "0.0.0.0:9090");
        assert!(!server.resumable_streams);
        assert_eq!(server.max_steps, 3);
        assert_eq!(server.entitlements.guest_messages_per_day, 5);
        assert_eq!(server.entitlements.regular_messages_per_day, 100);
    }
}
