//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [llm]                    # default LLM
//! [llm.chat]               # per-role overrides: chat, reasoning, title, memory
//! [server]                 # HTTP server settings
//! [storage]                # database location
//! [chat]                   # tool loop and entitlements
//! [memory]                 # memory pipeline toggle
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use dhruv_types::config_defaults as defaults;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that a project-local `dhruv.toml` can override
/// only what it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DhruvConfig {
    /// Default LLM configuration (the bare `[llm]` section).
    pub llm: Option<LlmConfig>,

    /// Named LLM configurations (`[llm.chat]`, `[llm.title]`, ...).
    #[serde(default, rename = "llm_profiles")]
    pub llm_profiles: HashMap<String, LlmConfig>,

    pub server: Option<ServerConfig>,
    pub storage: Option<StorageConfig>,
    pub chat: Option<ChatConfig>,
    pub memory: Option<MemoryConfig>,
}

impl DhruvConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        let raw: RawConfig = toml::from_str(toml_str)?;
        Ok(raw.into())
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        let raw: RawConfig = self.clone().into();
        Ok(toml::to_string_pretty(&raw)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: DhruvConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        self.llm_profiles.extend(other.llm_profiles);
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.chat.is_some() {
            self.chat = other.chat;
        }
        if other.memory.is_some() {
            self.memory = other.memory;
        }
    }

    /// The LLM config for a model role: its named profile, else the default `[llm]`.
    pub fn llm_for(&self, role: ModelRole) -> crate::Result<&LlmConfig> {
        self.llm_profiles
            .get(role.profile_name())
            .or(self.llm.as_ref())
            .ok_or_else(|| crate::ConfigError::NoLlm {
                role: role.profile_name().to_string(),
            })
    }

    /// Server section, or defaults when absent.
    pub fn server_or_default(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn chat_or_default(&self) -> ChatConfig {
        self.chat.clone().unwrap_or_default()
    }

    pub fn memory_or_default(&self) -> MemoryConfig {
        self.memory.clone().unwrap_or_default()
    }

    pub fn storage_or_default(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw TOML structure (for serde)
// ─────────────────────────────────────────────────────────────────────────────

/// Internal raw config matching the actual TOML layout, where `[llm]` carries
/// both direct keys and named sub-tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    llm: Option<RawLlmSection>,
    server: Option<ServerConfig>,
    storage: Option<StorageConfig>,
    chat: Option<ChatConfig>,
    memory: Option<MemoryConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawLlmSection {
    backend: Option<Backend>,
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    api_version: Option<String>,
    retry_max: Option<u32>,
    retry_backoff_ms: Option<u64>,

    #[serde(flatten)]
    profiles: HashMap<String, LlmConfig>,
}

impl From<RawConfig> for DhruvConfig {
    fn from(raw: RawConfig) -> Self {
        let (llm, llm_profiles) = match raw.llm {
            Some(section) => {
                let default = if section.backend.is_some() || section.model.is_some() {
                    Some(LlmConfig {
                        backend: section.backend,
                        model: section.model,
                        base_url: section.base_url,
                        api_key: section.api_key,
                        api_version: section.api_version,
                        retry_max: section.retry_max,
                        retry_backoff_ms: section.retry_backoff_ms,
                    })
                } else {
                    None
                };
                (default, section.profiles)
            }
            None => (None, HashMap::new()),
        };

        DhruvConfig {
            llm,
            llm_profiles,
            server: raw.server,
            storage: raw.storage,
            chat: raw.chat,
            memory: raw.memory,
        }
    }
}

impl From<DhruvConfig> for RawConfig {
    fn from(config: DhruvConfig) -> Self {
        let llm = if config.llm.is_some() || !config.llm_profiles.is_empty() {
            let default = config.llm.unwrap_or_default();
            Some(RawLlmSection {
                backend: default.backend,
                model: default.model,
                base_url: default.base_url,
                api_key: default.api_key,
                api_version: default.api_version,
                retry_max: default.retry_max,
                retry_backoff_ms: default.retry_backoff_ms,
                profiles: config.llm_profiles,
            })
        } else {
            None
        };

        RawConfig {
            llm,
            server: config.server,
            storage: config.storage,
            chat: config.chat,
            memory: config.memory,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for an LLM backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: Option<Backend>,
    /// Model identifier (the deployment name for Azure).
    pub model: Option<String>,
    /// Custom API base URL. For Azure this is the resource endpoint.
    pub base_url: Option<String>,
    /// API key (prefer the env var; warns if set here).
    pub api_key: Option<String>,
    /// Azure `api-version` query parameter.
    pub api_version: Option<String>,
    pub retry_max: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn api_key_env_var(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.env_var())
    }
}

/// Supported LLM backend providers. All speak the OpenAI chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Openai,
    Azure,
    Ollama,
    Custom,
}

impl Backend {
    /// Environment variable name for this backend's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Backend::Openai => "OPENAI_API_KEY",
            Backend::Azure => "AZURE_OPENAI_API_KEY",
            Backend::Ollama => "OLLAMA_API_KEY",
            Backend::Custom => "LLM_API_KEY",
        }
    }

    /// Whether requests can be sent without a key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Backend::Ollama)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Openai => "OpenAI",
            Backend::Azure => "Azure OpenAI",
            Backend::Ollama => "Ollama",
            Backend::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for Backend {
    type Err = crate::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Backend::Openai),
            "azure" => Ok(Backend::Azure),
            "ollama" => Ok(Backend::Ollama),
            "custom" => Ok(Backend::Custom),
            other => Err(crate::ConfigError::Invalid(format!(
                "unknown backend '{other}' (expected openai, azure, ollama or custom)"
            ))),
        }
    }
}

/// The distinct model uses in a chat turn, each mapped to an `[llm.<name>]` profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    /// Regular chat model (`chat-model`).
    Chat,
    /// Reasoning model (`chat-model-reasoning`), run without tools.
    Reasoning,
    /// Chat title generation.
    Title,
    /// Memory classifier and extractor.
    Memory,
}

impl ModelRole {
    pub const ALL: &'static [ModelRole] = &[
        ModelRole::Chat,
        ModelRole::Reasoning,
        ModelRole::Title,
        ModelRole::Memory,
    ];

    pub fn profile_name(&self) -> &'static str {
        match self {
            ModelRole::Chat => "chat",
            ModelRole::Reasoning => "reasoning",
            ModelRole::Title => "title",
            ModelRole::Memory => "memory",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    /// Allowed CORS origins. Empty means CORS is not configured.
    pub cors_origins: Vec<String>,
    /// Buffer generations so clients can reattach with `GET /api/chat`.
    pub resumable_streams: bool,
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::DEFAULT_PORT,
            bind: defaults::DEFAULT_BIND.to_string(),
            cors_origins: Vec::new(),
            resumable_streams: true,
            request_logging: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage / Chat / Memory
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to `dhruv.db` in the data directory.
    pub path: Option<PathBuf>,
}

/// Chat turn settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum model calls per turn in the tool loop.
    pub max_steps: u32,
    pub max_tokens: u32,
    /// User messages allowed per 24 hours for guest accounts.
    pub guest_messages_per_day: u32,
    /// User messages allowed per 24 hours for regular accounts.
    pub regular_messages_per_day: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_steps: defaults::MAX_STEPS,
            max_tokens: defaults::MAX_TOKENS,
            guest_messages_per_day: defaults::GUEST_MESSAGES_PER_DAY,
            regular_messages_per_day: defaults::REGULAR_MESSAGES_PER_DAY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Run the classify/extract/store pipeline on every user message.
    pub enabled: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
