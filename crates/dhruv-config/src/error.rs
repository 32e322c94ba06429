//! Config errors.

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cannot encode config as TOML: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Neither `[llm.<role>]` nor `[llm]` exists.
    #[error("no [llm.{role}] profile and no default [llm] section")]
    NoLlm { role: String },

    /// A resolved LLM section lacks a value it needs.
    #[error("{context} is missing '{field}'")]
    Incomplete { field: String, context: String },

    #[error("no API key for {backend}: set {env_var} or api_key in the config file")]
    MissingApiKey { backend: String, env_var: String },

    #[error("{0}")]
    Invalid(String),
}
