//! Configuration system for the Dhruv coaching backend.
//!
//! Provides TOML-based configuration with:
//! - A default LLM (`[llm]`) plus named profiles (`[llm.chat]`, `[llm.reasoning]`,
//!   `[llm.title]`, `[llm.memory]`) that fall back to the default
//! - Config file layering (user config dir + project-local `dhruv.toml`)
//! - API key resolution (env var → config file)

pub mod discovery;
pub mod error;
pub mod resolver;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, config_dir, config_path, data_dir, load_config, load_config_file,
    load_config_with_options, save_config,
};
pub use error::{ConfigError, Result};
pub use resolver::{ResolvedFrom, ResolvedLlm, resolve_for_role};
pub use secrets::{ResolvedSecret, SecretSource, resolve_api_key};
pub use types::*;
