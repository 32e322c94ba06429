//! CLI command handlers.

pub mod config;
pub mod intake;
pub mod memory;
pub mod start;
pub mod user;

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use dhruv_config::{ConfigSource, LoadedConfig};
use dhruv_store::{Store, User};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Explicit config file; skips discovery.
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Load the config layers, printing any warnings.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = match &self.config_path {
            Some(path) => LoadedConfig {
                config: dhruv_config::load_config_file(path)?,
                sources: vec![ConfigSource {
                    path: path.clone(),
                    loaded: true,
                }],
                warnings: Vec::new(),
            },
            None => dhruv_config::load_config(None)?,
        };

        for warning in &loaded.warnings {
            eprintln!("warning: {}", warning);
        }
        if self.verbose {
            let sources = loaded.loaded_from();
            if sources.is_empty() {
                eprintln!("No config files found, using defaults + CLI args");
            }
            for source in sources {
                eprintln!("Loaded config: {}", source.display());
            }
        }

        Ok(loaded)
    }

    /// Open the configured database, creating its directory.
    pub fn open_store(&self) -> Result<Store> {
        let config = self.load_config()?.config;
        let path = config.database_path();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Store::open(&path).with_context(|| format!("opening database {}", path.display()))
    }
}

/// The account registered under `email`.
pub fn require_user(store: &Store, email: &str) -> Result<User> {
    match store.get_user_by_email(email)? {
        Some(user) => Ok(user),
        None => bail!("No user with email {}", email),
    }
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shorten `s` to `max` characters, marking the cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
