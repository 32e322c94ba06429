//! Config file discovery and layered merging.
//!
//! Layers, lowest precedence first:
//! 1. `$DHRUV_CONFIG_DIR/config.toml`, else `~/.config/dhruv/config.toml`
//! 2. `./dhruv.toml` (or `<project_dir>/dhruv.toml`)
//! 3. CLI flags, applied by the binary after loading

use std::path::{Path, PathBuf};

use dhruv_types::config_defaults::DATABASE_FILE;

use crate::{ConfigError, DhruvConfig, Result};

const APP_NAME: &str = "dhruv";
const USER_CONFIG_FILE: &str = "config.toml";
const PROJECT_CONFIG_FILE: &str = "dhruv.toml";

/// Overrides the platform config directory when set and non-empty.
const CONFIG_DIR_ENV: &str = "DHRUV_CONFIG_DIR";

/// One config file that was considered during discovery.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file existed and parsed.
    pub loaded: bool,
}

/// Merged configuration plus what went into it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DhruvConfig,
    /// Every layer checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Non-fatal problems: unreadable layers, plaintext API keys.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Discover and merge all config layers using the default user config directory.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Discover and merge config layers.
///
/// `user_dir` replaces both `DHRUV_CONFIG_DIR` and the platform default; tests
/// pass a temp dir so the developer's own config is never read.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    user_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig {
        config: DhruvConfig::new(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };

    let user_path = match user_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => config_path(),
    };
    if let Some(path) = user_path {
        merge_layer(&mut loaded, path);
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    merge_layer(&mut loaded, project_path);

    warn_plaintext_keys(&loaded.config, &mut loaded.warnings);
    Ok(loaded)
}

/// Load a single config file without discovery.
pub fn load_config_file(path: &Path) -> Result<DhruvConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    DhruvConfig::from_toml(&contents)
}

/// Write a config file, creating parent directories.
pub fn save_config(config: &DhruvConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, config.to_toml()?).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// The user config directory: `$DHRUV_CONFIG_DIR`, else `<platform config dir>/dhruv`.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Directory for the database and log files.
///
/// Follows `DHRUV_CONFIG_DIR` when set so a test instance keeps everything together.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::data_dir().map(|d| d.join(APP_NAME))
}

impl DhruvConfig {
    /// Database file: `[storage].path`, else `dhruv.db` in the data dir, else the cwd.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = self.storage_or_default().path {
            return path;
        }
        data_dir()
            .map(|d| d.join(DATABASE_FILE))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
    }
}

fn merge_layer(loaded: &mut LoadedConfig, path: PathBuf) {
    let mut ok = false;
    if path.is_file() {
        match load_config_file(&path) {
            Ok(layer) => {
                loaded.config.merge(layer);
                ok = true;
            }
            Err(e) => loaded
                .warnings
                .push(format!("Failed to load {}: {}", path.display(), e)),
        }
    }
    loaded.sources.push(ConfigSource { path, loaded: ok });
}

fn warn_plaintext_keys(config: &DhruvConfig, warnings: &mut Vec<String>) {
    let default = config.llm.iter().map(|llm| ("llm".to_string(), llm));
    let profiles = config
        .llm_profiles
        .iter()
        .map(|(name, llm)| (format!("llm.{name}"), llm));

    let mut flagged: Vec<(String, &'static str)> = default
        .chain(profiles)
        .filter(|(_, llm)| llm.has_plaintext_api_key())
        .map(|(section, llm)| (section, llm.api_key_env_var().unwrap_or("LLM_API_KEY")))
        .collect();
    flagged.sort();

    for (section, env_var) in flagged {
        warnings.push(format!(
            "[{section}] contains a plaintext API key. Prefer setting {env_var} instead."
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
