//! Config command - inspect and bootstrap configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::json;

use dhruv_config::{
    Backend, ChatConfig, DhruvConfig, LlmConfig, MemoryConfig, ModelRole, ServerConfig,
};

use super::{Context, print_json};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show config sources and the model resolved for each role
    Show,

    /// Write a starter config file
    Init {
        /// Write ./dhruv.toml instead of the user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the user config file path
    Path,
}

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Init { local, force } => {
            let path = if local {
                PathBuf::from("dhruv.toml")
            } else {
                dhruv_config::config_path()
                    .ok_or_else(|| anyhow!("Could not determine config directory"))?
            };
            cmd_init(&path, force, ctx)
        }
        ConfigCommand::Path => {
            let path = dhruv_config::config_path()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    let roles: Vec<_> = ModelRole::ALL
        .iter()
        .map(|role| (role, dhruv_config::resolve_for_role(config, *role)))
        .collect();

    if ctx.json_output {
        let models: serde_json::Map<_, _> = roles
            .iter()
            .map(|(role, resolved)| {
                let value = match resolved {
                    Ok(r) => json!({
                        "backend": r.backend.to_string(),
                        "model": r.model,
                        "from": r.resolved_from.to_string(),
                        "apiKey": r.api_key_source.as_ref().map(|s| s.to_string()),
                    }),
                    Err(e) => json!({ "error": e.to_string() }),
                };
                (role.profile_name().to_string(), value)
            })
            .collect();
        return print_json(&json!({
            "sources": loaded.loaded_from(),
            "database": config.database_path(),
            "models": models,
        }));
    }

    let dim = Style::new().dim();
    println!("{}", style("Config Files").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    for source in &loaded.sources {
        let status = if source.loaded {
            style("loaded").green()
        } else {
            style("absent").dim()
        };
        println!("  {:<8} {}", status, source.path.display());
    }
    println!();

    println!("{}", style("Models").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    for (role, resolved) in &roles {
        match resolved {
            Ok(r) => {
                let key = r
                    .api_key_source
                    .as_ref()
                    .map(|s| format!("key: {}", s))
                    .unwrap_or_else(|| "no key".to_string());
                println!(
                    "  {:<10} {} / {}  {}",
                    role.profile_name(),
                    style(&r.backend).cyan(),
                    r.model,
                    dim.apply_to(format!("{} ({})", r.resolved_from, key))
                );
            }
            Err(e) => println!(
                "  {:<10} {}",
                role.profile_name(),
                style(e.to_string()).red()
            ),
        }
    }
    println!();

    let server = config.server_or_default();
    let chat = config.chat_or_default();
    println!("{}", style("Server").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("  Listen:        {}:{}", server.bind, server.port);
    println!("  Resumable:     {}", server.resumable_streams);
    println!("  Database:      {}", config.database_path().display());
    println!("  Max steps:     {}", chat.max_steps);
    println!(
        "  Daily limits:  guest {}, regular {}",
        chat.guest_messages_per_day, chat.regular_messages_per_day
    );
    println!("  Memory:        {}", config.memory_or_default().enabled);
    Ok(())
}

/// The config `init` writes: OpenAI by default, with a stronger reasoning model.
fn starter_config() -> DhruvConfig {
    let mut llm_profiles = HashMap::new();
    llm_profiles.insert(
        ModelRole::Reasoning.profile_name().to_string(),
        LlmConfig {
            backend: Some(Backend::Openai),
            model: Some("o3-mini".to_string()),
            ..Default::default()
        },
    );

    DhruvConfig {
        llm: Some(LlmConfig {
            backend: Some(Backend::Openai),
            model: Some("gpt-4o-mini".to_string()),
            ..Default::default()
        }),
        llm_profiles,
        server: Some(ServerConfig::default()),
        storage: None,
        chat: Some(ChatConfig::default()),
        memory: Some(MemoryConfig::default()),
    }
}

fn cmd_init(path: &Path, force: bool, ctx: &Context) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists: {} (pass --force to overwrite)",
            path.display()
        );
    }

    dhruv_config::save_config(&starter_config(), path)?;

    if ctx.json_output {
        print_json(&json!({ "path": path }))
    } else {
        println!("{} {}", style("Wrote").green(), path.display());
        println!(
            "{}",
            Style::new()
                .dim()
                .apply_to("Set OPENAI_API_KEY, or edit [llm] to use azure, ollama or custom.")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context {
            json_output: true,
            verbose: false,
            config_path: None,
        }
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        cmd_init(&path, false, &ctx()).unwrap();
        let config = dhruv_config::load_config_file(&path).unwrap();

        let chat = config.llm_for(ModelRole::Chat).unwrap();
        assert_eq!(chat.model.as_deref(), Some("gpt-4o-mini"));
        let reasoning = config.llm_for(ModelRole::Reasoning).unwrap();
        assert_eq!(reasoning.model.as_deref(), Some("o3-mini"));
        assert_eq!(config.chat_or_default().max_steps, 5);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        assert!(cmd_init(&path, false, &ctx()).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[server]\nport = 9000\n");

        cmd_init(&path, true, &ctx()).unwrap();
        let config = dhruv_config::load_config_file(&path).unwrap();
        assert_eq!(config.server_or_default().port, 8080);
    }

    #[test]
    fn test_show_with_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dhruv.toml");
        std::fs::write(&path, "[llm]\nbackend = \"ollama\"\nmodel = \"llama3.2\"\n").unwrap();

        let ctx = Context {
            json_output: true,
            verbose: false,
            config_path: Some(path),
        };
        cmd_show(&ctx).unwrap();
    }
}
