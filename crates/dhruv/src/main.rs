//! Dhruv - diet and fitness coaching backend
//!
//! Main entry point for the Dhruv CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, intake, memory, start, user};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Dhruv - diet and fitness coaching backend
#[derive(Parser)]
#[command(name = "dhruv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to config file (overrides default discovery)
    #[arg(long, global = true, env = "DHRUV_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start(start::StartArgs),

    /// Manage accounts, tokens and custom prompts
    User(user::UserArgs),

    /// Inspect and log water/calorie intake
    Intake(intake::IntakeArgs),

    /// Inspect and edit stored user memories
    Memory(memory::MemoryArgs),

    /// Show or initialise configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "dhruv=debug,dhruv_agent=debug,dhruv_llm=debug,dhruv_server=debug,dhruv_store=debug,dhruv_config=debug,tower_http=debug,info"
    } else {
        "dhruv=info,dhruv_agent=info,dhruv_llm=info,dhruv_server=info,dhruv_store=info,warn"
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| filter.to_string());

    let log_dir = dhruv_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "dhruv.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "dhruv=trace,dhruv_agent=trace,dhruv_llm=trace,dhruv_server=trace,dhruv_store=debug,dhruv_config=debug,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_path: cli.config,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::User(args) => user::run(args, &ctx),
        Commands::Intake(args) => intake::run(args, &ctx),
        Commands::Memory(args) => memory::run(args, &ctx),
        Commands::Config(args) => config::run(args, &ctx),
    }
}
