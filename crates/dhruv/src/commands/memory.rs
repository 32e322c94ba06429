//! Memory command - inspect and curate what the coach remembers.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use uuid::Uuid;

use dhruv_store::{MemoryFilter, MemoryUpdate, Store};
use dhruv_types::MemoryType;

use super::{Context, print_json, require_user, truncate};

/// Arguments for the memory command.
#[derive(Args, Debug)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    /// List active memories, most important first
    List {
        /// Account email
        email: String,

        /// Only this memory type
        #[arg(short = 't', long = "type")]
        memory_type: Option<MemoryType>,

        /// Minimum importance (1-10)
        #[arg(long, default_value = "1")]
        min_importance: u8,

        /// Maximum results to return
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Deactivate a memory
    Forget {
        /// Memory id
        id: Uuid,
    },

    /// Edit a memory in place
    Update {
        /// Memory id
        id: Uuid,

        /// Replacement content
        #[arg(long)]
        content: Option<String>,

        #[arg(short = 't', long = "type")]
        memory_type: Option<MemoryType>,

        /// Importance (clamped to 1-10)
        #[arg(long)]
        importance: Option<i64>,

        /// Comma-separated tags; pass an empty string to clear
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },
}

/// Run the memory command.
pub fn run(args: MemoryArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    match args.command {
        MemoryCommand::List {
            email,
            memory_type,
            min_importance,
            limit,
        } => {
            let filter = MemoryFilter {
                memory_type,
                min_importance,
                limit,
            };
            cmd_list(&store, &email, &filter, ctx)
        }
        MemoryCommand::Forget { id } => cmd_forget(&store, id, ctx),
        MemoryCommand::Update {
            id,
            content,
            memory_type,
            importance,
            tags,
        } => {
            let update = MemoryUpdate {
                memory_content: content,
                memory_type,
                importance_score: importance,
                tags: tags.map(|t| {
                    t.into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }),
                is_active: None,
            };
            cmd_update(&store, id, update, ctx)
        }
    }
}

fn cmd_list(store: &Store, email: &str, filter: &MemoryFilter, ctx: &Context) -> Result<()> {
    let user = require_user(store, email)?;
    let memories = store.list_memories(user.id, filter)?;

    if ctx.json_output {
        return print_json(&memories);
    }

    let dim = Style::new().dim();
    if memories.is_empty() {
        println!("{}", dim.apply_to("No memories found"));
        return Ok(());
    }

    println!("{}", style(format!("Memories for {}", user.email)).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!();
    for memory in &memories {
        println!(
            "{} {}",
            style(format!("[{:>2}]", memory.importance_score)).cyan(),
            truncate(&memory.memory_content, 70)
        );
        let tags = memory
            .tags
            .as_ref()
            .map(|t| format!(" #{}", t.join(" #")))
            .unwrap_or_default();
        println!(
            "     {}",
            dim.apply_to(format!("{} {}{}", memory.id, memory.memory_type, tags))
        );
    }
    Ok(())
}

fn cmd_forget(store: &Store, id: Uuid, ctx: &Context) -> Result<()> {
    if !store.forget_memory(id)? {
        bail!("No active memory with id {}", id);
    }
    if ctx.json_output {
        print_json(&serde_json::json!({ "id": id, "forgotten": true }))
    } else {
        println!("{} {}", style("Forgot").green(), id);
        Ok(())
    }
}

fn cmd_update(store: &Store, id: Uuid, update: MemoryUpdate, ctx: &Context) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update; pass --content, --type, --importance or --tags");
    }
    let record = store.update_memory(id, update)?;

    if ctx.json_output {
        print_json(&record)
    } else {
        println!(
            "{} {} {}",
            style("Updated").green(),
            style(format!("[{:>2}]", record.importance_score)).cyan(),
            record.memory_content
        );
        Ok(())
    }
}
