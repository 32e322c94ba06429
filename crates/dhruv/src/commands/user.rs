//! User command - accounts, bearer tokens and custom prompts.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::json;

use dhruv_store::Store;
use dhruv_types::UserKind;

use super::{Context, print_json, require_user};

/// Arguments for the user command.
#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Create an account and print its first token
    Create {
        /// Account email
        email: String,

        /// Create a guest account (lower daily message allowance)
        #[arg(long)]
        guest: bool,
    },

    /// Issue a new bearer token for an account
    Token {
        /// Account email
        email: String,
    },

    /// Revoke a bearer token
    Revoke {
        /// The token to revoke
        token: String,
    },

    /// List an account's most recent chats
    Chats {
        /// Account email
        email: String,

        /// Maximum chats to list
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the account and its onboarding profile
    Show {
        /// Account email
        email: String,
    },

    /// Show, set or clear the custom system prompt
    Prompt {
        /// Account email
        email: String,

        /// New prompt text
        #[arg(long, conflicts_with = "clear")]
        set: Option<String>,

        /// Remove the custom prompt
        #[arg(long)]
        clear: bool,
    },
}

/// Run the user command.
pub fn run(args: UserArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    match args.command {
        UserCommand::Create { email, guest } => cmd_create(&store, &email, guest, ctx),
        UserCommand::Token { email } => cmd_token(&store, &email, ctx),
        UserCommand::Revoke { token } => cmd_revoke(&store, &token, ctx),
        UserCommand::Chats { email, limit } => cmd_chats(&store, &email, limit, ctx),
        UserCommand::Show { email } => cmd_show(&store, &email, ctx),
        UserCommand::Prompt { email, set, clear } => {
            cmd_prompt(&store, &email, set.as_deref(), clear, ctx)
        }
    }
}

fn cmd_create(store: &Store, email: &str, guest: bool, ctx: &Context) -> Result<()> {
    if store.get_user_by_email(email)?.is_some() {
        bail!("A user with email {} already exists", email);
    }

    let kind = if guest { UserKind::Guest } else { UserKind::Regular };
    let user = store.create_user(email, kind)?;
    let token = store.issue_token(user.id)?;

    if ctx.json_output {
        return print_json(&json!({ "user": user, "token": token }));
    }

    let dim = Style::new().dim();
    println!("{}", style("User Created").bold().green());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("  Id:     {}", style(user.id).cyan());
    println!("  Email:  {}", user.email);
    println!("  Kind:   {}", user.kind);
    println!("  Token:  {}", style(&token).yellow());
    Ok(())
}

fn cmd_token(store: &Store, email: &str, ctx: &Context) -> Result<()> {
    let user = require_user(store, email)?;
    let token = store.issue_token(user.id)?;

    if ctx.json_output {
        print_json(&json!({ "userId": user.id, "token": token }))
    } else {
        println!("{}", token);
        Ok(())
    }
}

fn cmd_revoke(store: &Store, token: &str, ctx: &Context) -> Result<()> {
    if !store.revoke_token(token)? {
        bail!("Unknown token");
    }
    if ctx.json_output {
        print_json(&json!({ "revoked": true }))
    } else {
        println!("{}", style("Token revoked").green());
        Ok(())
    }
}

fn cmd_chats(store: &Store, email: &str, limit: usize, ctx: &Context) -> Result<()> {
    let user = require_user(store, email)?;
    let chats = store.chats_for_user(user.id, limit)?;

    if ctx.json_output {
        return print_json(&chats);
    }

    let dim = Style::new().dim();
    if chats.is_empty() {
        println!("{}", dim.apply_to("No chats yet"));
        return Ok(());
    }
    for chat in &chats {
        println!(
            "{}  {}  {}",
            style(chat.id).cyan(),
            dim.apply_to(chat.created_at.format("%Y-%m-%d %H:%M")),
            chat.title
        );
    }
    Ok(())
}

fn cmd_show(store: &Store, email: &str, ctx: &Context) -> Result<()> {
    let user = require_user(store, email)?;
    if ctx.json_output {
        return print_json(&user);
    }

    let dim = Style::new().dim();
    let profile = &user.profile;
    let field = |label: &str, value: Option<&str>| match value {
        Some(v) => println!("  {:<20} {}", label, v),
        None => println!("  {:<20} {}", label, dim.apply_to("-")),
    };

    println!("{}", style(&user.email).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("  {:<20} {}", "Id", style(user.id).cyan());
    println!("  {:<20} {}", "Kind", user.kind);
    field("First name", profile.first_name.as_deref());
    field("Last name", profile.last_name.as_deref());
    field("Date of birth", profile.date_of_birth.as_deref());
    field("Gender", profile.gender.as_deref());
    field("Weight", profile.weight.as_deref());
    field("Height", profile.height.as_deref());
    field("Diet", profile.dietary_preference.as_deref());
    field("Fitness goal", profile.fitness_goal.as_deref());
    field("Activity level", profile.activity_level.as_deref());
    if !profile.medical_conditions.is_empty() {
        println!("  {:<20} {}", "Medical conditions", profile.medical_conditions.join(", "));
    }
    field("Custom prompt", user.prompt.as_deref());
    Ok(())
}

fn cmd_prompt(
    store: &Store,
    email: &str,
    set: Option<&str>,
    clear: bool,
    ctx: &Context,
) -> Result<()> {
    require_user(store, email)?;

    if clear {
        store.set_user_prompt(email, None)?;
    } else if let Some(prompt) = set {
        store.set_user_prompt(email, Some(prompt))?;
    }

    let prompt = store.user_prompt(email)?;
    if ctx.json_output {
        print_json(&json!({ "email": email, "prompt": prompt }))
    } else {
        match prompt {
            Some(p) => println!("{}", p),
            None => println!("{}", Style::new().dim().apply_to("(no custom prompt)")),
        }
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
    fn test_create_issues_working_token() {
        let store = Store::open_in_memory().unwrap();
        cmd_create(&store, "ravi@example.com", true, &ctx()).unwrap();

        let user = store.get_user_by_email("ravi@example.com").unwrap().unwrap();
        assert_eq!(user.kind, UserKind::Guest);

        cmd_token(&store, "ravi@example.com", &ctx()).unwrap();
    }

    #[test]
    fn test_create_rejects_duplicate_email() {
        let store = Store::open_in_memory().unwrap();
        cmd_create(&store, "ravi@example.com", false, &ctx()).unwrap();
        assert!(cmd_create(&store, "ravi@example.com", false, &ctx()).is_err());
    }

    #[test]
    fn test_prompt_set_and_clear() {
        let store = Store::open_in_memory().unwrap();
        store.create_user("ravi@example.com", UserKind::Regular).unwrap();

        cmd_prompt(&store, "ravi@example.com", Some("Reply in Hindi"), false, &ctx()).unwrap();
        assert_eq!(
            store.user_prompt("ravi@example.com").unwrap().as_deref(),
            Some("Reply in Hindi")
        );

        cmd_prompt(&store, "ravi@example.com", None, true, &ctx()).unwrap();
        assert_eq!(store.user_prompt("ravi@example.com").unwrap(), None);
    }

    #[test]
    fn test_revoke_token() {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("ravi@example.com", UserKind::Regular).unwrap();
        let token = store.issue_token(user.id).unwrap();

        cmd_revoke(&store, &token, &ctx()).unwrap();
        assert!(store.user_for_token(&token).unwrap().is_none());
        assert!(cmd_revoke(&store, &token, &ctx()).is_err());
    }

    #[test]
    fn test_unknown_user_errors() {
        let store = Store::open_in_memory().unwrap();
        assert!(cmd_token(&store, "ghost@example.com", &ctx()).is_err());
        assert!(cmd_show(&store, "ghost@example.com", &ctx()).is_err());
        assert!(cmd_chats(&store, "ghost@example.com", 5, &ctx()).is_err());
    }
}
