//! Intake command - today's totals and manual water logs.

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Args, Subcommand};
use console::{Style, style};

use dhruv_store::{NewWaterIntake, Store};
use dhruv_types::{WaterSource, WaterUnit};

use super::{Context, print_json, require_user};

/// Arguments for the intake command.
#[derive(Args, Debug)]
pub struct IntakeArgs {
    #[command(subcommand)]
    pub command: IntakeCommand,
}

#[derive(Subcommand, Debug)]
pub enum IntakeCommand {
    /// Show today's calorie, macro and water totals (IST)
    Today {
        /// Account email
        email: String,
    },

    /// Log a glass of water by hand
    LogWater {
        /// Account email
        email: String,

        /// Amount consumed
        amount: f64,

        /// Unit: ml or oz
        #[arg(short, long, default_value = "ml")]
        unit: WaterUnit,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
}

/// Run the intake command.
pub fn run(args: IntakeArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    match args.command {
        IntakeCommand::Today { email } => cmd_today(&store, &email, ctx),
        IntakeCommand::LogWater {
            email,
            amount,
            unit,
            notes,
        } => cmd_log_water(&store, &email, amount, unit, notes, ctx),
    }
}

fn cmd_today(store: &Store, email: &str, ctx: &Context) -> Result<()> {
    let user = require_user(store, email)?;
    let summary = store.daily_summary(user.id, Utc::now())?;

    if ctx.json_output {
        return print_json(&summary);
    }

    let dim = Style::new().dim();
    println!(
        "{} {}",
        style("Intake for").bold(),
        style(format!("{} ({})", summary.date, summary.timezone)).bold()
    );
    println!("{}", dim.apply_to("─".repeat(50)));
    println!(
        "  Calories:  {} kcal {}",
        style(summary.calorie_amount).cyan(),
        dim.apply_to(format!("({} entries)", summary.calorie_entry_count))
    );
    println!("  Carbs:     {} g", summary.carbs_amount);
    println!("  Protein:   {} g", summary.proteins_amount);
    println!("  Fats:      {} g", summary.fats_amount);
    println!(
        "  Water:     {} ml {}",
        style(summary.water_intake_amount).cyan(),
        dim.apply_to(format!(
            "({} oz, {} entries)",
            summary.water_intake_amount_oz, summary.water_entry_count
        ))
    );

    if summary.calorie_entry_count > 0 {
        println!();
        for (meal, totals) in &summary.calories_by_meal {
            if totals.entries > 0 {
                println!("  {:<10} {} kcal", meal, totals.calories);
            }
        }
    }
    Ok(())
}

fn cmd_log_water(
    store: &Store,
    email: &str,
    amount: f64,
    unit: WaterUnit,
    notes: Option<String>,
    ctx: &Context,
) -> Result<()> {
    if !(amount > 0.0) {
        bail!("Amount must be a positive number");
    }
    let user = require_user(store, email)?;

    let mut entry = NewWaterIntake::new(amount, unit).with_source(WaterSource::Manual);
    if let Some(notes) = notes {
        entry = entry.with_notes(notes);
    }
    let logged = store.add_water_intake(user.id, entry)?;

    if ctx.json_output {
        print_json(&logged)
    } else {
        println!(
            "{} {} {}",
            style("Logged").green(),
            logged.amount,
            logged.unit
        );
        Ok(())
    }
}
