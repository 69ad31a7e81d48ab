mod app;
mod bridge;
mod commands;
mod config;
mod notifier;
mod onesignal;
mod supabase;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::commands::{
    GoalUpdate, NewFood, cmd_goal_set, cmd_goal_show, cmd_meal_add, cmd_meal_add_food,
    cmd_meal_list, cmd_meal_remove, cmd_meal_remove_food, cmd_meal_toggle, cmd_push_register,
    cmd_push_status, cmd_remind_dispatch, cmd_reminders_clear, cmd_reminders_list,
    cmd_reminders_sync, cmd_summary, cmd_weight_delete, cmd_weight_history, cmd_weight_log,
};
use crate::config::{Config, Settings};

#[derive(Parser)]
#[command(
    name = "bulk",
    version,
    about = "A bulking tracker: meals, macros, weight and meal reminders",
    long_about = "\n\n  ██████╗ ██╗   ██╗██╗     ██╗  ██╗
  ██╔══██╗██║   ██║██║     ██║ ██╔╝
  ██████╔╝██║   ██║██║     █████╔╝
  ██╔══██╗██║   ██║██║     ██╔═██╗
  ██████╔╝╚██████╔╝███████╗██║  ██╗
  ╚═════╝  ╚═════╝ ╚══════╝╚═╝  ╚═╝
        eat on time. grow.
"
)]
struct Cli {
    /// Keep sync notices out of the terminal (they still reach the log)
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Today's intake, meal progress and weight progress
    Summary {
        /// Date to compute day count for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change the bulking goal
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Manage planned meals and their foods
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Log and review body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Manage local meal reminders
    Reminders {
        #[command(subcommand)]
        command: ReminderCommands,
    },
    /// Push notification registration
    Push {
        #[command(subcommand)]
        command: PushCommands,
    },
    /// Server-side reminder jobs
    Remind {
        #[command(subcommand)]
        command: RemindCommands,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Show the current goal
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update goal fields (unset fields are kept)
    Set {
        /// Target weight in kg
        #[arg(long)]
        target: Option<f64>,
        /// Starting weight in kg
        #[arg(long)]
        start_weight: Option<f64>,
        /// Daily calorie target
        #[arg(long)]
        calories: Option<u32>,
        /// Daily protein target in grams
        #[arg(long)]
        protein: Option<u32>,
        /// Start date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        start_date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// List meals with their foods
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Plan a new meal
    Add {
        /// Meal name
        name: String,
        /// Time of day (HH:MM, 24h)
        time: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a meal
    Remove {
        /// Meal ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a meal eaten, or undo it
    Toggle {
        /// Meal ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a food to a meal
    AddFood {
        /// Meal ID (or unique prefix)
        meal_id: String,
        /// Food name
        name: String,
        /// Calories (kcal)
        #[arg(long)]
        calories: u32,
        /// Protein (g)
        #[arg(long, default_value_t = 0)]
        protein: u32,
        /// Carbs (g)
        #[arg(long, default_value_t = 0)]
        carbs: u32,
        /// Fat (g)
        #[arg(long, default_value_t = 0)]
        fat: u32,
        /// Portion description, e.g. "2 slices"
        #[arg(long)]
        portion: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a food from a meal
    RemoveFood {
        /// Meal ID (or unique prefix)
        meal_id: String,
        /// Food ID (or unique prefix)
        food_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry (replaces any entry on the same date)
    Log {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Progress photo (.jpg, .png or .webp)
        #[arg(long)]
        photo: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a weight entry
    Delete {
        /// Weight entry ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ReminderCommands {
    /// Reschedule reminders if the last schedule is stale
    Sync {
        /// Reschedule even if recently done
        #[arg(long)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List scheduled reminders
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cancel every scheduled reminder
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PushCommands {
    /// Register this device for push notifications
    Register {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the current push subscription
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RemindCommands {
    /// Send one push reminder per meal to the registered device
    Dispatch {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BULK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    tracing::debug!(
        config = %config.config_path.display(),
        db = %config.db_path.display(),
        "loaded configuration"
    );

    let app = App::open(&config, cli.quiet).await?;
    // Reminder commands decide for themselves whether to reschedule.
    if !matches!(
        cli.command,
        Commands::Reminders { .. } | Commands::Remind { .. }
    ) {
        app.store.start_reminders();
    }

    let result = dispatch(&app, &config.settings, cli.command).await;
    app.store.flush().await;
    result
}

#[allow(clippy::too_many_lines)]
async fn dispatch(app: &App, settings: &Settings, command: Commands) -> Result<()> {
    match command {
        Commands::Summary { date, json } => cmd_summary(app, date, json),
        Commands::Goal { command } => match command {
            GoalCommands::Show { json } => cmd_goal_show(app, json),
            GoalCommands::Set {
                target,
                start_weight,
                calories,
                protein,
                start_date,
                json,
            } => cmd_goal_set(
                app,
                GoalUpdate {
                    target,
                    start_weight,
                    calories,
                    protein,
                    start_date,
                },
                json,
            ),
        },
        Commands::Meal { command } => match command {
            MealCommands::List { json } => cmd_meal_list(app, json),
            MealCommands::Add { name, time, json } => cmd_meal_add(app, &name, &time, json),
            MealCommands::Remove { id, json } => cmd_meal_remove(app, &id, json),
            MealCommands::Toggle { id, json } => cmd_meal_toggle(app, &id, json),
            MealCommands::AddFood {
                meal_id,
                name,
                calories,
                protein,
                carbs,
                fat,
                portion,
                json,
            } => cmd_meal_add_food(
                app,
                &meal_id,
                NewFood {
                    name,
                    calories,
                    protein,
                    carbs,
                    fat,
                    portion,
                },
                json,
            ),
            MealCommands::RemoveFood {
                meal_id,
                food_id,
                json,
            } => cmd_meal_remove_food(app, &meal_id, &food_id, json),
        },
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                unit,
                date,
                photo,
                json,
            } => cmd_weight_log(app, value, &unit, date, photo.as_deref(), json).await,
            WeightCommands::History { json } => cmd_weight_history(app, json),
            WeightCommands::Delete { id, json } => cmd_weight_delete(app, &id, json),
        },
        Commands::Reminders { command } => match command {
            ReminderCommands::Sync { force, json } => cmd_reminders_sync(app, force, json),
            ReminderCommands::List { json } => cmd_reminders_list(app, json),
            ReminderCommands::Clear { json } => cmd_reminders_clear(app, json),
        },
        Commands::Push { command } => match command {
            PushCommands::Register { json } => cmd_push_register(app, json).await,
            PushCommands::Status { json } => cmd_push_status(app, json),
        },
        Commands::Remind { command } => match command {
            RemindCommands::Dispatch { json } => cmd_remind_dispatch(settings, json).await,
        },
    }
}
