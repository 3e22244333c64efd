use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "allot", version, about = "Split the rest of the day between your tasks")]
struct Cli {
    /// Task database file (default: <data dir>/allot.db)
    #[arg(long, global = true, env = "ALLOT_DB")]
    db: Option<PathBuf>,
    /// Config file (default: <data dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Use this instant as "now" (RFC 3339, e.g. 2024-05-01T20:00:00+02:00)
    #[arg(long, global = true, value_parser = commands::parse_now)]
    now: Option<DateTime<FixedOffset>>,
    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task list management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Recompute today's minutes for every task
    Allocate(commands::allocate::AllocateArgs),
    /// Active-task timer
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Day checkpoints from wake, home and sleep times
    Splits(commands::splits::SplitsArgs),
    /// Queued completion alerts
    Alerts {
        #[command(subcommand)]
        action: commands::alerts::AlertsAction,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("ALLOT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = Context {
        db: cli.db,
        config: cli.config,
        now: cli.now,
    };
    let result = match cli.command {
        Commands::Task { action } => commands::task::run(action, &ctx),
        Commands::Allocate(args) => commands::allocate::run(args, &ctx),
        Commands::Timer { action } => commands::timer::run(action, &ctx),
        Commands::Config { action } => commands::config::run(action, &ctx),
        Commands::Splits(args) => commands::splits::run(args, &ctx),
        Commands::Alerts { action } => commands::alerts::run(action, &ctx),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
