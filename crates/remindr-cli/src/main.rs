use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "remindr", version, about = "Remindr CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Reminder(commands::reminder::ReminderAction),
    #[command(flatten)]
    Alarm(commands::alarm::AlarmAction),
    /// Sticky "reminders changed" flag for observers
    Changed {
        #[command(subcommand)]
        action: commands::changed::ChangedAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Log to stderr, filtered by `REMINDR_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("REMINDR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Reminder(action) => commands::reminder::run(action),
        Commands::Alarm(action) => commands::alarm::run(action),
        Commands::Changed { action } => commands::changed::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
