mod cmd;
mod goals_source;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "remind-me",
    about = "Recurring email reminders for the goals you keep meaning to get to",
    version,
    propagate_version = true
)]
struct Cli {
    /// Goals file (default: ./remind-me.yaml, else the built-in list)
    #[arg(long, global = true, env = "REMIND_ME_GOALS")]
    goals: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the reminder loop and run until Ctrl-C
    Run {
        /// Seconds between polls of the scheduler
        #[arg(long, default_value = "5")]
        poll_secs: u64,
    },

    /// List the goals that would be tracked
    Goals,

    /// Validate the email settings taken from the environment
    Config,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let source = goals_source::resolve(cli.goals.as_deref(), &cwd);

    let result = match cli.command {
        Commands::Run { poll_secs } => cmd::run::run(&source, poll_secs),
        Commands::Goals => cmd::goals::run(&source, cli.json),
        Commands::Config => cmd::config::run(cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
