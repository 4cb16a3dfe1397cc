//! lapcat: command-line access to Lap Cat Counter statistics.
//!
//! Reads and edits the same JSON file the overlay uses (~/.lapcat/lapcat.json
//! unless `--config` says otherwise).
//!
//! ## Subcommands
//!
//! - `totals`: One-line aggregate summary
//! - `top`: Leaderboard table
//! - `show`: One person's statistics
//! - `reset` / `reset-all`: Remove entries
//! - `recalc`: Rebuild duration aggregates from entries
//! - `replay`: Run a recorded frame trace through the engine

mod commands;
mod logging;
mod replay;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lapcat")]
#[command(about = "Lap Cat Counter statistics")]
#[command(version)]
struct Cli {
    /// Config file to use instead of ~/.lapcat/lapcat.json
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print total laps, people and lap time
    Totals,

    /// Print the leaderboard
    Top {
        /// Number of people to show
        #[arg(long, short, default_value_t = 20)]
        limit: usize,

        /// Print the plain-text totals block instead of the table
        #[arg(long)]
        text: bool,
    },

    /// Show one person's statistics
    Show {
        /// Display name as recorded
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Remove one person's statistics
    Reset {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Remove every person's statistics
    ResetAll {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Recalculate lap time totals from the per-person entries
    Recalc,

    /// Replay a JSON frame trace without touching the config file
    Replay {
        #[arg(value_name = "TRACE")]
        trace: PathBuf,

        /// Log per-frame diagnostics
        #[arg(long)]
        debug: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "lapcat failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let path = match cli.config {
        Some(path) => path,
        None => lapcat_core::default_config_path()?,
    };

    match cli.command {
        Commands::Totals => commands::totals(&path),
        Commands::Top { limit, text } => commands::top(&path, limit, text),
        Commands::Show { name } => commands::show(&path, &name),
        Commands::Reset { name } => commands::reset(&path, &name),
        Commands::ResetAll { yes } => commands::reset_all(&path, yes),
        Commands::Recalc => commands::recalc(&path),
        Commands::Replay { trace, debug } => commands::replay(&path, &trace, debug),
    }
}
