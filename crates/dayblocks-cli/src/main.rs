use std::env;
use std::io;

use clap::{CommandFactory, Parser, Subcommand};
use dayblocks_core::CoreError;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "dayblocks", version, about = "Track your day in twenty-minute blocks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Whole-day views and maintenance
    Day {
        #[command(subcommand)]
        action: commands::day::DayAction,
    },
    /// Edit a single block
    Block {
        #[command(subcommand)]
        action: commands::block::BlockAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// `DAYBLOCKS_LOG` takes an `EnvFilter` directive; warnings only by default.
/// Logs go to stderr so stdout stays machine-readable.
fn init_logging() {
    let filter = env::var("DAYBLOCKS_LOG")
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Day { action } => commands::day::run(action),
        Commands::Block { action } => commands::block::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "dayblocks", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        // Rejected transitions are the caller's mistake, not a failure.
        let code = match e.downcast_ref::<CoreError>() {
            Some(core) if core.is_contract_violation() => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}
