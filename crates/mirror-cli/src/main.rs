//! # mirror CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mirror_cli::failed::{run_failed, FailedArgs};
use mirror_cli::identify::{run_identify, IdentifyArgs};
use mirror_cli::warm::{run_warm, WarmArgs};
use mirror_cli::worker::{run_worker, WorkerArgs};

/// Asset mirror operator CLI.
#[derive(Parser, Debug)]
#[command(name = "mirror", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run population workers against the shared Postgres queue.
    Worker(WorkerArgs),

    /// Show the descriptor, storage path and origin URL for a request path.
    Identify(IdentifyArgs),

    /// Enqueue population tasks for request paths.
    Warm(WarmArgs),

    /// List dead-lettered population tasks.
    Failed(FailedArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The worker logs progress at info; one-shot commands stay quiet by default.
    let default_level = match (cli.verbose, &cli.command) {
        (0, Commands::Worker(_)) => "info",
        (0, _) => "warn",
        (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let result = match &cli.command {
        Commands::Worker(args) => run_worker(args).await,
        Commands::Identify(args) => run_identify(args),
        Commands::Warm(args) => run_warm(args).await,
        Commands::Failed(args) => run_failed(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
