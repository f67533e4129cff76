// SPDX-License-Identifier: AGPL-3.0-or-later
//! Corral CLI
//!
//! Operate an offline cache & sync worker from the command line: install
//! and activate cache generations, inspect and replay the mutation queue,
//! and run one-off fetches through the caching strategies.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "corral")]
#[command(author, version, about = "Corral - offline cache & sync for flaky networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL prepended to bare request paths
    #[arg(short, long, global = true)]
    base_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Pre-cache the app shell into the current cache generation
    Install {
        /// Activate immediately after installing
        #[arg(short, long)]
        activate: bool,
    },

    /// Install the current generation and retire every stale one
    Activate,

    /// Show cache and queue statistics
    Stats,

    /// List cache generations present in the store
    Generations,

    /// Inspect and drive the offline mutation queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Remove every entry from the current cache generation
    Clear,

    /// Fetch a URL through the caching strategies
    Fetch {
        /// URL or bare path to fetch
        url: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request body (JSON), for write methods
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// List queued mutations in replay order
    #[command(alias = "list")]
    Ls,

    /// Replay pending mutations against the server
    Replay,

    /// Remove synced entries (and failed ones with --failed)
    Purge {
        /// Also remove permanently failed entries
        #[arg(long)]
        failed: bool,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = commands::Context {
        config: cli.config,
        base_url: cli.base_url,
    };

    let result = match cli.command {
        Commands::Install { activate } => commands::install(&ctx, activate).await,
        Commands::Activate => commands::activate(&ctx).await,
        Commands::Stats => commands::stats(&ctx).await,
        Commands::Generations => commands::generations(&ctx).await,
        Commands::Queue { command } => match command {
            QueueCommands::Ls => commands::queue_ls(&ctx).await,
            QueueCommands::Replay => commands::queue_replay(&ctx).await,
            QueueCommands::Purge { failed } => commands::queue_purge(&ctx, failed).await,
        },
        Commands::Clear => commands::clear(&ctx).await,
        Commands::Fetch { url, method, data } => {
            commands::fetch(&ctx, &url, &method, data.as_deref()).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
