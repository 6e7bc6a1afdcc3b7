//! ocwatch - live activity watcher for agent coding sessions
//!
//! Tails an agent server's event stream, classifies each event, and keeps
//! an aggregated per-message view of the session being watched.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/ocwatch/ocwatch.log (~/.local/state/ocwatch/ocwatch.log)
//! - Config: $XDG_CONFIG_HOME/ocwatch/config.toml (~/.config/ocwatch/config.toml)

mod history;
mod render;
mod sessions;
mod stats;
mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use ocwatch_core::Config;

#[derive(Parser)]
#[command(name = "ocwatch")]
#[command(about = "Watch agent coding sessions from the terminal")]
#[command(version)]
struct Cli {
    /// Verbose output (-v shows internal and unclassified events, -vv also
    /// reports ignored cross-session traffic)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file path (default: $XDG_CONFIG_HOME/ocwatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server URL, overriding the configured one
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a session's events live (defaults to the most recent session)
    Watch {
        /// Session id to watch
        session: Option<String>,
    },
    /// Print a session's aggregated transcript
    History {
        /// Session id
        session: String,

        /// Emit JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },
    /// List sessions known to the server
    Sessions {
        /// Emit JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },
    /// Show classification statistics for a session's history
    Stats {
        /// Session id
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration, then apply command-line overrides
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };
    if let Some(server) = &cli.server {
        config.server.url = server.clone();
    }

    // Initialize logging (to file; stdout belongs to the command output)
    let _log_guard =
        ocwatch_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("ocwatch starting");

    match cli.command {
        Commands::Watch { session } => watch::run(&config, session, cli.verbose).await,
        Commands::History { session, json } => history::run(&config, &session, json).await,
        Commands::Sessions { json } => sessions::run(&config, json).await,
        Commands::Stats { session } => stats::run(&config, &session).await,
    }
}
