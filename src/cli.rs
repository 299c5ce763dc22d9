//! Command-line interface for postal_chess.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Postal Chess - correspondence chess by email
#[derive(Parser, Debug)]
#[command(name = "postal_chess")]
#[command(about = "Play correspondence chess by email against an engine or an LLM", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "postal_chess.toml")]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the session database
    InitStorage,

    /// Check configuration, secrets, and that the mailbox and opponent are reachable
    Preflight,

    /// Install a cron entry that runs `tick` on a schedule
    InstallTrigger {
        /// Minutes between ticks (defaults to poll_interval_minutes)
        #[arg(long)]
        every_minutes: Option<u32>,

        /// Crontab file to append to; prints the entry when omitted
        #[arg(long)]
        crontab: Option<PathBuf>,
    },

    /// Discard any current game and start a new one
    NewGame,

    /// Process the next message from the player
    Tick,

    /// Tick on an interval until interrupted
    Watch,

    /// Retry an opponent move that failed earlier
    Resume,

    /// Show the current game
    Status,

    /// init-storage, preflight, install-trigger and new-game in one go
    Bootstrap {
        /// Crontab file to append to; prints the entry when omitted
        #[arg(long)]
        crontab: Option<PathBuf>,
    },
}
