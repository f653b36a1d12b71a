//! # Meridian CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server and the movement scheduler
//! - `status` - Show network status
//! - `expand` - Run one expansion cycle
//! - `dispatch` - Send a mover towards a node
//! - `tick` - Advance movers by a number of ticks
//! - `events` - Show recent audit events
//! - `reset` - Wipe and reseed the network
//! - `init` - Create and seed the store

mod commands;

use crate::config::MeridianConfig;
use clap::{Parser, Subcommand};
use meridian_core::MeridianError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Meridian - a self-growing network with a moving fleet
#[derive(Parser, Debug)]
#[command(name = "meridian")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML config file (falls back to MERIDIAN_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server and movement scheduler
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show network status
    Status,

    /// Run one expansion cycle
    Expand,

    /// Send a mover towards a node
    Dispatch {
        /// Mover ID
        #[arg(short, long)]
        mover: u64,

        /// Target node ID
        #[arg(short, long)]
        target: u64,
    },

    /// Advance all moving movers
    Tick {
        /// Number of ticks to run
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },

    /// Show recent audit events, newest first
    Events {
        /// Number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Wipe the network and reseed it
    Reset,

    /// Create the store and seed the starter network
    Init {
        /// Wipe and reseed a store that already holds a network
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), MeridianError> {
    let config = MeridianConfig::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(config, &host, port).await,
        Some(Commands::Status) | None => cmd_status(config, json_mode, cli.verbose).await,
        Some(Commands::Expand) => cmd_expand(config, json_mode).await,
        Some(Commands::Dispatch { mover, target }) => {
            cmd_dispatch(config, json_mode, mover, target).await
        }
        Some(Commands::Tick { count }) => cmd_tick(config, json_mode, count).await,
        Some(Commands::Events { limit }) => cmd_events(config, json_mode, limit).await,
        Some(Commands::Reset) => cmd_reset(config, json_mode).await,
        Some(Commands::Init { force }) => cmd_init(config, json_mode, force).await,
    }
}
