//! # Meridian - Network Server
//!
//! The main binary for the Meridian network.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for network operations
//! - Movement scheduler driving the fleet
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/meridian (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │   CLI       │    │   HTTP API  │    │  Oracle adapters │    │
//! │  │  (clap)     │    │   (axum)    │    │  (reqwest/local) │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                   ┌────────────────┐                           │
//! │                   │ meridian-core  │                           │
//! │                   │  (THE LOGIC)   │                           │
//! │                   └────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server and the movement scheduler
//! meridian server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! meridian status --verbose
//! meridian expand
//! meridian dispatch --mover 1 --target 3
//! ```

use clap::Parser;
use meridian::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // MERIDIAN_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MERIDIAN_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "meridian=info,meridian_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Meridian startup banner.
fn print_banner() {
    println!(
        r#"
  ┌┬┐┌─┐┬─┐┬┌┬┐┬┌─┐┌┐┌
  │││├┤ ├┬┘│ │││├─┤│││
  ┴ ┴└─┘┴└─┴─┴┘┴┴ ┴┘└┘

  Network Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
