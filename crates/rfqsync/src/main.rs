// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! rfqsync - live RFQ negotiation watcher.
//!
//! Binary entry point: loads and validates configuration, initializes
//! tracing, and dispatches subcommands.

mod doctor;
mod signal;
mod watch;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// rfqsync - live RFQ negotiation watcher.
#[derive(Parser, Debug)]
#[command(name = "rfqsync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a negotiation live: poll, subscribe, and print engine events.
    Watch {
        /// Negotiation id to attach to.
        #[arg(long)]
        negotiation_id: Option<String>,
        /// Start a new negotiation by sending this message to the agent.
        #[arg(long, conflicts_with = "negotiation_id")]
        message: Option<String>,
    },
    /// Check configuration and backend reachability.
    Doctor,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match rfqsync_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            rfqsync_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.runtime.log_level);

    let outcome = match cli.command {
        Commands::Watch {
            negotiation_id,
            message,
        } => watch::run(config, negotiation_id, message).await,
        Commands::Doctor => doctor::run(config).await,
    };

    if let Err(e) = outcome {
        eprintln!("rfqsync: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rfqsync={log_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
