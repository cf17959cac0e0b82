// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `doctor` subcommand: configuration and connectivity checks.

use rfqsync_backend::QuoteBackendClient;
use rfqsync_config::RfqsyncConfig;
use rfqsync_core::error::RfqError;

/// Runs the diagnostic checks. Configuration already validated by the time
/// this runs; what remains is reachability.
pub async fn run(config: RfqsyncConfig) -> Result<(), RfqError> {
    println!("config: ok");
    println!("  backend.base_url = {}", config.backend.base_url);
    println!(
        "  polling = {}s base, {}s min, {}s cap",
        config.polling.base_interval_secs,
        config.polling.min_interval_secs,
        config.polling.max_backoff_secs
    );
    println!(
        "  push = {} ({})",
        if config.push.enabled { "enabled" } else { "disabled" },
        config.push.endpoint
    );

    let client = QuoteBackendClient::new(&config.backend)?;
    match client.health_check().await {
        Ok(()) => println!("backend: reachable"),
        Err(e) => {
            println!("backend: unreachable ({e})");
            return Err(e);
        }
    }

    Ok(())
}
