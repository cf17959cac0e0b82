// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./rfqsync.toml` > `~/.config/rfqsync/rfqsync.toml`
//! > `/etc/rfqsync/rfqsync.toml` with environment variable overrides via the
//! `RFQSYNC_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RfqsyncConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/rfqsync/rfqsync.toml` (system-wide)
/// 3. `~/.config/rfqsync/rfqsync.toml` (user XDG config)
/// 4. `./rfqsync.toml` (local directory)
/// 5. `RFQSYNC_*` environment variables
pub fn load_config() -> Result<RfqsyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RfqsyncConfig::default()))
        .merge(Toml::file("/etc/rfqsync/rfqsync.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("rfqsync/rfqsync.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("rfqsync.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<RfqsyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RfqsyncConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RfqsyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RfqsyncConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `RFQSYNC_POLLING_BASE_INTERVAL_SECS` must
/// map to `polling.base_interval_secs`, not `polling.base.interval.secs`.
fn env_provider() -> Env {
    Env::prefixed("RFQSYNC_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: RFQSYNC_POLLING_MAX_BACKOFF_SECS -> "polling_max_backoff_secs"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("backend_", "backend.", 1)
            .replacen("polling_", "polling.", 1)
            .replacen("push_", "push.", 1)
            .replacen("runtime_", "runtime.", 1);
        mapped.into()
    })
}
