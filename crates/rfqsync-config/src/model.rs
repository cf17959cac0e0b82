// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the rfqsync engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level rfqsync configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RfqsyncConfig {
    /// Quoting backend HTTP settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Polling scheduler settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Push event feed settings.
    #[serde(default)]
    pub push: PushConfig,

    /// Process-level settings (logging).
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Quoting backend HTTP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the quoting backend API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for the backend. Optional for local development setups.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Transport timeout in seconds for non-streaming requests.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Polling scheduler configuration.
///
/// On repeated refresh failures the interval grows as
/// `base_interval_secs * 2^errors`, capped at `max_backoff_secs` and floored
/// at `min_interval_secs`; one success resets it to the baseline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Baseline interval between refreshes, in seconds.
    #[serde(default = "default_base_interval_secs")]
    pub base_interval_secs: u64,

    /// Lower bound for the refresh interval, in seconds.
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    /// Upper bound for the backed-off interval, in seconds.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: default_base_interval_secs(),
            min_interval_secs: default_min_interval_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

fn default_base_interval_secs() -> u64 {
    15
}

fn default_min_interval_secs() -> u64 {
    5
}

fn default_max_backoff_secs() -> u64 {
    300
}

/// Push event feed configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    /// Whether to subscribe to the push feed at all. When disabled, state
    /// converges through polling alone.
    #[serde(default = "default_push_enabled")]
    pub enabled: bool,

    /// Websocket endpoint of the change feed.
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: default_push_enabled(),
            endpoint: default_push_endpoint(),
        }
    }
}

fn default_push_enabled() -> bool {
    true
}

fn default_push_endpoint() -> String {
    "ws://localhost:8080/v1/feed".to_string()
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
