// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as URL schemes and interval ordering.

use crate::diagnostic::ConfigError;
use crate::model::RfqsyncConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RfqsyncConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let base_url = config.backend.base_url.trim();
    if base_url.is_empty() {
        errors.push(ConfigError::Validation {
            message: "backend.base_url must not be empty".to_string(),
        });
    } else if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        errors.push(ConfigError::Validation {
            message: format!("backend.base_url `{base_url}` must start with http:// or https://"),
        });
    }

    if config.backend.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "backend.timeout_secs must be at least 1".to_string(),
        });
    }

    let polling = &config.polling;
    if polling.base_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "polling.base_interval_secs must be at least 1".to_string(),
        });
    }
    if polling.min_interval_secs > polling.base_interval_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "polling.min_interval_secs ({}) must not exceed polling.base_interval_secs ({})",
                polling.min_interval_secs, polling.base_interval_secs
            ),
        });
    }
    if polling.max_backoff_secs < polling.base_interval_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "polling.max_backoff_secs ({}) must be at least polling.base_interval_secs ({})",
                polling.max_backoff_secs, polling.base_interval_secs
            ),
        });
    }

    if config.push.enabled {
        let endpoint = config.push.endpoint.trim();
        if !endpoint.starts_with("ws://") && !endpoint.starts_with("wss://") {
            errors.push(ConfigError::Validation {
                message: format!("push.endpoint `{endpoint}` must start with ws:// or wss://"),
            });
        }
    }

    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if !LEVELS.contains(&config.runtime.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "runtime.log_level `{}` is not one of: {}",
                config.runtime.log_level,
                LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
