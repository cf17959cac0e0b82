// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the rfqsync reconciliation engine.

use thiserror::Error;

/// The primary error type used across ingestion paths and engine operations.
#[derive(Debug, Error)]
pub enum RfqError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Network or HTTP failure talking to the quoting backend.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed frame or payload. Recovered locally by skipping the line;
    /// surfaced only when an entire response body is unusable.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The backend asked us to slow down. Handled by backoff escalation,
    /// never shown to the user directly.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Push feed failure (subscription refused, connection dropped mid-read).
    #[error("feed error: {message}")]
    Feed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation was cancelled by the user or a session switch.
    /// A clean stop, not a failure.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RfqError {
    /// Constructs a transport error wrapping an underlying cause.
    pub fn transport(message: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        RfqError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for failures that warrant an automatic retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RfqError::Transport { .. } | RfqError::RateLimited { .. } | RfqError::Feed { .. }
        )
    }

    /// True when this is a clean cancellation rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RfqError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(RfqError::Transport { message: "down".into(), source: None }.is_transient());
        assert!(RfqError::RateLimited { message: "429".into() }.is_transient());
        assert!(!RfqError::Parse { message: "bad frame".into() }.is_transient());
        assert!(!RfqError::Cancelled.is_transient());
    }

    #[test]
    fn cancellation_is_not_transient() {
        let err = RfqError::Cancelled;
        assert!(err.is_cancellation());
        assert!(!err.is_transient());
    }
}
