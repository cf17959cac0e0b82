// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the rfqsync reconciliation engine.
//!
//! This crate provides the shared entity model (flight offers, messages,
//! workflow statuses, fingerprints), the error taxonomy, the traits for the
//! engine's external collaborators (quoting backend, push feed), and the pure
//! payload-extraction helpers used by every ingestion path.

pub mod error;
pub mod extract;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RfqError;
pub use traits::{EventFeed, ExchangeStream, PushStream, QuoteBackend};
pub use types::{
    ChatMessage, ConnectionStatus, ExchangeEvent, Fingerprint, MessageOrigin, NegotiationUpdate,
    OfferStatus, OperatorMessageKind, PushEvent, QuoteDetail, RfqFlight, SessionId,
    StatusCategory, WorkflowStatus,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = RfqError::Config("bad value".into());
        let _transport = RfqError::Transport {
            message: "connection refused".into(),
            source: Some(Box::new(std::io::Error::other("refused"))),
        };
        let _parse = RfqError::Parse {
            message: "bad frame".into(),
        };
        let _rate = RfqError::RateLimited {
            message: "slow down".into(),
        };
        let _feed = RfqError::Feed {
            message: "subscription dropped".into(),
            source: None,
        };
        let _cancelled = RfqError::Cancelled;
        let _internal = RfqError::Internal("unexpected".into());
    }

    #[test]
    fn trait_objects_are_constructible() {
        // Compile-time check that both collaborator traits stay object-safe.
        fn _assert_backend(_: &dyn QuoteBackend) {}
        fn _assert_feed(_: &dyn EventFeed) {}
    }
}
