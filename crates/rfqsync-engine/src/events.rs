// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifications emitted by the engine for its owner (UI, CLI).
//!
//! These are fire-and-forget observations about state changes; the state
//! itself is read from the store's watch channel.

use std::time::Duration;

use rfqsync_core::types::{ConnectionStatus, MessageOrigin, OfferStatus, WorkflowStatus};

/// One engine notification.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// One or more offers became quoted in a single merge.
    NewQuotes {
        negotiation_id: Option<String>,
        count: usize,
    },
    /// An offer's status changed.
    OfferStatusChanged {
        offer_id: String,
        from: OfferStatus,
        to: OfferStatus,
    },
    /// The workflow advanced to a later step.
    WorkflowAdvanced { status: WorkflowStatus },
    /// A message entered the session view.
    MessageAppended {
        message_id: String,
        origin: MessageOrigin,
    },
    /// An operator confirmation arrived.
    ConfirmationReceived {
        message_id: String,
        quote_id: Option<String>,
    },
    /// Push feed connection status changed.
    ConnectionChanged { status: ConnectionStatus },
    /// A refresh failed; polling backed off. Data may be stale until the
    /// next successful refresh.
    PollBackedOff {
        consecutive_errors: u32,
        next_interval: Duration,
    },
    /// The one-shot exchange stream failed terminally.
    StreamFailed { message: String },
}
