// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quoting-backend trait: the one-shot exchange stream, the refresh path, and
//! the consumed collaborator operations.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::RfqError;
use crate::types::{
    ChatMessage, CreateNegotiationRequest, ExchangeEvent, NegotiationRef, NegotiationUpdate,
    SessionId,
};

/// Lazy, ordered sequence of typed exchange events.
pub type ExchangeStream =
    Pin<Box<dyn Stream<Item = Result<ExchangeEvent, RfqError>> + Send>>;

/// The quoting backend as consumed by the engine.
///
/// Long-running operations (`start_exchange`, `refresh_negotiation`) accept a
/// [`CancellationToken`]; cancellation is the only timeout mechanism — there
/// is no separate timer layer. All other operations are short request/response
/// calls bounded by the client's transport timeout.
#[async_trait]
pub trait QuoteBackend: Send + Sync {
    /// Sends a user message and returns the agent's streamed response.
    async fn start_exchange(
        &self,
        session_id: &SessionId,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<ExchangeStream, RfqError>;

    /// Re-fetches the negotiation state through the same stream shape as the
    /// initial fetch, collected into one observation batch.
    ///
    /// This is the single refresh path shared by the polling scheduler and
    /// the push bridge's delegated refreshes.
    async fn refresh_negotiation(
        &self,
        negotiation_id: &str,
        cancel: CancellationToken,
    ) -> Result<NegotiationUpdate, RfqError>;

    /// Creates a negotiation for an understood trip.
    async fn create_negotiation(
        &self,
        request: &CreateNegotiationRequest,
    ) -> Result<NegotiationRef, RfqError>;

    /// Cancels a negotiation; further polling for it is pointless.
    async fn cancel_negotiation(&self, negotiation_id: &str) -> Result<(), RfqError>;

    /// Fetches the current negotiation detail snapshot (offers + details).
    async fn fetch_negotiation(&self, negotiation_id: &str)
    -> Result<NegotiationUpdate, RfqError>;

    /// Fetches the operator message history for a negotiation.
    async fn fetch_messages(&self, negotiation_id: &str) -> Result<Vec<ChatMessage>, RfqError>;

    /// Persists a generated confirmation message.
    async fn persist_confirmation(
        &self,
        negotiation_id: &str,
        message: &ChatMessage,
    ) -> Result<(), RfqError>;

    /// Resolves the durable identifier for a temporary session.
    async fn resolve_session(&self, temporary_id: &SessionId) -> Result<SessionId, RfqError>;
}
