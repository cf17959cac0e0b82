// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared value types for the rfqsync engine: workflow statuses, flight
//! offers, messages, fingerprints, and the entity-observation batch that all
//! three ingestion paths (stream, poll, push) produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a negotiation session.
///
/// A session starts with a temporary id and may later be relinked to a
/// durable id once the backend persists it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Workflow progress of a negotiation, ordered by meaning.
///
/// Transitions are forward-only: once quotes exist the engine never moves a
/// session back to an earlier status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    UnderstandingRequest,
    SearchingAircraft,
    RequestingQuotes,
    AnalyzingOptions,
    ProposalReady,
}

impl WorkflowStatus {
    /// Integer step (1-5) used for progress display.
    pub fn step(self) -> u8 {
        match self {
            WorkflowStatus::UnderstandingRequest => 1,
            WorkflowStatus::SearchingAircraft => 2,
            WorkflowStatus::RequestingQuotes => 3,
            WorkflowStatus::AnalyzingOptions => 4,
            WorkflowStatus::ProposalReady => 5,
        }
    }
}

/// Status of a single flight offer within a negotiation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Unanswered,
    Sent,
    Quoted,
    Declined,
    Expired,
}

impl OfferStatus {
    /// Informativeness rank used for monotonic merge: a merged status may
    /// never drop to a lower rank.
    pub fn rank(self) -> u8 {
        match self {
            OfferStatus::Unanswered => 0,
            OfferStatus::Sent => 1,
            OfferStatus::Quoted | OfferStatus::Declined | OfferStatus::Expired => 2,
        }
    }

    /// True once no further polling is needed for this offer.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OfferStatus::Quoted | OfferStatus::Declined | OfferStatus::Expired
        )
    }
}

/// A flight offer (one RFQ sent to one operator) as currently known.
///
/// Optional fields distinguish "not yet known" from a real value so that
/// merge can update field-by-field without clobbering known data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfqFlight {
    /// Stable quote or RFQ identifier; the join key for merges.
    pub id: String,
    pub operator: Option<String>,
    pub aircraft_type: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub status: OfferStatus,
    pub updated_at: Option<DateTime<Utc>>,
    /// Local selection flag; never overwritten by ingested data.
    #[serde(default)]
    pub selected: bool,
}

impl RfqFlight {
    /// A bare offer with only an identifier, in the least informative state.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operator: None,
            aircraft_type: None,
            price: None,
            currency: None,
            status: OfferStatus::Unanswered,
            updated_at: None,
            selected: false,
        }
    }

    /// True when a real price is known.
    pub fn has_price(&self) -> bool {
        self.price.is_some_and(|p| p > 0.0)
    }
}

/// Which party produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    User,
    Agent,
    Operator,
}

/// Kind discriminator carried by operator-channel messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatorMessageKind {
    Request,
    Response,
    Info,
    Confirmation,
}

/// A message in the negotiation view.
///
/// Operator messages additionally carry the quote id they belong to and a
/// message kind. Agent status narration carries its semantic fingerprint so
/// later duplicates can be recognized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub origin: MessageOrigin,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<serde_json::Value>,
    /// Originating quote/operator identifier for operator messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<OperatorMessageKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
}

impl ChatMessage {
    /// A plain message with no rich payload.
    pub fn new(
        id: impl Into<String>,
        origin: MessageOrigin,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            origin,
            content: content.into(),
            timestamp,
            workflow: None,
            confirmation: None,
            quote_id: None,
            kind: None,
            fingerprint: None,
        }
    }
}

/// Semantic category of a narrative status update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    QuoteProgress,
    RequestsSent,
    OperatorDeclined,
}

/// Derived identity of a narrative status message.
///
/// Two status updates with the same fingerprint say the same thing even when
/// the wording differs; only the first is retained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub negotiation_id: String,
    pub category: StatusCategory,
    pub count: u32,
}

/// Richest known raw detail for one quote, used to enrich flight offers as
/// more detail arrives asynchronously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteDetail {
    pub quote_id: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    /// The raw detail object as received; kept whole so later consumers can
    /// read fields the engine does not model.
    pub raw: serde_json::Value,
}

/// One entity-observation batch.
///
/// Every ingestion path (one-shot stream, poll refresh, push-triggered
/// refresh, snapshot fetch) reduces to this shape before it reaches the
/// dedup & merge engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NegotiationUpdate {
    pub negotiation_id: Option<String>,
    /// Durable session id to replace a temporary one.
    pub durable_session_id: Option<String>,
    /// Shareable marketplace URL for the negotiation.
    pub deep_link: Option<String>,
    pub offers: Vec<RfqFlight>,
    pub quote_details: Vec<QuoteDetail>,
    pub operator_messages: Vec<ChatMessage>,
    /// Accumulated narrative text (full agent reply for the one-shot stream,
    /// status narration for refreshes). Subject to dedup before display.
    pub narrative: Option<String>,
}

impl NegotiationUpdate {
    /// True when the batch carries nothing worth dispatching.
    pub fn is_empty(&self) -> bool {
        self.negotiation_id.is_none()
            && self.durable_session_id.is_none()
            && self.deep_link.is_none()
            && self.offers.is_empty()
            && self.quote_details.is_empty()
            && self.operator_messages.is_empty()
            && self.narrative.as_deref().is_none_or(str::is_empty)
    }
}

/// Typed events produced by the exchange stream parser.
#[derive(Debug, Clone)]
pub enum ExchangeEvent {
    /// Incremental agent text.
    ContentDelta { text: String },
    /// A completed tool call. The parser does not interpret the payload;
    /// that is the merge engine's job.
    ToolResult {
        name: String,
        result: serde_json::Value,
    },
    /// Terminal summary: full text plus any canonical offer lists and
    /// session-linkage identifiers found in terminal payloads.
    Done(Box<NegotiationUpdate>),
}

/// A raw event delivered by the push feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Connection state of the push feed, reported to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// Request to create a negotiation from an understood trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNegotiationRequest {
    pub session_id: SessionId,
    pub departure: String,
    pub arrival: String,
    pub departure_date: String,
    pub passengers: u32,
}

/// Reference to a created negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationRef {
    pub negotiation_id: String,
    pub deep_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn workflow_steps_are_ordered() {
        let statuses = [
            WorkflowStatus::UnderstandingRequest,
            WorkflowStatus::SearchingAircraft,
            WorkflowStatus::RequestingQuotes,
            WorkflowStatus::AnalyzingOptions,
            WorkflowStatus::ProposalReady,
        ];
        for window in statuses.windows(2) {
            assert!(window[0].step() < window[1].step());
        }
        assert_eq!(WorkflowStatus::UnderstandingRequest.step(), 1);
        assert_eq!(WorkflowStatus::ProposalReady.step(), 5);
    }

    #[test]
    fn offer_status_rank_and_terminality() {
        assert!(OfferStatus::Unanswered.rank() < OfferStatus::Sent.rank());
        assert!(OfferStatus::Sent.rank() < OfferStatus::Quoted.rank());
        assert_eq!(OfferStatus::Quoted.rank(), OfferStatus::Declined.rank());

        assert!(!OfferStatus::Unanswered.is_terminal());
        assert!(!OfferStatus::Sent.is_terminal());
        assert!(OfferStatus::Quoted.is_terminal());
        assert!(OfferStatus::Declined.is_terminal());
        assert!(OfferStatus::Expired.is_terminal());
    }

    #[test]
    fn offer_status_parses_wire_strings() {
        assert_eq!(OfferStatus::from_str("quoted").unwrap(), OfferStatus::Quoted);
        assert_eq!(OfferStatus::from_str("QUOTED").unwrap(), OfferStatus::Quoted);
        assert!(OfferStatus::from_str("nonsense").is_err());
    }

    #[test]
    fn flight_price_presence() {
        let mut flight = RfqFlight::new("q-1");
        assert!(!flight.has_price());
        flight.price = Some(0.0);
        assert!(!flight.has_price());
        flight.price = Some(4000.0);
        assert!(flight.has_price());
    }

    #[test]
    fn empty_update_detection() {
        assert!(NegotiationUpdate::default().is_empty());

        let update = NegotiationUpdate {
            narrative: Some(String::new()),
            ..Default::default()
        };
        assert!(update.is_empty());

        let update = NegotiationUpdate {
            offers: vec![RfqFlight::new("q-1")],
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn fingerprint_equality_ignores_wording() {
        let a = Fingerprint {
            negotiation_id: "neg-1".into(),
            category: StatusCategory::QuoteProgress,
            count: 3,
        };
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn chat_message_serializes_without_empty_payloads() {
        let msg = ChatMessage::new("m-1", MessageOrigin::User, "hello", Utc::now());
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("workflow").is_none());
        assert!(json.get("quote_id").is_none());
    }
}
