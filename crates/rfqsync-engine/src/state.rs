// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The workflow state machine: per-session state, the closed action set, and
//! the pure transition function.
//!
//! All mutation goes through [`reduce`], which is pure given (state, action):
//! the same action sequence always produces the same state and events, so
//! transitions can be replayed deterministically in tests. The store actor
//! (see [`crate::store`]) is the thin imperative shell that runs it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use rfqsync_core::types::{
    ChatMessage, Fingerprint, MessageOrigin, NegotiationUpdate, OfferStatus, OperatorMessageKind,
    QuoteDetail, RfqFlight, SessionId, WorkflowStatus,
};

use crate::dedup::{Admission, SessionDedup};
use crate::events::EngineEvent;
use crate::{fingerprint, merge};

/// Which ingestion path produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestSource {
    /// The one-shot exchange stream.
    Stream,
    /// The interval-driven poll (or a push-delegated refresh).
    Poll,
    /// A direct snapshot fetch.
    Snapshot,
}

/// The single mutable view of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub session_id: SessionId,
    pub negotiation_id: Option<String>,
    pub deep_link: Option<String>,
    pub status: WorkflowStatus,
    pub messages: Vec<ChatMessage>,
    pub offers: Vec<RfqFlight>,
    pub quote_details: HashMap<String, QuoteDetail>,
    /// True while a one-shot exchange is streaming.
    pub awaiting_response: bool,
    /// Last terminal error of a message exchange; cleared on the next send.
    pub last_error: Option<String>,
    /// Agent text accumulated from the in-flight stream.
    pub streaming_text: String,
    /// Seen-sets for narrative dedup; scoped to this session.
    pub dedup: SessionDedup,
}

impl WorkflowState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            negotiation_id: None,
            deep_link: None,
            status: WorkflowStatus::UnderstandingRequest,
            messages: Vec::new(),
            offers: Vec::new(),
            quote_details: HashMap::new(),
            awaiting_response: false,
            last_error: None,
            streaming_text: String::new(),
            dedup: SessionDedup::default(),
        }
    }

    /// Current progress step (1-5).
    pub fn step(&self) -> u8 {
        self.status.step()
    }

    /// True once structured offer data supersedes free-text narration.
    fn narration_superseded(&self) -> bool {
        self.step() >= 3 || !self.offers.is_empty()
    }
}

/// The closed set of state transitions. Nothing mutates the state except
/// dispatching one of these.
#[derive(Debug, Clone)]
pub enum Action {
    /// The user sent a message; an exchange is starting.
    UserMessageSubmitted {
        id: String,
        content: String,
        at: DateTime<Utc>,
    },
    /// Incremental agent text from the exchange stream.
    StreamDelta { text: String },
    /// The exchange stream finished with its terminal summary.
    StreamCompleted {
        message_id: String,
        at: DateTime<Utc>,
        update: NegotiationUpdate,
    },
    /// The exchange stream failed terminally. Previously merged offer data
    /// is untouched.
    StreamFailed { message: String },
    /// A tool call finished; may advance the workflow per the fixed table.
    ToolCallCompleted { name: String },
    /// An entity-observation batch arrived from any ingestion path.
    ObservationArrived {
        source: IngestSource,
        at: DateTime<Utc>,
        update: NegotiationUpdate,
    },
    /// An operator message arrived through the push feed or history fetch.
    OperatorMessageReceived { message: ChatMessage },
    /// The user toggled offer selection.
    OfferSelected { offer_id: String, selected: bool },
    /// The session's durable identifier replaced its temporary one.
    SessionRelinked { durable_id: SessionId },
}

/// Maps tool-call names to forward workflow transitions. The machine never
/// uses this table to move status backward.
pub fn status_for_tool(name: &str) -> Option<WorkflowStatus> {
    match name {
        "search_aircraft" | "search_flights" => Some(WorkflowStatus::SearchingAircraft),
        "create_rfp" | "create_trip" | "create_negotiation" => {
            Some(WorkflowStatus::RequestingQuotes)
        }
        "get_rfq_quotes" | "get_quotes" | "get_quote_details" => {
            Some(WorkflowStatus::AnalyzingOptions)
        }
        "generate_proposal" => Some(WorkflowStatus::ProposalReady),
        _ => None,
    }
}

/// The pure transition function: (state, action) -> (new state, events).
pub fn reduce(mut state: WorkflowState, action: Action) -> (WorkflowState, Vec<EngineEvent>) {
    let mut events = Vec::new();

    match action {
        Action::UserMessageSubmitted { id, content, at } => {
            let message = ChatMessage::new(id, MessageOrigin::User, content, at);
            upsert_message(&mut state, message, &mut events);
            state.awaiting_response = true;
            state.last_error = None;
            state.streaming_text.clear();
        }

        Action::StreamDelta { text } => {
            state.streaming_text.push_str(&text);
        }

        Action::StreamCompleted {
            message_id,
            at,
            update,
        } => {
            state.awaiting_response = false;
            let narrative = update.narrative.clone();
            apply_update(&mut state, IngestSource::Stream, at, update, &mut events);

            // The completed agent reply is kept by identity, but its content
            // and fingerprint are marked seen so later narration cannot
            // repeat it.
            let content = match narrative {
                Some(text) if !text.is_empty() => text,
                _ => std::mem::take(&mut state.streaming_text),
            };
            if !content.is_empty() {
                let negotiation = state.negotiation_id.clone().unwrap_or_default();
                let fp = fingerprint::extract(&negotiation, &content);
                state.dedup.observe(&content, fp.as_ref());

                let mut message =
                    ChatMessage::new(message_id, MessageOrigin::Agent, content, at);
                message.workflow = Some(state.status);
                message.fingerprint = fp;
                upsert_message(&mut state, message, &mut events);
            }
            state.streaming_text.clear();
        }

        Action::StreamFailed { message } => {
            state.awaiting_response = false;
            state.streaming_text.clear();
            state.last_error = Some(message.clone());
            events.push(EngineEvent::StreamFailed { message });
        }

        Action::ToolCallCompleted { name } => {
            if let Some(next) = status_for_tool(&name) {
                advance_status(&mut state, next, &mut events);
            }
        }

        Action::ObservationArrived { source, at, update } => {
            apply_update(&mut state, source, at, update, &mut events);
        }

        Action::OperatorMessageReceived { message } => {
            upsert_message(&mut state, message, &mut events);
        }

        Action::OfferSelected { offer_id, selected } => {
            if let Some(offer) = state.offers.iter_mut().find(|o| o.id == offer_id) {
                offer.selected = selected;
            }
        }

        Action::SessionRelinked { durable_id } => {
            debug!(
                from = %state.session_id,
                to = %durable_id,
                "session relinked to durable id"
            );
            state.session_id = durable_id;
        }
    }

    (state, events)
}

/// Folds one observation batch into the state: linkage, quote details,
/// offer merge, operator messages, then dedup-gated narration.
fn apply_update(
    state: &mut WorkflowState,
    source: IngestSource,
    at: DateTime<Utc>,
    update: NegotiationUpdate,
    events: &mut Vec<EngineEvent>,
) {
    let NegotiationUpdate {
        negotiation_id,
        durable_session_id: _, // relinking is the registry's job, not the reducer's
        deep_link,
        offers,
        quote_details,
        operator_messages,
        narrative,
    } = update;

    if let Some(negotiation) = negotiation_id
        && state.negotiation_id.as_deref() != Some(negotiation.as_str())
    {
        debug!(negotiation_id = %negotiation, ?source, "negotiation linked");
        state.negotiation_id = Some(negotiation);
    }
    if deep_link.is_some() {
        state.deep_link = deep_link;
    }

    // Quote details: richest entry per quote wins.
    for detail in quote_details {
        match state.quote_details.get(&detail.quote_id) {
            Some(existing) if existing.price.is_some() && detail.price.is_none() => {}
            _ => {
                state.quote_details.insert(detail.quote_id.clone(), detail);
            }
        }
    }

    let (merged, report) =
        merge::merge_with_details(&state.offers, &offers, &state.quote_details);
    state.offers = merged;
    if !report.newly_quoted.is_empty() {
        events.push(EngineEvent::NewQuotes {
            negotiation_id: state.negotiation_id.clone(),
            count: report.newly_quoted.len(),
        });
    }
    for transition in &report.transitions {
        events.push(EngineEvent::OfferStatusChanged {
            offer_id: transition.offer_id.clone(),
            from: transition.from,
            to: transition.to,
        });
    }

    for message in operator_messages {
        upsert_message(state, message, events);
    }

    // Narration from poll/snapshot paths goes through the dedup gate. The
    // stream's own narrative becomes the identified agent reply instead.
    if source != IngestSource::Stream
        && let Some(content) = narrative.filter(|c| !c.trim().is_empty())
    {
        admit_narrative(state, content, at, events);
    }

    // Structured quote data implies the session is analyzing options.
    if state.offers.iter().any(|o| o.status == OfferStatus::Quoted) {
        advance_status(state, WorkflowStatus::AnalyzingOptions, events);
    }
}

/// Runs the atomic check-and-mark admission for a narrative status message
/// and appends it when admitted.
fn admit_narrative(
    state: &mut WorkflowState,
    content: String,
    at: DateTime<Utc>,
    events: &mut Vec<EngineEvent>,
) {
    let negotiation = state.negotiation_id.clone().unwrap_or_default();
    let fp = fingerprint::extract(&negotiation, &content);
    let superseded = state.narration_superseded();
    let carried: Vec<Fingerprint> = state
        .messages
        .iter()
        .filter_map(|m| m.fingerprint.clone())
        .collect();

    let admission =
        state
            .dedup
            .admit_narrative(&content, fp.as_ref(), carried.iter(), superseded);

    match admission {
        Admission::Admitted => {
            // Deterministic id derived from content keeps replay stable.
            let id = format!("narrative-{}", &fingerprint::content_hash(&content)[..12]);
            let mut message = ChatMessage::new(id, MessageOrigin::Agent, content, at);
            message.workflow = Some(state.status);
            message.fingerprint = fp;
            upsert_message(state, message, events);
        }
        reason => {
            debug!(?reason, "narrative status suppressed");
        }
    }
}

/// Inserts or replaces a message by id. Exact-identity messages are always
/// kept; a repeat id updates the record in place (latest-known state).
fn upsert_message(state: &mut WorkflowState, message: ChatMessage, events: &mut Vec<EngineEvent>) {
    if let Some(existing) = state.messages.iter_mut().find(|m| m.id == message.id) {
        *existing = message;
        return;
    }

    if message.kind == Some(OperatorMessageKind::Confirmation) {
        events.push(EngineEvent::ConfirmationReceived {
            message_id: message.id.clone(),
            quote_id: message.quote_id.clone(),
        });
    }
    events.push(EngineEvent::MessageAppended {
        message_id: message.id.clone(),
        origin: message.origin,
    });
    state.messages.push(message);
}

/// Moves the workflow forward, never backward.
fn advance_status(state: &mut WorkflowState, next: WorkflowStatus, events: &mut Vec<EngineEvent>) {
    if next.step() > state.status.step() {
        debug!(from = %state.status, to = %next, "workflow advanced");
        state.status = next;
        events.push(EngineEvent::WorkflowAdvanced { status: next });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn initial() -> WorkflowState {
        WorkflowState::new(SessionId("s-1".into()))
    }

    fn observed(offers: Vec<RfqFlight>) -> Action {
        Action::ObservationArrived {
            source: IngestSource::Poll,
            at: at(),
            update: NegotiationUpdate {
                negotiation_id: Some("neg-1".into()),
                offers,
                ..Default::default()
            },
        }
    }

    fn quoted(id: &str, price: f64) -> RfqFlight {
        RfqFlight {
            price: Some(price),
            currency: Some("USD".into()),
            status: OfferStatus::Quoted,
            ..RfqFlight::new(id)
        }
    }

    fn unanswered(id: &str) -> RfqFlight {
        RfqFlight::new(id)
    }

    #[test]
    fn replaying_actions_is_deterministic() {
        let actions = || {
            vec![
                Action::UserMessageSubmitted {
                    id: "u-1".into(),
                    content: "Find me a jet".into(),
                    at: at(),
                },
                Action::ToolCallCompleted {
                    name: "search_aircraft".into(),
                },
                observed(vec![unanswered("q-1"), quoted("q-2", 4000.0)]),
            ]
        };

        let run = || {
            let mut state = initial();
            let mut all_events = Vec::new();
            for action in actions() {
                let (next, events) = reduce(state, action);
                state = next;
                all_events.extend(events);
            }
            (state, all_events)
        };

        let (state_a, events_a) = run();
        let (state_b, events_b) = run();
        assert_eq!(state_a, state_b);
        assert_eq!(events_a, events_b);
    }

    #[test]
    fn tool_table_advances_forward_only() {
        let mut state = initial();
        assert_eq!(state.step(), 1);

        let (next, events) = reduce(
            state,
            Action::ToolCallCompleted {
                name: "get_rfq_quotes".into(),
            },
        );
        state = next;
        assert_eq!(state.status, WorkflowStatus::AnalyzingOptions);
        assert_eq!(
            events,
            vec![EngineEvent::WorkflowAdvanced {
                status: WorkflowStatus::AnalyzingOptions
            }]
        );

        // An earlier-step tool result never moves the status backward.
        let (state, events) = reduce(
            state,
            Action::ToolCallCompleted {
                name: "search_aircraft".into(),
            },
        );
        assert_eq!(state.status, WorkflowStatus::AnalyzingOptions);
        assert!(events.is_empty());
    }

    #[test]
    fn unknown_tool_names_are_ignored() {
        let (state, events) = reduce(
            initial(),
            Action::ToolCallCompleted {
                name: "weather_lookup".into(),
            },
        );
        assert_eq!(state.status, WorkflowStatus::UnderstandingRequest);
        assert!(events.is_empty());
    }

    #[test]
    fn quoted_offer_fires_new_quotes_and_advances() {
        let (state, events) = reduce(initial(), observed(vec![quoted("q-1", 4000.0)]));

        assert_eq!(state.offers.len(), 1);
        assert!(events.contains(&EngineEvent::NewQuotes {
            negotiation_id: Some("neg-1".into()),
            count: 1,
        }));
        assert_eq!(state.status, WorkflowStatus::AnalyzingOptions);
    }

    #[test]
    fn poll_scenario_merge_and_notifications() {
        // Session with two unanswered offers; a poll returns one now quoted.
        let (state, _) = reduce(initial(), observed(vec![unanswered("q-1"), unanswered("q-2")]));
        let (state, events) = reduce(state, observed(vec![quoted("q-1", 4000.0)]));

        assert_eq!(state.offers.len(), 2);
        let q1 = state.offers.iter().find(|o| o.id == "q-1").unwrap();
        assert_eq!(q1.status, OfferStatus::Quoted);
        assert_eq!(q1.price, Some(4000.0));
        let q2 = state.offers.iter().find(|o| o.id == "q-2").unwrap();
        assert_eq!(q2.status, OfferStatus::Unanswered);

        let new_quotes: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::NewQuotes { .. }))
            .collect();
        assert_eq!(new_quotes.len(), 1);
        let transitions: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::OfferStatusChanged { .. }))
            .collect();
        assert_eq!(transitions.len(), 1);
    }

    #[test]
    fn narrative_fingerprint_suppression_across_wordings() {
        let narrative = |content: &str| Action::ObservationArrived {
            source: IngestSource::Poll,
            at: at(),
            update: NegotiationUpdate {
                negotiation_id: Some("neg-1".into()),
                narrative: Some(content.into()),
                ..Default::default()
            },
        };

        let (state, events) = reduce(initial(), narrative("3 of 5 operators have responded"));
        assert_eq!(state.messages.len(), 1);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, EngineEvent::MessageAppended { .. }))
                .count(),
            1
        );

        // Same fingerprint, different wording: suppressed.
        let (state, events) = reduce(state, narrative("We've received 3 quotes so far"));
        assert_eq!(state.messages.len(), 1);
        assert!(events.is_empty());

        // New count: admitted.
        let (state, _) = reduce(state, narrative("We've received 4 quotes so far"));
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn narration_blocked_once_offers_exist() {
        let (state, _) = reduce(initial(), observed(vec![unanswered("q-1")]));

        let (state, events) = reduce(
            state,
            Action::ObservationArrived {
                source: IngestSource::Poll,
                at: at(),
                update: NegotiationUpdate {
                    narrative: Some("Sent requests to 5 operators".into()),
                    ..Default::default()
                },
            },
        );
        assert!(state.messages.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn stream_completion_appends_reply_and_marks_seen() {
        let update = NegotiationUpdate {
            negotiation_id: Some("neg-1".into()),
            narrative: Some("We've received 3 quotes so far".into()),
            ..Default::default()
        };
        let (state, _) = reduce(
            initial(),
            Action::StreamCompleted {
                message_id: "a-1".into(),
                at: at(),
                update,
            },
        );
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].id, "a-1");
        assert!(!state.awaiting_response);

        // A later poll narrating the same progress is suppressed by the
        // fingerprint the reply left behind.
        let (state, _) = reduce(
            state,
            Action::ObservationArrived {
                source: IngestSource::Poll,
                at: at(),
                update: NegotiationUpdate {
                    narrative: Some("3 of 5 operators have responded".into()),
                    ..Default::default()
                },
            },
        );
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn richer_tool_result_supersedes_earlier_within_stream() {
        // First retrieval: two offers, sparse.
        let (state, _) = reduce(
            initial(),
            Action::ObservationArrived {
                source: IngestSource::Stream,
                at: at(),
                update: NegotiationUpdate {
                    offers: vec![unanswered("q-1"), unanswered("q-2")],
                    ..Default::default()
                },
            },
        );
        // Second retrieval: same ids, richer.
        let richer = vec![quoted("q-1", 4000.0), quoted("q-2", 5200.0)];
        let (state, _) = reduce(
            state,
            Action::ObservationArrived {
                source: IngestSource::Stream,
                at: at(),
                update: NegotiationUpdate {
                    offers: richer.clone(),
                    ..Default::default()
                },
            },
        );

        assert_eq!(state.offers.len(), 2);
        for expected in &richer {
            let offer = state.offers.iter().find(|o| o.id == expected.id).unwrap();
            assert_eq!(offer.status, OfferStatus::Quoted);
            assert_eq!(offer.price, expected.price);
        }
    }

    #[test]
    fn stream_failure_preserves_merged_offers() {
        let (state, _) = reduce(initial(), observed(vec![quoted("q-1", 4000.0)]));
        let (state, events) = reduce(
            state,
            Action::StreamFailed {
                message: "connection reset".into(),
            },
        );

        assert_eq!(state.offers.len(), 1);
        assert_eq!(state.last_error.as_deref(), Some("connection reset"));
        assert!(events.contains(&EngineEvent::StreamFailed {
            message: "connection reset".into()
        }));
    }

    #[test]
    fn quote_details_enrich_existing_offers() {
        let (state, _) = reduce(initial(), observed(vec![unanswered("q-1")]));

        let detail = QuoteDetail {
            quote_id: "q-1".into(),
            price: Some(880.0),
            currency: Some("EUR".into()),
            raw: serde_json::json!({}),
        };
        let (state, events) = reduce(
            state,
            Action::ObservationArrived {
                source: IngestSource::Poll,
                at: at(),
                update: NegotiationUpdate {
                    quote_details: vec![detail],
                    ..Default::default()
                },
            },
        );

        let offer = &state.offers[0];
        assert_eq!(offer.price, Some(880.0));
        assert_eq!(offer.status, OfferStatus::Quoted);
        assert!(events.iter().any(|e| matches!(e, EngineEvent::NewQuotes { count: 1, .. })));
    }

    #[test]
    fn operator_confirmation_fires_event() {
        let mut message = ChatMessage::new("om-1", MessageOrigin::Operator, "Confirmed", at());
        message.kind = Some(OperatorMessageKind::Confirmation);
        message.quote_id = Some("q-1".into());

        let (state, events) = reduce(initial(), Action::OperatorMessageReceived { message });
        assert_eq!(state.messages.len(), 1);
        assert!(events.contains(&EngineEvent::ConfirmationReceived {
            message_id: "om-1".into(),
            quote_id: Some("q-1".into()),
        }));
    }

    #[test]
    fn repeated_message_id_updates_in_place() {
        let first = ChatMessage::new("om-1", MessageOrigin::Operator, "draft", at());
        let (state, _) = reduce(initial(), Action::OperatorMessageReceived { message: first });

        let revised = ChatMessage::new("om-1", MessageOrigin::Operator, "final", at());
        let (state, events) = reduce(state, Action::OperatorMessageReceived { message: revised });

        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, "final");
        assert!(events.is_empty());
    }

    #[test]
    fn offer_selection_toggles() {
        let (state, _) = reduce(initial(), observed(vec![quoted("q-1", 4000.0)]));
        let (state, _) = reduce(
            state,
            Action::OfferSelected {
                offer_id: "q-1".into(),
                selected: true,
            },
        );
        assert!(state.offers[0].selected);
    }

    #[test]
    fn relink_updates_session_id() {
        let (state, _) = reduce(
            initial(),
            Action::SessionRelinked {
                durable_id: SessionId("durable-9".into()),
            },
        );
        assert_eq!(state.session_id.0, "durable-9");
    }
}
