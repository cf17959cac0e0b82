// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push-event bridge.
//!
//! Subscribes to the server-side change feed on one channel per active
//! session (named by the session id, so switching sessions never
//! cross-delivers) and translates raw events into the same shapes the other
//! ingestion paths use:
//!
//! - `seller_response` carries a quote id and delegates a refresh to the
//!   polling scheduler's single-fetch path — the bridge never fetches itself,
//!   so there is no second merge code path.
//! - `chat` (from either party) becomes an operator [`ChatMessage`] tagged
//!   with its quote id and merged into the session's message list.
//! - Unknown event kinds are logged and ignored, never fatal.
//!
//! Feed failures set the connection status to `error` and never propagate
//! past the bridge; `reconnect()` tears down and re-subscribes,
//! `disconnect()` is idempotent.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rfqsync_core::types::{
    ChatMessage, ConnectionStatus, MessageOrigin, OperatorMessageKind, PushEvent,
};
use rfqsync_core::{EventFeed, QuoteBackend};

use crate::events::EngineEvent;
use crate::poller::PollHandle;
use crate::session::SessionGuard;
use crate::state::Action;
use crate::store::WorkflowStore;

/// One session's push subscription.
pub struct PushBridge {
    feed: Arc<dyn EventFeed>,
    backend: Arc<dyn QuoteBackend>,
    store: WorkflowStore,
    poll: PollHandle,
    guard: SessionGuard,
    events: mpsc::UnboundedSender<EngineEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
    session_cancel: CancellationToken,
    /// Token of the current subscription task, if any.
    connection: Mutex<Option<CancellationToken>>,
    channel: String,
    negotiation_id: String,
}

impl PushBridge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        feed: Arc<dyn EventFeed>,
        backend: Arc<dyn QuoteBackend>,
        store: WorkflowStore,
        poll: PollHandle,
        guard: SessionGuard,
        events: mpsc::UnboundedSender<EngineEvent>,
        session_cancel: CancellationToken,
        negotiation_id: String,
    ) -> Self {
        let channel = format!("session:{}", guard.id());
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            feed,
            backend,
            store,
            poll,
            guard,
            events,
            status_tx,
            session_cancel,
            connection: Mutex::new(None),
            channel,
            negotiation_id,
        }
    }

    /// Current connection status, as a watch receiver.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Opens the subscription and starts pumping events in the background.
    pub fn connect(self: &Arc<Self>) {
        let token = self.session_cancel.child_token();
        {
            let mut slot = self.connection.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = slot.replace(token.clone()) {
                previous.cancel();
            }
        }

        self.set_status(ConnectionStatus::Connecting);
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            bridge.run_subscription(token).await;
        });
    }

    /// Tears down the subscription and re-subscribes.
    pub fn reconnect(self: &Arc<Self>) {
        info!(channel = %self.channel, "reconnecting push feed");
        self.disconnect();
        self.connect();
    }

    /// Closes the subscription. Safe to call repeatedly.
    pub fn disconnect(&self) {
        let token = self
            .connection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(token) = token {
            token.cancel();
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    async fn run_subscription(&self, token: CancellationToken) {
        let mut stream = match self.feed.subscribe(&self.channel, &self.negotiation_id).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    session_id = %self.guard.id(),
                    negotiation_id = %self.negotiation_id,
                    error = %e,
                    "push feed subscription failed"
                );
                self.set_status(ConnectionStatus::Error);
                return;
            }
        };

        self.set_status(ConnectionStatus::Connected);

        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.set_status(ConnectionStatus::Disconnected);
                    return;
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(event)) => self.handle_event(event),
                Some(Err(e)) => {
                    warn!(
                        session_id = %self.guard.id(),
                        negotiation_id = %self.negotiation_id,
                        error = %e,
                        "push feed error"
                    );
                    self.set_status(ConnectionStatus::Error);
                    return;
                }
                None => {
                    debug!(channel = %self.channel, "push feed ended");
                    self.set_status(ConnectionStatus::Disconnected);
                    return;
                }
            }
        }
    }

    fn handle_event(&self, event: PushEvent) {
        if !self.guard.is_current() {
            debug!(event_type = %event.event_type, "push event for inactive session dropped");
            return;
        }

        match event.event_type.as_str() {
            "seller_response" => {
                let quote_id = string_at(&event.payload, &["quoteId", "quote_id"]);
                info!(
                    negotiation_id = %self.negotiation_id,
                    quote_id = quote_id.as_deref().unwrap_or("unknown"),
                    "seller response, delegating refresh"
                );
                self.poll.refresh_now();
            }
            "chat" => {
                let message = chat_message_from_payload(&event.payload);
                if message.kind == Some(OperatorMessageKind::Confirmation) {
                    self.persist_confirmation(&message);
                }
                self.store
                    .dispatch(Action::OperatorMessageReceived { message });
            }
            other => {
                warn!(event_type = %other, "ignoring unknown push event kind");
            }
        }
    }

    /// Persists an arrived confirmation through the collaborator operation.
    /// Fire-and-forget: failures are logged, never surfaced.
    fn persist_confirmation(&self, message: &ChatMessage) {
        let backend = Arc::clone(&self.backend);
        let negotiation_id = self.negotiation_id.clone();
        let message = message.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.persist_confirmation(&negotiation_id, &message).await {
                warn!(
                    negotiation_id = %negotiation_id,
                    message_id = %message.id,
                    error = %e,
                    "failed to persist confirmation"
                );
            }
        });
    }

    fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            debug!(status = %status, channel = %self.channel, "push connection status");
            let _ = self.events.send(EngineEvent::ConnectionChanged { status });
        }
    }
}

/// Builds an operator message from a chat event payload.
fn chat_message_from_payload(payload: &Value) -> ChatMessage {
    let id = string_at(payload, &["id", "messageId"])
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let origin = match string_at(payload, &["sender"]).as_deref() {
        Some("user") | Some("buyer") => MessageOrigin::User,
        _ => MessageOrigin::Operator,
    };
    let content = string_at(payload, &["content", "message"]).unwrap_or_default();
    let timestamp = string_at(payload, &["timestamp", "createdAt"])
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut message = ChatMessage::new(id, origin, content, timestamp);
    message.quote_id = string_at(payload, &["quoteId", "quote_id"]);
    message.kind = Some(
        string_at(payload, &["kind"])
            .and_then(|k| k.parse::<OperatorMessageKind>().ok())
            .unwrap_or(OperatorMessageKind::Info),
    );
    message
}

fn string_at(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}
