// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The rfqsync reconciliation engine.
//!
//! Aggregates three asynchronous sources — the one-shot exchange stream, the
//! interval-driven poll, and the push event feed — into one consistent,
//! de-duplicated per-session view:
//!
//! - [`fingerprint`] / [`dedup`]: content- and semantic-identity suppression
//!   of repeated status narration.
//! - [`merge`]: monotonic entity merge for flight offers.
//! - [`state`] / [`store`]: the workflow state machine (pure reducer) and the
//!   single-consumer actor that runs it.
//! - [`poller`]: the adaptive polling scheduler.
//! - [`bridge`]: the push-event bridge.
//! - [`session`]: the session registry, cancellation, and staleness guards.
//!
//! [`SessionEngine`] wires these together; [`Session`] is the per-session
//! facade its owner drives.

pub mod bridge;
pub mod dedup;
pub mod events;
pub mod fingerprint;
pub mod merge;
pub mod poller;
pub mod session;
pub mod state;
pub mod store;

use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use rfqsync_config::model::PollingConfig;
use rfqsync_core::error::RfqError;
use rfqsync_core::extract;
use rfqsync_core::traits::ExchangeStream;
use rfqsync_core::types::{
    ConnectionStatus, ExchangeEvent, NegotiationUpdate, SessionId,
};
use rfqsync_core::{EventFeed, QuoteBackend};

pub use bridge::PushBridge;
pub use events::EngineEvent;
pub use poller::{PollHandle, PollPhase};
pub use session::{SessionGuard, SessionRegistry};
pub use state::{Action, IngestSource, WorkflowState};
pub use store::WorkflowStore;

/// Factory for sessions, owning the shared collaborators and the engine
/// event channel.
pub struct SessionEngine {
    backend: Arc<dyn QuoteBackend>,
    feed: Option<Arc<dyn EventFeed>>,
    registry: Arc<SessionRegistry>,
    polling: PollingConfig,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
}

impl SessionEngine {
    /// Creates the engine and hands back the notification receiver.
    pub fn new(
        backend: Arc<dyn QuoteBackend>,
        feed: Option<Arc<dyn EventFeed>>,
        polling: PollingConfig,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                backend,
                feed,
                registry: Arc::new(SessionRegistry::new()),
                polling,
                events_tx,
            },
            events_rx,
        )
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Opens a session and makes it the active one, tearing down whatever
    /// was active before.
    pub fn open_session(&self, session_id: SessionId) -> Arc<Session> {
        let (guard, cancel) = self.registry.activate(session_id.clone());
        let store = WorkflowStore::spawn(
            WorkflowState::new(session_id),
            self.events_tx.clone(),
            cancel.clone(),
        );

        Arc::new(Session {
            guard,
            cancel,
            store,
            backend: Arc::clone(&self.backend),
            feed: self.feed.clone(),
            registry: Arc::clone(&self.registry),
            polling: self.polling.clone(),
            events: self.events_tx.clone(),
            ingestion: Mutex::new(Ingestion::default()),
        })
    }
}

#[derive(Default)]
struct Ingestion {
    poll: Option<PollHandle>,
    poll_phase: Option<watch::Receiver<PollPhase>>,
    bridge: Option<Arc<PushBridge>>,
}

/// One active negotiation session: the store plus its ingestion activities.
///
/// All three activities (stream read loop, poller, push subscription) run
/// under the session's cancellation token; switching the active session or
/// closing this one cancels them before anything new starts.
pub struct Session {
    guard: SessionGuard,
    cancel: CancellationToken,
    store: WorkflowStore,
    backend: Arc<dyn QuoteBackend>,
    feed: Option<Arc<dyn EventFeed>>,
    registry: Arc<SessionRegistry>,
    polling: PollingConfig,
    events: mpsc::UnboundedSender<EngineEvent>,
    ingestion: Mutex<Ingestion>,
}

impl Session {
    pub fn store(&self) -> &WorkflowStore {
        &self.store
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.store.snapshot()
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    /// Sends a user message and starts consuming the agent's streamed
    /// response in the background.
    pub async fn submit(self: &Arc<Self>, content: impl Into<String>) -> Result<(), RfqError> {
        let content = content.into();
        self.store.dispatch(Action::UserMessageSubmitted {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.clone(),
            at: Utc::now(),
        });

        let session_id = self.store.snapshot().session_id;
        let stream = match self
            .backend
            .start_exchange(&session_id, &content, self.cancel.child_token())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                if !e.is_cancellation() && self.guard.is_current() {
                    self.store.dispatch(Action::StreamFailed {
                        message: e.to_string(),
                    });
                }
                return Err(e);
            }
        };

        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.consume_exchange(stream).await;
        });
        Ok(())
    }

    /// Attaches to an existing negotiation: seeds linkage, loads the
    /// operator message history, and starts ingestion.
    pub async fn attach(self: &Arc<Self>, negotiation_id: &str) -> Result<(), RfqError> {
        self.store.dispatch(Action::ObservationArrived {
            source: IngestSource::Snapshot,
            at: Utc::now(),
            update: NegotiationUpdate {
                negotiation_id: Some(negotiation_id.to_string()),
                ..Default::default()
            },
        });

        let history = self.backend.fetch_messages(negotiation_id).await?;
        if self.guard.is_current() {
            for message in history {
                self.store.dispatch(Action::OperatorMessageReceived { message });
            }
        }

        self.ensure_ingestion(negotiation_id);
        Ok(())
    }

    /// Manual "poll now": one immediate refresh through the scheduler.
    pub fn poll_now(&self) {
        let ingestion = self.ingestion.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(poll) = &ingestion.poll {
            poll.refresh_now();
        } else {
            debug!("poll_now before ingestion started, ignored");
        }
    }

    /// Tears down and re-subscribes the push feed.
    pub fn reconnect_push(&self) {
        let ingestion = self.ingestion.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bridge) = &ingestion.bridge {
            bridge.reconnect();
        }
    }

    /// Push connection status, once ingestion has started.
    pub fn push_status(&self) -> Option<watch::Receiver<ConnectionStatus>> {
        let ingestion = self.ingestion.lock().unwrap_or_else(|e| e.into_inner());
        ingestion.bridge.as_ref().map(|bridge| bridge.status())
    }

    /// Poll scheduler phase, once ingestion has started.
    pub fn poll_phase(&self) -> Option<watch::Receiver<PollPhase>> {
        let ingestion = self.ingestion.lock().unwrap_or_else(|e| e.into_inner());
        ingestion.poll_phase.clone()
    }

    /// Toggles offer selection.
    pub fn select_offer(&self, offer_id: impl Into<String>, selected: bool) {
        self.store.dispatch(Action::OfferSelected {
            offer_id: offer_id.into(),
            selected,
        });
    }

    /// Stops every activity of this session. Idempotent.
    pub fn close(&self) {
        self.registry.deactivate(&self.guard);
    }

    /// Cancels the negotiation at the backend, then tears the session down.
    /// With no negotiation attached this is just a teardown.
    pub async fn cancel_negotiation(&self) -> Result<(), RfqError> {
        let negotiation_id = self.store.snapshot().negotiation_id;
        if let Some(negotiation_id) = negotiation_id {
            info!(negotiation_id = %negotiation_id, "cancelling negotiation");
            self.backend.cancel_negotiation(&negotiation_id).await?;
        }
        self.close();
        Ok(())
    }

    /// Drives the one-shot exchange stream into the store. Every write is
    /// gated on the staleness guard: a session switch mid-stream drops the
    /// remaining events instead of applying them to the wrong session.
    async fn consume_exchange(self: Arc<Self>, mut stream: ExchangeStream) {
        while let Some(item) = stream.next().await {
            if !self.guard.is_current() {
                debug!("session switched mid-stream, dropping remaining events");
                return;
            }

            match item {
                Ok(ExchangeEvent::ContentDelta { text }) => {
                    self.store.dispatch(Action::StreamDelta { text });
                }
                Ok(ExchangeEvent::ToolResult { name, result }) => {
                    self.store.dispatch(Action::ToolCallCompleted { name });

                    let offers = extract::offers_from_value(&result);
                    let quote_details = extract::quote_details_from_value(&result);
                    if !offers.is_empty() || !quote_details.is_empty() {
                        self.store.dispatch(Action::ObservationArrived {
                            source: IngestSource::Stream,
                            at: Utc::now(),
                            update: NegotiationUpdate {
                                offers,
                                quote_details,
                                ..Default::default()
                            },
                        });
                    }
                }
                Ok(ExchangeEvent::Done(update)) => {
                    let update = *update;

                    let durable = match update.durable_session_id.clone() {
                        Some(durable) => Some(durable),
                        // Summary carried no linkage; ask the backend to
                        // resolve the temporary id once a negotiation exists.
                        None if update.negotiation_id.is_some() => {
                            let temporary = self.store.snapshot().session_id;
                            match self.backend.resolve_session(&temporary).await {
                                Ok(resolved) if resolved != temporary => Some(resolved.0),
                                Ok(_) => None,
                                Err(e) => {
                                    debug!(error = %e, "session resolution failed, keeping temporary id");
                                    None
                                }
                            }
                        }
                        None => None,
                    };
                    if !self.guard.is_current() {
                        return;
                    }
                    if let Some(durable) = durable
                        && self.registry.relink_active(SessionId(durable.clone()))
                    {
                        self.store.dispatch(Action::SessionRelinked {
                            durable_id: SessionId(durable),
                        });
                    }

                    let negotiation = update.negotiation_id.clone();
                    self.store.dispatch(Action::StreamCompleted {
                        message_id: uuid::Uuid::new_v4().to_string(),
                        at: Utc::now(),
                        update,
                    });

                    if let Some(negotiation_id) = negotiation {
                        self.ensure_ingestion(&negotiation_id);
                    }
                }
                Err(e) if e.is_cancellation() => return,
                Err(e) => {
                    self.store.dispatch(Action::StreamFailed {
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    /// Starts the poller and the push bridge once a negotiation id is known.
    /// Safe to call repeatedly; only the first call per session starts them.
    fn ensure_ingestion(self: &Arc<Self>, negotiation_id: &str) {
        let mut ingestion = self.ingestion.lock().unwrap_or_else(|e| e.into_inner());

        if ingestion.poll.is_none() {
            info!(
                session_id = %self.guard.id(),
                negotiation_id,
                "starting polling scheduler"
            );
            let (handle, phase) = poller::spawn(
                Arc::clone(&self.backend),
                self.store.clone(),
                self.guard.clone(),
                self.polling.clone(),
                self.events.clone(),
                self.cancel.clone(),
            );
            // Initial fetch goes through the same single-fetch path as every
            // later refresh, once the linkage dispatch has landed.
            let store = self.store.clone();
            let initial = handle.clone();
            tokio::spawn(async move {
                let mut watcher = store.watch();
                loop {
                    if watcher.borrow_and_update().negotiation_id.is_some() {
                        break;
                    }
                    if watcher.changed().await.is_err() {
                        return;
                    }
                }
                initial.refresh_now();
            });
            ingestion.poll = Some(handle);
            ingestion.poll_phase = Some(phase);
        }

        if ingestion.bridge.is_none()
            && let (Some(feed), Some(poll)) = (self.feed.clone(), ingestion.poll.clone())
        {
            info!(
                session_id = %self.guard.id(),
                negotiation_id,
                "starting push bridge"
            );
            let bridge = Arc::new(PushBridge::new(
                feed,
                Arc::clone(&self.backend),
                self.store.clone(),
                poll,
                self.guard.clone(),
                self.events.clone(),
                self.cancel.clone(),
                negotiation_id.to_string(),
            ));
            bridge.connect();
            ingestion.bridge = Some(bridge);
        }
    }
}
