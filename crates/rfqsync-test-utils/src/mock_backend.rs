// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock quoting backend with scripted responses.
//!
//! Refresh results and exchange streams are popped from FIFO queues. An empty
//! queue yields benign defaults (an empty update, an immediately-finished
//! stream) so tests only script what they assert on.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rfqsync_core::error::RfqError;
use rfqsync_core::traits::{ExchangeStream, QuoteBackend};
use rfqsync_core::types::{
    ChatMessage, CreateNegotiationRequest, ExchangeEvent, NegotiationRef, NegotiationUpdate,
    SessionId,
};

type ExchangeItem = Result<ExchangeEvent, RfqError>;

enum ExchangeScript {
    /// Fixed events delivered immediately.
    Events(Vec<ExchangeItem>),
    /// Events delivered on demand through an [`ExchangeHandle`].
    Manual(mpsc::UnboundedReceiver<ExchangeItem>),
}

/// Feeds a manual exchange stream from test code.
pub struct ExchangeHandle {
    tx: mpsc::UnboundedSender<ExchangeItem>,
}

impl ExchangeHandle {
    /// Delivers one stream item.
    pub fn send(&self, item: ExchangeItem) {
        let _ = self.tx.send(item);
    }

    /// Ends the stream.
    pub fn close(self) {}
}

/// A scripted [`QuoteBackend`].
#[derive(Default)]
pub struct MockBackend {
    refreshes: Mutex<VecDeque<Result<NegotiationUpdate, RfqError>>>,
    exchanges: Mutex<VecDeque<ExchangeScript>>,
    history: Mutex<Vec<ChatMessage>>,
    refresh_count: AtomicUsize,
    exchange_count: AtomicUsize,
    confirmation_count: AtomicUsize,
    cancelled_negotiations: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of the next refresh call.
    pub fn push_refresh(&self, result: Result<NegotiationUpdate, RfqError>) {
        self.refreshes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(result);
    }

    /// Queues a fixed-event exchange stream for the next `start_exchange`.
    pub fn push_exchange(&self, events: Vec<ExchangeItem>) {
        self.exchanges
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(ExchangeScript::Events(events));
    }

    /// Queues a manually-driven exchange stream and returns its handle.
    pub fn manual_exchange(&self) -> ExchangeHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.exchanges
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(ExchangeScript::Manual(rx));
        ExchangeHandle { tx }
    }

    /// Sets the message history returned by `fetch_messages`.
    pub fn set_messages(&self, messages: Vec<ChatMessage>) {
        *self.history.lock().unwrap_or_else(|e| e.into_inner()) = messages;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_count.load(Ordering::SeqCst)
    }

    pub fn confirmations(&self) -> usize {
        self.confirmation_count.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled_negotiations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl QuoteBackend for MockBackend {
    async fn start_exchange(
        &self,
        _session_id: &SessionId,
        _message: &str,
        _cancel: CancellationToken,
    ) -> Result<ExchangeStream, RfqError> {
        self.exchange_count.fetch_add(1, Ordering::SeqCst);

        let script = self
            .exchanges
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        Ok(match script {
            Some(ExchangeScript::Events(events)) => Box::pin(stream::iter(events)),
            Some(ExchangeScript::Manual(rx)) => Box::pin(stream::unfold(rx, |mut rx| async {
                rx.recv().await.map(|item| (item, rx))
            })),
            None => Box::pin(stream::iter(vec![Ok(ExchangeEvent::Done(Box::new(
                NegotiationUpdate::default(),
            )))])),
        })
    }

    async fn refresh_negotiation(
        &self,
        negotiation_id: &str,
        cancel: CancellationToken,
    ) -> Result<NegotiationUpdate, RfqError> {
        if cancel.is_cancelled() {
            return Err(RfqError::Cancelled);
        }
        self.refresh_count.fetch_add(1, Ordering::SeqCst);

        let scripted = self
            .refreshes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(NegotiationUpdate {
                negotiation_id: Some(negotiation_id.to_string()),
                ..Default::default()
            }),
        }
    }

    async fn create_negotiation(
        &self,
        request: &CreateNegotiationRequest,
    ) -> Result<NegotiationRef, RfqError> {
        Ok(NegotiationRef {
            negotiation_id: format!("neg-for-{}", request.session_id.0),
            deep_link: None,
        })
    }

    async fn cancel_negotiation(&self, negotiation_id: &str) -> Result<(), RfqError> {
        self.cancelled_negotiations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(negotiation_id.to_string());
        Ok(())
    }

    async fn fetch_negotiation(
        &self,
        negotiation_id: &str,
    ) -> Result<NegotiationUpdate, RfqError> {
        Ok(NegotiationUpdate {
            negotiation_id: Some(negotiation_id.to_string()),
            ..Default::default()
        })
    }

    async fn fetch_messages(&self, _negotiation_id: &str) -> Result<Vec<ChatMessage>, RfqError> {
        Ok(self.history.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn persist_confirmation(
        &self,
        _negotiation_id: &str,
        _message: &ChatMessage,
    ) -> Result<(), RfqError> {
        self.confirmation_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resolve_session(&self, temporary_id: &SessionId) -> Result<SessionId, RfqError> {
        Ok(SessionId(format!("durable-{}", temporary_id.0)))
    }
}
