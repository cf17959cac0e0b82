// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock push feed driven by a handle.
//!
//! Each `subscribe` call opens a fresh stream and replaces the previous one,
//! matching the one-channel-per-session contract. The [`FeedHandle`] injects
//! events and failures into the current subscription from test code.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;

use rfqsync_core::error::RfqError;
use rfqsync_core::traits::{EventFeed, PushStream};
use rfqsync_core::types::PushEvent;

type FeedItem = Result<PushEvent, RfqError>;

#[derive(Default)]
struct FeedState {
    current: Option<mpsc::UnboundedSender<FeedItem>>,
    subscriptions: usize,
}

/// A scripted [`EventFeed`].
pub struct MockFeed {
    state: Arc<Mutex<FeedState>>,
}

/// Injects events into the feed's current subscription.
#[derive(Clone)]
pub struct FeedHandle {
    state: Arc<Mutex<FeedState>>,
}

impl MockFeed {
    pub fn new() -> (Self, FeedHandle) {
        let state = Arc::new(Mutex::new(FeedState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            FeedHandle { state },
        )
    }
}

impl FeedHandle {
    /// Delivers one event to the current subscription, if any.
    pub fn push(&self, event: PushEvent) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = &state.current {
            let _ = tx.send(Ok(event));
        }
    }

    /// Delivers a failure; the bridge should transition to `error`.
    pub fn fail(&self, error: RfqError) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = &state.current {
            let _ = tx.send(Err(error));
        }
    }

    /// Closes the current subscription (server-side end of stream).
    pub fn close(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current
            .take();
    }

    /// Total number of `subscribe` calls seen.
    pub fn subscriptions(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscriptions
    }
}

#[async_trait]
impl EventFeed for MockFeed {
    async fn subscribe(
        &self,
        _channel: &str,
        _negotiation_id: &str,
    ) -> Result<PushStream, RfqError> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.current = Some(tx);
            state.subscriptions += 1;
        }
        Ok(Box::pin(stream::unfold(rx, |mut rx| async {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}
