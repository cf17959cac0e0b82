// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The store actor: a single-consumer queue around the pure reducer.
//!
//! All three ingestion paths dispatch actions onto one unbounded channel; a
//! single task owns the state and applies [`crate::state::reduce`] to each
//! action in arrival order. Every mutation is therefore one atomic transition
//! even though the triggering I/O is asynchronous — interleaved writers can
//! never observe or produce a half-applied update. Snapshots publish on a
//! watch channel; notifications on an mpsc channel.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::EngineEvent;
use crate::state::{Action, WorkflowState, reduce};

/// Handle to a running store actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    actions: mpsc::UnboundedSender<Action>,
    snapshot: watch::Receiver<WorkflowState>,
}

impl WorkflowStore {
    /// Spawns the actor task for one session.
    ///
    /// The actor stops when the session's cancellation token fires or every
    /// handle is dropped.
    pub fn spawn(
        initial: WorkflowState,
        events: mpsc::UnboundedSender<EngineEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
        let (snapshot_tx, snapshot_rx) = watch::channel(initial.clone());

        tokio::spawn(async move {
            let mut state = initial;
            loop {
                let action = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    action = action_rx.recv() => match action {
                        Some(action) => action,
                        None => break,
                    },
                };

                let (next, emitted) = reduce(state, action);
                state = next;
                snapshot_tx.send_replace(state.clone());
                for event in emitted {
                    // Receiver may be gone during teardown; not an error.
                    let _ = events.send(event);
                }
            }
            debug!(session_id = %state.session_id, "workflow store stopped");
        });

        Self {
            actions: action_tx,
            snapshot: snapshot_rx,
        }
    }

    /// Enqueues one transition. Non-blocking; ordering is arrival order.
    pub fn dispatch(&self, action: Action) {
        if self.actions.send(action).is_err() {
            debug!("action dispatched after store stopped, dropped");
        }
    }

    /// Clone of the latest published state.
    pub fn snapshot(&self) -> WorkflowState {
        self.snapshot.borrow().clone()
    }

    /// A watch receiver for state changes.
    pub fn watch(&self) -> watch::Receiver<WorkflowState> {
        self.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rfqsync_core::types::SessionId;

    fn spawn_store() -> (WorkflowStore, mpsc::UnboundedReceiver<EngineEvent>, CancellationToken) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let store = WorkflowStore::spawn(
            WorkflowState::new(SessionId("s-1".into())),
            events_tx,
            cancel.clone(),
        );
        (store, events_rx, cancel)
    }

    #[tokio::test]
    async fn dispatch_applies_in_order() {
        let (store, _events, _cancel) = spawn_store();
        let mut watcher = store.watch();

        store.dispatch(Action::UserMessageSubmitted {
            id: "u-1".into(),
            content: "first".into(),
            at: Utc::now(),
        });
        store.dispatch(Action::UserMessageSubmitted {
            id: "u-2".into(),
            content: "second".into(),
            at: Utc::now(),
        });

        loop {
            watcher.changed().await.unwrap();
            if watcher.borrow().messages.len() == 2 {
                break;
            }
        }
        let state = store.snapshot();
        assert_eq!(state.messages[0].id, "u-1");
        assert_eq!(state.messages[1].id, "u-2");
    }

    #[tokio::test]
    async fn events_are_forwarded() {
        let (store, mut events, _cancel) = spawn_store();

        store.dispatch(Action::ToolCallCompleted {
            name: "search_aircraft".into(),
        });

        let event = events.recv().await.unwrap();
        assert!(matches!(event, EngineEvent::WorkflowAdvanced { .. }));
    }

    #[tokio::test]
    async fn cancellation_stops_the_actor() {
        let (store, _events, cancel) = spawn_store();
        cancel.cancel();

        // Give the actor a moment to observe the token, then dispatch into
        // the void; nothing should panic and state stays at its last value.
        tokio::task::yield_now().await;
        store.dispatch(Action::ToolCallCompleted {
            name: "search_aircraft".into(),
        });
        tokio::task::yield_now().await;
    }
}
