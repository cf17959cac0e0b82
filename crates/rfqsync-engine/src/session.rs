// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry and staleness guards.
//!
//! One session is active at a time. Activating a session cancels the previous
//! session's token (stream read, poller, and push subscription all run under
//! child tokens), and hands out [`SessionGuard`]s that every multi-step async
//! sequence must check at the moment a background await resolves: a user who
//! switches sessions mid-fetch must not have delayed results applied to the
//! wrong session.
//!
//! Guards compare activation epochs, not ids, so relinking a temporary id to
//! its durable one mid-flight does not strand the session's own in-flight
//! work.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use rfqsync_core::types::SessionId;

struct ActiveSession {
    id: SessionId,
    epoch: u64,
    cancel: CancellationToken,
}

/// Owns the active-session slot.
pub struct SessionRegistry {
    epoch_tx: watch::Sender<u64>,
    current: Mutex<Option<ActiveSession>>,
    next_epoch: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (epoch_tx, _) = watch::channel(0);
        Self {
            epoch_tx,
            current: Mutex::new(None),
            next_epoch: AtomicU64::new(1),
        }
    }

    /// Makes `id` the active session, tearing down the previous one.
    ///
    /// Returns the new session's guard and its cancellation token; all of the
    /// session's background activities must run as children of that token.
    pub fn activate(&self, id: SessionId) -> (SessionGuard, CancellationToken) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(previous) = current.take() {
            info!(session_id = %previous.id, "cancelling previous session activities");
            previous.cancel.cancel();
        }

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *current = Some(ActiveSession {
            id: id.clone(),
            epoch,
            cancel: cancel.clone(),
        });
        self.epoch_tx.send_replace(epoch);
        info!(session_id = %id, epoch, "session activated");

        (
            SessionGuard {
                id,
                epoch,
                active: self.epoch_tx.subscribe(),
            },
            cancel,
        )
    }

    /// Tears down the session a guard belongs to, if it is still active.
    ///
    /// Used when the user deletes/archives/cancels a session. Idempotent.
    pub fn deactivate(&self, guard: &SessionGuard) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(active) = current.as_ref()
            && active.epoch == guard.epoch
        {
            info!(session_id = %active.id, "session deactivated");
            active.cancel.cancel();
            *current = None;
            self.epoch_tx.send_replace(0);
        }
    }

    /// Replaces the active session's temporary id with its durable one.
    ///
    /// The epoch is unchanged: guards issued before the relink remain
    /// current, so in-flight work for the same logical session continues.
    pub fn relink_active(&self, durable_id: SessionId) -> bool {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        match current.as_mut() {
            Some(active) => {
                debug!(from = %active.id, to = %durable_id, "relinking active session");
                active.id = durable_id;
                true
            }
            None => false,
        }
    }

    /// The currently active session id, if any.
    pub fn active_id(&self) -> Option<SessionId> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|active| active.id.clone())
    }
}

/// Staleness guard captured by background work for one session.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    id: SessionId,
    epoch: u64,
    active: watch::Receiver<u64>,
}

impl SessionGuard {
    /// True while the owning session is still the active one. Checked at the
    /// moment a background await resolves, before any state write.
    pub fn is_current(&self) -> bool {
        *self.active.borrow() == self.epoch
    }

    /// The session id this guard was issued for (the temporary id when the
    /// guard predates a relink; used for naming and logging only).
    pub fn id(&self) -> &SessionId {
        &self.id
    }
}
