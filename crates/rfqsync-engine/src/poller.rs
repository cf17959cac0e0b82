// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adaptive polling scheduler.
//!
//! Two explicit states: `idle` and `polling`. The scheduler polls only while
//! a negotiation id exists and at least one offer is in a non-terminal status
//! (`sent`/`unanswered`); once every offer reaches a terminal status it drops
//! back to idle within one tick. While idle it sleeps on store changes.
//!
//! One task runs the whole loop, so exactly one refresh is in flight at a
//! time by construction: an interval tick cannot fire while a refresh is
//! outstanding, and queued `RefreshNow` commands coalesce into the next pass.
//! Failures escalate the interval as `min(base * 2^errors, max_backoff)`
//! (floored at the configured minimum); one success resets it to baseline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rfqsync_config::model::PollingConfig;
use rfqsync_core::QuoteBackend;
use rfqsync_core::types::NegotiationUpdate;

use crate::events::EngineEvent;
use crate::session::SessionGuard;
use crate::state::{Action, IngestSource, WorkflowState};
use crate::store::WorkflowStore;

/// Commands accepted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCommand {
    /// Perform one refresh now (manual "poll now", or a push-delegated
    /// refresh), then resume the interval at its current length.
    RefreshNow,
}

/// Scheduler state, observable for staleness display and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Polling,
}

/// Handle for sending commands to a scheduler. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PollHandle {
    commands: mpsc::Sender<PollCommand>,
}

impl PollHandle {
    /// Requests an immediate refresh. A request arriving while one is
    /// already queued or in flight is dropped — one refresh at a time.
    pub fn refresh_now(&self) {
        if self.commands.try_send(PollCommand::RefreshNow).is_err() {
            debug!("refresh request dropped (scheduler busy or stopped)");
        }
    }
}

/// Spawns the scheduler task for one session.
pub fn spawn(
    backend: Arc<dyn QuoteBackend>,
    store: WorkflowStore,
    guard: SessionGuard,
    config: PollingConfig,
    events: mpsc::UnboundedSender<EngineEvent>,
    cancel: CancellationToken,
) -> (PollHandle, watch::Receiver<PollPhase>) {
    let (command_tx, command_rx) = mpsc::channel(1);
    let (phase_tx, phase_rx) = watch::channel(PollPhase::Idle);

    let scheduler = Scheduler {
        backend,
        store,
        guard,
        events,
        cancel,
        phase_tx,
        base: Duration::from_secs(config.base_interval_secs.max(1)),
        min: Duration::from_secs(config.min_interval_secs),
        cap: Duration::from_secs(config.max_backoff_secs.max(config.base_interval_secs)),
    };
    tokio::spawn(scheduler.run(command_rx));

    (PollHandle { commands: command_tx }, phase_rx)
}

/// Next interval after `errors` consecutive failures.
fn backoff_interval(base: Duration, errors: u32, min: Duration, cap: Duration) -> Duration {
    let factor = 1u64 << errors.min(16);
    let secs = base.as_secs().saturating_mul(factor).min(cap.as_secs());
    Duration::from_secs(secs).max(min)
}

struct Scheduler {
    backend: Arc<dyn QuoteBackend>,
    store: WorkflowStore,
    guard: SessionGuard,
    events: mpsc::UnboundedSender<EngineEvent>,
    cancel: CancellationToken,
    phase_tx: watch::Sender<PollPhase>,
    base: Duration,
    min: Duration,
    cap: Duration,
}

impl Scheduler {
    async fn run(self, mut commands: mpsc::Receiver<PollCommand>) {
        let mut snapshots = self.store.watch();
        let mut errors: u32 = 0;
        let mut interval = self.base;
        let mut polling = false;
        let mut next_tick = tokio::time::Instant::now() + interval;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            // The watch ref must drop before any await below.
            let target = {
                let snapshot = snapshots.borrow_and_update();
                poll_target(&snapshot)
            };

            match target {
                Some(negotiation_id) => {
                    if !polling {
                        polling = true;
                        self.set_phase(PollPhase::Polling);
                        next_tick = tokio::time::Instant::now() + interval;
                    }
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        command = commands.recv() => match command {
                            Some(PollCommand::RefreshNow) => {
                                // Manual refresh pauses the tick timer and
                                // resumes at the current interval.
                                self.refresh(&negotiation_id, &mut errors, &mut interval).await;
                                next_tick = tokio::time::Instant::now() + interval;
                            }
                            None => break,
                        },
                        // Re-evaluate the stop condition on state changes;
                        // the tick deadline stands, so wakeups don't drift it.
                        changed = snapshots.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep_until(next_tick) => {
                            self.refresh(&negotiation_id, &mut errors, &mut interval).await;
                            next_tick = tokio::time::Instant::now() + interval;
                        }
                    }
                }
                None => {
                    polling = false;
                    self.set_phase(PollPhase::Idle);
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        command = commands.recv() => match command {
                            Some(PollCommand::RefreshNow) => {
                                // Manual/delegated refreshes work while idle
                                // too; this is also the initial-fetch path.
                                let target = self.store.snapshot().negotiation_id;
                                if let Some(negotiation_id) = target {
                                    self.refresh(&negotiation_id, &mut errors, &mut interval).await;
                                } else {
                                    debug!("refresh requested before a negotiation exists");
                                }
                            }
                            None => break,
                        },
                        changed = snapshots.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        debug!(session_id = %self.guard.id(), "poll scheduler stopped");
    }

    async fn refresh(&self, negotiation_id: &str, errors: &mut u32, interval: &mut Duration) {
        debug!(negotiation_id, "refreshing negotiation state");

        let result = self
            .backend
            .refresh_negotiation(negotiation_id, self.cancel.child_token())
            .await;

        match result {
            Ok(update) => {
                if !self.guard.is_current() {
                    debug!(negotiation_id, "session switched mid-refresh, dropping result");
                    return;
                }
                self.dispatch_update(update);
                if *errors > 0 {
                    info!(negotiation_id, "refresh recovered, interval reset");
                }
                *errors = 0;
                *interval = self.base;
            }
            Err(e) if e.is_cancellation() => {
                debug!(negotiation_id, "refresh cancelled");
            }
            Err(e) => {
                *errors += 1;
                *interval = backoff_interval(self.base, *errors, self.min, self.cap);
                warn!(
                    session_id = %self.guard.id(),
                    negotiation_id,
                    error = %e,
                    consecutive_errors = *errors,
                    next_interval_secs = interval.as_secs(),
                    "refresh failed, backing off"
                );
                let _ = self.events.send(EngineEvent::PollBackedOff {
                    consecutive_errors: *errors,
                    next_interval: *interval,
                });
            }
        }
    }

    fn dispatch_update(&self, update: NegotiationUpdate) {
        if update.is_empty() {
            return;
        }
        self.store.dispatch(Action::ObservationArrived {
            source: IngestSource::Poll,
            at: Utc::now(),
            update,
        });
    }

    fn set_phase(&self, phase: PollPhase) {
        self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                debug!(?phase, "poll scheduler phase change");
                *current = phase;
                true
            }
        });
    }
}

/// The negotiation to poll, when polling is warranted: a negotiation id
/// exists and at least one offer is still non-terminal.
fn poll_target(state: &WorkflowState) -> Option<String> {
    let negotiation_id = state.negotiation_id.as_ref()?;
    if state.offers.iter().any(|offer| !offer.status.is_terminal()) {
        Some(negotiation_id.clone())
    } else {
        None
    }
}
