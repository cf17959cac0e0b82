// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `watch` subcommand: drive one negotiation session and print engine
//! events until interrupted.

use std::sync::Arc;

use tracing::{info, warn};

use rfqsync_backend::{QuoteBackendClient, WsEventFeed};
use rfqsync_config::RfqsyncConfig;
use rfqsync_core::error::RfqError;
use rfqsync_core::types::SessionId;
use rfqsync_core::{EventFeed, QuoteBackend};
use rfqsync_engine::{EngineEvent, SessionEngine};

use crate::signal;

/// Runs a watch session until Ctrl-C.
///
/// With `--negotiation-id`, attaches to an existing negotiation. With
/// `--message`, starts a new exchange and follows wherever it leads.
pub async fn run(
    config: RfqsyncConfig,
    negotiation_id: Option<String>,
    message: Option<String>,
) -> Result<(), RfqError> {
    let backend: Arc<dyn QuoteBackend> = Arc::new(QuoteBackendClient::new(&config.backend)?);
    let feed: Option<Arc<dyn EventFeed>> = config
        .push
        .enabled
        .then(|| Arc::new(WsEventFeed::new(config.push.endpoint.clone())) as Arc<dyn EventFeed>);

    let (engine, mut events) = SessionEngine::new(backend, feed, config.polling.clone());
    let session = engine.open_session(SessionId(uuid::Uuid::new_v4().to_string()));

    match (&negotiation_id, &message) {
        (Some(negotiation), _) => {
            info!(negotiation_id = %negotiation, "attaching to negotiation");
            session.attach(negotiation).await?;
        }
        (None, Some(text)) => {
            info!("starting a new exchange");
            session.submit(text.clone()).await?;
        }
        (None, None) => {
            return Err(RfqError::Config(
                "watch needs either --negotiation-id or --message".into(),
            ));
        }
    }

    let shutdown = signal::install_signal_handler();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => report(&event),
                None => break,
            },
        }
    }

    session.close();
    info!("watch stopped");
    Ok(())
}

/// Prints one engine event as a log line.
fn report(event: &EngineEvent) {
    match event {
        EngineEvent::NewQuotes { negotiation_id, count } => {
            info!(
                negotiation_id = negotiation_id.as_deref().unwrap_or("unknown"),
                count, "new quotes received"
            );
        }
        EngineEvent::OfferStatusChanged { offer_id, from, to } => {
            info!(offer_id = %offer_id, from = %from, to = %to, "offer status changed");
        }
        EngineEvent::WorkflowAdvanced { status } => {
            info!(status = %status, step = status.step(), "workflow advanced");
        }
        EngineEvent::MessageAppended { message_id, origin } => {
            info!(message_id = %message_id, origin = %origin, "message appended");
        }
        EngineEvent::ConfirmationReceived { message_id, quote_id } => {
            info!(
                message_id = %message_id,
                quote_id = quote_id.as_deref().unwrap_or("unknown"),
                "confirmation received"
            );
        }
        EngineEvent::ConnectionChanged { status } => {
            info!(status = %status, "push connection status");
        }
        EngineEvent::PollBackedOff { consecutive_errors, next_interval } => {
            warn!(
                consecutive_errors,
                next_interval_secs = next_interval.as_secs(),
                "poll backing off; data may be stale"
            );
        }
        EngineEvent::StreamFailed { message } => {
            warn!(error = %message, "exchange stream failed");
        }
    }
}
