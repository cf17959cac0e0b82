// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Websocket implementation of the push feed.
//!
//! Opens one websocket per subscription, sends a JSON subscribe frame naming
//! the channel and negotiation filter, and yields decoded [`PushEvent`]s.
//! Undecodable text frames are skipped. A close frame ends the stream; a
//! transport failure surfaces as one `Err` item and ends the stream.
//! Reconnection policy belongs to the bridge that owns the subscription.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use rfqsync_core::error::RfqError;
use rfqsync_core::traits::{EventFeed, PushStream};
use rfqsync_core::types::PushEvent;

/// Websocket-backed change feed client.
#[derive(Debug, Clone)]
pub struct WsEventFeed {
    endpoint: String,
}

impl WsEventFeed {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl EventFeed for WsEventFeed {
    async fn subscribe(
        &self,
        channel: &str,
        negotiation_id: &str,
    ) -> Result<PushStream, RfqError> {
        let (ws, _response) = connect_async(self.endpoint.as_str()).await.map_err(|e| RfqError::Feed {
            message: format!("websocket connect failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let (mut write, mut read) = ws.split();

        let frame = json!({
            "action": "subscribe",
            "channel": channel,
            "negotiationId": negotiation_id,
        });
        write
            .send(Message::text(frame.to_string()))
            .await
            .map_err(|e| RfqError::Feed {
                message: format!("subscribe frame failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        info!(channel, negotiation_id, "push feed subscribed");

        Ok(Box::pin(async_stream::stream! {
            // The write half must outlive the reader or the server sees a
            // half-closed socket; moving it in keeps it alive.
            let _write = write;

            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<PushEvent>(text.as_str()) {
                            Ok(event) => yield Ok(event),
                            Err(e) => {
                                debug!(error = %e, "skipping undecodable feed frame");
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("push feed closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(RfqError::Feed {
                            message: format!("push feed read failed: {e}"),
                            source: Some(Box::new(e)),
                        });
                        break;
                    }
                }
            }
        }))
    }
}
