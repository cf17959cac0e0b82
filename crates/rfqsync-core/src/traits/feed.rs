// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push-feed trait: a filtered server-side change subscription.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::RfqError;
use crate::types::PushEvent;

/// Lazy sequence of inbound push events. The stream ends when the server
/// closes the channel; a transport failure surfaces as one `Err` item
/// followed by the end of the stream.
pub type PushStream = Pin<Box<dyn Stream<Item = Result<PushEvent, RfqError>> + Send>>;

/// A push-based change feed filtered by negotiation.
///
/// One subscription per active session; the channel is named by session id so
/// switching sessions never cross-delivers events. Reconnection policy
/// belongs to the subscriber (the bridge), not the feed.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Opens a filtered subscription.
    async fn subscribe(
        &self,
        channel: &str,
        negotiation_id: &str,
    ) -> Result<PushStream, RfqError>;
}
