// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for quoting-backend exchange responses.
//!
//! Converts a reqwest response byte stream into typed [`ExchangeEvent`]s
//! using the `eventsource-stream` crate for SSE protocol compliance. The
//! stream is line-oriented `data: <json>` frames ending with a literal
//! `[DONE]` sentinel. Malformed frames are skipped, never fatal: a single bad
//! line must not abort an otherwise healthy stream.

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use eventsource_stream::Eventsource;
use rfqsync_core::error::RfqError;
use rfqsync_core::traits::ExchangeStream;
use rfqsync_core::types::ExchangeEvent;

use crate::summary::SummaryCollector;

/// Sentinel data line marking graceful end of stream.
pub const STREAM_TERMINATOR: &str = "[DONE]";

/// Parses a streaming response into a lazy, ordered sequence of
/// [`ExchangeEvent`]s.
///
/// On cancellation the consumer stops reading and the underlying response is
/// dropped; no further events are emitted. A transport failure mid-stream is
/// yielded as one `Err` item and ends the stream. If the server closes the
/// stream without the sentinel, the summary collected so far is still emitted
/// so previously received data is not lost.
pub fn parse_exchange_stream(
    response: reqwest::Response,
    cancel: CancellationToken,
) -> ExchangeStream {
    let frames = response.bytes_stream().eventsource();

    Box::pin(async_stream::stream! {
        let mut frames = std::pin::pin!(frames);
        let mut collector = SummaryCollector::new();

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("exchange stream cancelled, releasing reader");
                    return;
                }
                frame = frames.next() => frame,
            };

            match frame {
                None => break,
                Some(Err(e)) => {
                    yield Err(RfqError::Transport {
                        message: format!("exchange stream failed mid-read: {e}"),
                        source: None,
                    });
                    return;
                }
                Some(Ok(event)) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        continue;
                    }
                    if data == STREAM_TERMINATOR {
                        yield Ok(ExchangeEvent::Done(Box::new(collector.finish())));
                        return;
                    }
                    if let Some(parsed) = classify_frame(data, &mut collector) {
                        yield Ok(parsed);
                    }
                }
            }
        }

        // Stream ended without the sentinel. Emit what we collected.
        yield Ok(ExchangeEvent::Done(Box::new(collector.finish())));
    })
}

/// Classifies one data frame, updating the summary collector as a side
/// effect. Returns `None` for frames that produce no immediate event
/// (summary fragments, malformed or unknown frames).
fn classify_frame(data: &str, collector: &mut SummaryCollector) -> Option<ExchangeEvent> {
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "skipping malformed frame");
            return None;
        }
    };

    match value.get("type").and_then(Value::as_str) {
        Some("content") => {
            let text = value
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if text.is_empty() {
                return None;
            }
            collector.push_text(&text);
            Some(ExchangeEvent::ContentDelta { text })
        }
        Some("tool_result") => {
            let Some(name) = value.get("name").and_then(Value::as_str) else {
                debug!("skipping tool_result frame without a name");
                return None;
            };
            let result = value.get("result").cloned().unwrap_or(Value::Null);
            collector.observe_tool_result(name, &result);
            Some(ExchangeEvent::ToolResult {
                name: name.to_string(),
                result,
            })
        }
        Some(other) => {
            debug!(frame_type = other, "skipping frame with unknown type");
            None
        }
        // No discriminator: an end-of-stream summary fragment.
        None => {
            collector.fold_summary(&value);
            None
        }
    }
}
