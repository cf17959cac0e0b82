// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folds exchange-stream events into one [`NegotiationUpdate`].
//!
//! The collector accumulates narrative text, the latest canonical offer list,
//! quote details, and session-linkage identifiers as they appear. A later
//! offer list from the same stream supersedes an earlier one wholesale — the
//! second retrieval is the richer truth, not something to union with stale
//! entries.

use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use rfqsync_core::error::RfqError;
use rfqsync_core::extract;
use rfqsync_core::traits::ExchangeStream;
use rfqsync_core::types::{ExchangeEvent, NegotiationUpdate, QuoteDetail};

/// Accumulates stream events into a terminal summary.
#[derive(Debug, Default)]
pub struct SummaryCollector {
    text: String,
    update: NegotiationUpdate,
}

impl SummaryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends incremental agent text.
    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Records offers and details found in a tool-call result.
    pub fn observe_tool_result(&mut self, name: &str, result: &Value) {
        let offers = extract::offers_from_value(result);
        if !offers.is_empty() {
            debug!(tool = name, count = offers.len(), "tool result carries offer list");
            self.update.offers = offers;
        }
        self.merge_details(extract::quote_details_from_value(result));
    }

    /// Folds a terminal summary object (a frame with no `type` discriminator).
    pub fn fold_summary(&mut self, value: &Value) {
        let offers = extract::offers_from_value(value);
        if !offers.is_empty() {
            self.update.offers = offers;
        }
        self.merge_details(extract::quote_details_from_value(value));

        if let Some(trip) = value.get("tripData") {
            if self.update.negotiation_id.is_none() {
                self.update.negotiation_id = string_at(trip, &["tripId", "id"]);
            }
            if self.update.deep_link.is_none() {
                self.update.deep_link = string_at(trip, &["deepLink", "deep_link"]);
            }
        }
        if let Some(rfp) = value.get("rfpData") {
            if self.update.negotiation_id.is_none() {
                self.update.negotiation_id = string_at(rfp, &["rfpId", "id"]);
            }
            if self.update.deep_link.is_none() {
                self.update.deep_link = string_at(rfp, &["deepLink", "deep_link"]);
            }
        }
        if self.update.durable_session_id.is_none() {
            self.update.durable_session_id = string_at(value, &["sessionId", "chatSessionId"]);
        }
    }

    /// Consumes the collector, producing the final summary.
    pub fn finish(mut self) -> NegotiationUpdate {
        if !self.text.is_empty() {
            self.update.narrative = Some(self.text);
        }
        self.update
    }

    fn merge_details(&mut self, details: Vec<QuoteDetail>) {
        for detail in details {
            match self
                .update
                .quote_details
                .iter_mut()
                .find(|d| d.quote_id == detail.quote_id)
            {
                Some(existing) => *existing = detail,
                None => self.update.quote_details.push(detail),
            }
        }
    }
}

fn string_at(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// Drains an exchange stream and returns its terminal summary.
///
/// Used by the refresh path, where only the collected observation matters.
/// A stream that ends without a terminal summary was cancelled mid-read.
pub async fn collect_update(mut stream: ExchangeStream) -> Result<NegotiationUpdate, RfqError> {
    while let Some(event) = stream.next().await {
        match event? {
            ExchangeEvent::Done(update) => return Ok(*update),
            ExchangeEvent::ContentDelta { .. } | ExchangeEvent::ToolResult { .. } => {}
        }
    }
    Err(RfqError::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use rfqsync_core::types::OfferStatus;
    use serde_json::json;

    #[test]
    fn later_offer_list_supersedes_earlier() {
        let mut collector = SummaryCollector::new();
        collector.observe_tool_result(
            "get_rfq_quotes",
            &json!({"quotes": [{"quoteId": "q-1", "status": "sent"}]}),
        );
        collector.observe_tool_result(
            "get_rfq_quotes",
            &json!({"quotes": [
                {"quoteId": "q-1", "sellPrice": 4000.0, "currency": "USD", "status": "quoted"},
                {"quoteId": "q-2", "status": "sent"}
            ]}),
        );

        let update = collector.finish();
        assert_eq!(update.offers.len(), 2);
        let q1 = update.offers.iter().find(|o| o.id == "q-1").unwrap();
        assert_eq!(q1.status, OfferStatus::Quoted);
        assert_eq!(q1.price, Some(4000.0));
    }

    #[test]
    fn summary_object_carries_linkage() {
        let mut collector = SummaryCollector::new();
        collector.push_text("Your request is underway.");
        collector.fold_summary(&json!({
            "tripData": {"tripId": "trip-42", "deepLink": "https://marketplace.example/trip-42"},
            "sessionId": "durable-7"
        }));

        let update = collector.finish();
        assert_eq!(update.negotiation_id.as_deref(), Some("trip-42"));
        assert_eq!(
            update.deep_link.as_deref(),
            Some("https://marketplace.example/trip-42")
        );
        assert_eq!(update.durable_session_id.as_deref(), Some("durable-7"));
        assert_eq!(update.narrative.as_deref(), Some("Your request is underway."));
    }

    #[test]
    fn rfp_data_fills_missing_negotiation_id() {
        let mut collector = SummaryCollector::new();
        collector.fold_summary(&json!({"rfpData": {"rfpId": "rfp-9"}}));
        assert_eq!(collector.finish().negotiation_id.as_deref(), Some("rfp-9"));
    }

    #[test]
    fn details_keep_richest_entry_per_quote() {
        let mut collector = SummaryCollector::new();
        collector.observe_tool_result(
            "get_quote_details",
            &json!({"quoteDetails": {"q-1": {"currency": "USD"}}}),
        );
        collector.observe_tool_result(
            "get_quote_details",
            &json!({"quoteDetails": {"q-1": {"sellPrice": 900.0, "currency": "USD"}}}),
        );

        let update = collector.finish();
        assert_eq!(update.quote_details.len(), 1);
        assert_eq!(update.quote_details[0].price, Some(900.0));
    }

    #[tokio::test]
    async fn collect_update_returns_terminal_summary() {
        let done = NegotiationUpdate {
            negotiation_id: Some("neg-1".into()),
            ..Default::default()
        };
        let events: Vec<Result<ExchangeEvent, RfqError>> = vec![
            Ok(ExchangeEvent::ContentDelta { text: "Checking".into() }),
            Ok(ExchangeEvent::Done(Box::new(done))),
        ];
        let stream: ExchangeStream = Box::pin(stream::iter(events));

        let update = collect_update(stream).await.unwrap();
        assert_eq!(update.negotiation_id.as_deref(), Some("neg-1"));
    }

    #[tokio::test]
    async fn collect_update_propagates_transport_error() {
        let events: Vec<Result<ExchangeEvent, RfqError>> = vec![Err(RfqError::Transport {
            message: "reset".into(),
            source: None,
        })];
        let stream: ExchangeStream = Box::pin(stream::iter(events));

        let err = collect_update(stream).await.unwrap_err();
        assert!(matches!(err, RfqError::Transport { .. }));
    }

    #[tokio::test]
    async fn collect_update_without_done_is_cancellation() {
        let stream: ExchangeStream = Box::pin(stream::iter(Vec::new()));
        let err = collect_update(stream).await.unwrap_err();
        assert!(err.is_cancellation());
    }
}
