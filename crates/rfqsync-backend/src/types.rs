// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-level payload types for the quoting backend's REST endpoints.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use rfqsync_core::types::{ChatMessage, MessageOrigin, NegotiationRef, OperatorMessageKind};

/// Error body returned by the backend on non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Response body for negotiation creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNegotiationRef {
    pub negotiation_id: String,
    #[serde(default)]
    pub deep_link: Option<String>,
}

impl From<WireNegotiationRef> for NegotiationRef {
    fn from(wire: WireNegotiationRef) -> Self {
        NegotiationRef {
            negotiation_id: wire.negotiation_id,
            deep_link: wire.deep_link,
        }
    }
}

/// Response body for durable session resolution.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSessionRef {
    pub session_id: String,
}

/// One operator-channel message as stored by the backend.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOperatorMessage {
    pub id: String,
    #[serde(default)]
    pub quote_id: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl WireOperatorMessage {
    /// Converts the stored record into the engine's message shape.
    ///
    /// Unknown senders default to operator, unknown kinds to INFO, and a
    /// missing or unparseable timestamp falls back to the current time.
    pub fn into_message(self) -> ChatMessage {
        let origin = match self.sender.as_deref() {
            Some("user") | Some("buyer") => MessageOrigin::User,
            _ => MessageOrigin::Operator,
        };
        let kind = self
            .kind
            .as_deref()
            .and_then(|k| k.parse::<OperatorMessageKind>().ok())
            .unwrap_or(OperatorMessageKind::Info);
        let timestamp = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        let mut message = ChatMessage::new(self.id, origin, self.content, timestamp);
        message.quote_id = self.quote_id;
        message.kind = Some(kind);
        message
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            debug!(raw, error = %e, "unparseable message timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_message_conversion() {
        let wire = WireOperatorMessage {
            id: "om-1".into(),
            quote_id: Some("q-7".into()),
            sender: Some("operator".into()),
            kind: Some("RESPONSE".into()),
            content: "We can do 14:00 departure".into(),
            created_at: Some("2026-03-01T12:00:00Z".into()),
        };
        let msg = wire.into_message();
        assert_eq!(msg.origin, MessageOrigin::Operator);
        assert_eq!(msg.kind, Some(OperatorMessageKind::Response));
        assert_eq!(msg.quote_id.as_deref(), Some("q-7"));
        assert_eq!(msg.timestamp.to_rfc3339(), "2026-03-01T12:00:00+00:00");
    }

    #[test]
    fn unknown_kind_defaults_to_info() {
        let wire = WireOperatorMessage {
            id: "om-2".into(),
            quote_id: None,
            sender: Some("user".into()),
            kind: Some("SOMETHING_NEW".into()),
            content: "hi".into(),
            created_at: None,
        };
        let msg = wire.into_message();
        assert_eq!(msg.origin, MessageOrigin::User);
        assert_eq!(msg.kind, Some(OperatorMessageKind::Info));
    }

    #[test]
    fn api_error_decodes() {
        let body = r#"{"error":{"code":"not_found","message":"no such negotiation"}}"#;
        let err: ApiErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(err.error.code.as_deref(), Some("not_found"));
        assert_eq!(err.error.message, "no such negotiation");
    }
}
