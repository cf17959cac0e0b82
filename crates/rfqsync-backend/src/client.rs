// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the quoting backend.
//!
//! Provides [`QuoteBackendClient`] which handles request construction,
//! authentication, streaming exchange responses, and transient error retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rfqsync_config::model::BackendConfig;
use rfqsync_core::error::RfqError;
use rfqsync_core::traits::{ExchangeStream, QuoteBackend};
use rfqsync_core::types::{
    ChatMessage, CreateNegotiationRequest, NegotiationRef, NegotiationUpdate, SessionId,
};
use rfqsync_core::extract;

use crate::sse;
use crate::summary;
use crate::types::{ApiErrorResponse, WireNegotiationRef, WireOperatorMessage, WireSessionRef};

/// HTTP client for quoting-backend communication.
///
/// Manages authentication headers and retry logic for transient errors
/// (429, 500, 503, 529). Streaming requests carry no transport timeout;
/// cancellation is the only way to bound them. Short request/response calls
/// use the configured timeout per request.
#[derive(Debug, Clone)]
pub struct QuoteBackendClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl QuoteBackendClient {
    /// Creates a new backend client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, RfqError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let value = format!("Bearer {api_key}");
            headers.insert(
                "authorization",
                HeaderValue::from_str(&value)
                    .map_err(|e| RfqError::Config(format!("invalid API key header value: {e}")))?,
            );
        }
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RfqError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: 1,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Probes backend reachability.
    pub async fn health_check(&self) -> Result<(), RfqError> {
        let url = format!("{}/v1/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RfqError::transport(format!("health check failed: {e}"), e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(RfqError::Transport {
                message: format!("health check returned {}", response.status()),
                source: None,
            })
        }
    }

    /// Sends a request, retrying once after a short delay on transient
    /// statuses, and returns the successful response.
    ///
    /// `streaming` requests get no transport timeout; cancellation bounds them.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
        streaming: bool,
    ) -> Result<reqwest::Response, RfqError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying backend request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let mut request = build();
            if !streaming {
                request = request.timeout(self.timeout);
            }

            let response = request.send().await.map_err(|e| RfqError::Transport {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

            let status = response.status();
            debug!(status = %status, attempt, "backend response received");

            if status.is_success() {
                return Ok(response);
            }

            if is_transient_status(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(status_error(status, &body));
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        Err(last_error.unwrap_or_else(|| RfqError::Transport {
            message: "backend request failed after retries".into(),
            source: None,
        }))
    }

    /// Starts a streaming request, honoring cancellation while connecting.
    async fn open_stream(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, RfqError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RfqError::Cancelled),
            response = self.send_with_retry(build, true) => response,
        }
    }
}

#[async_trait]
impl QuoteBackend for QuoteBackendClient {
    async fn start_exchange(
        &self,
        session_id: &SessionId,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<ExchangeStream, RfqError> {
        let url = format!("{}/v1/exchanges", self.base_url);
        let body = json!({"sessionId": session_id.0, "message": message});

        let response = self
            .open_stream(|| self.client.post(&url).json(&body), &cancel)
            .await?;

        Ok(sse::parse_exchange_stream(response, cancel))
    }

    async fn refresh_negotiation(
        &self,
        negotiation_id: &str,
        cancel: CancellationToken,
    ) -> Result<NegotiationUpdate, RfqError> {
        let url = format!("{}/v1/negotiations/{negotiation_id}/refresh", self.base_url);

        let response = self.open_stream(|| self.client.get(&url), &cancel).await?;
        let stream = sse::parse_exchange_stream(response, cancel);
        let mut update = summary::collect_update(stream).await?;

        // Refreshes are already keyed by negotiation; fill it in when the
        // stream did not repeat it.
        update.negotiation_id.get_or_insert_with(|| negotiation_id.to_string());
        Ok(update)
    }

    async fn create_negotiation(
        &self,
        request: &CreateNegotiationRequest,
    ) -> Result<NegotiationRef, RfqError> {
        let url = format!("{}/v1/negotiations", self.base_url);
        let body = json!({
            "sessionId": request.session_id.0,
            "departure": request.departure,
            "arrival": request.arrival,
            "departureDate": request.departure_date,
            "passengers": request.passengers,
        });

        let response = self
            .send_with_retry(|| self.client.post(&url).json(&body), false)
            .await?;
        let wire: WireNegotiationRef = decode_json(response).await?;
        Ok(wire.into())
    }

    async fn cancel_negotiation(&self, negotiation_id: &str) -> Result<(), RfqError> {
        let url = format!("{}/v1/negotiations/{negotiation_id}", self.base_url);
        self.send_with_retry(|| self.client.delete(&url), false)
            .await?;
        Ok(())
    }

    async fn fetch_negotiation(
        &self,
        negotiation_id: &str,
    ) -> Result<NegotiationUpdate, RfqError> {
        let url = format!("{}/v1/negotiations/{negotiation_id}", self.base_url);

        let response = self.send_with_retry(|| self.client.get(&url), false).await?;
        let value: serde_json::Value = decode_json(response).await?;

        Ok(NegotiationUpdate {
            negotiation_id: Some(negotiation_id.to_string()),
            offers: extract::offers_from_value(&value),
            quote_details: extract::quote_details_from_value(&value),
            ..Default::default()
        })
    }

    async fn fetch_messages(&self, negotiation_id: &str) -> Result<Vec<ChatMessage>, RfqError> {
        let url = format!("{}/v1/negotiations/{negotiation_id}/messages", self.base_url);

        let response = self.send_with_retry(|| self.client.get(&url), false).await?;
        let wire: Vec<WireOperatorMessage> = decode_json(response).await?;
        Ok(wire.into_iter().map(WireOperatorMessage::into_message).collect())
    }

    async fn persist_confirmation(
        &self,
        negotiation_id: &str,
        message: &ChatMessage,
    ) -> Result<(), RfqError> {
        let url = format!(
            "{}/v1/negotiations/{negotiation_id}/confirmation",
            self.base_url
        );
        let body = json!({
            "messageId": message.id,
            "content": message.content,
            "payload": message.confirmation,
        });

        self.send_with_retry(|| self.client.post(&url).json(&body), false)
            .await?;
        Ok(())
    }

    async fn resolve_session(&self, temporary_id: &SessionId) -> Result<SessionId, RfqError> {
        let url = format!("{}/v1/sessions/{}/resolve", self.base_url, temporary_id.0);

        let response = self.send_with_retry(|| self.client.post(&url), false).await?;
        let wire: WireSessionRef = decode_json(response).await?;
        Ok(SessionId(wire.session_id))
    }
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RfqError> {
    let body = response.text().await.map_err(|e| RfqError::Transport {
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| RfqError::Parse {
        message: format!("failed to decode backend response: {e}"),
    })
}

/// Builds the error for a non-success status, decoding the API error body
/// when possible. 429 maps to rate limiting so callers escalate backoff
/// instead of surfacing a failure.
fn status_error(status: StatusCode, body: &str) -> RfqError {
    let detail = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => match api_err.error.code {
            Some(code) => format!("{code}: {}", api_err.error.message),
            None => api_err.error.message,
        },
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => format!("{status}: {body}"),
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        RfqError::RateLimited { message: detail }
    } else {
        RfqError::Transport {
            message: format!("backend returned {detail}"),
            source: None,
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}
