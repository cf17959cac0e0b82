// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quoting-backend integration for rfqsync.
//!
//! This crate owns everything that touches the wire:
//! - [`sse`]: the exchange stream parser (line-oriented `data:` frames,
//!   `[DONE]` terminator, malformed frames skipped).
//! - [`summary`]: folding stream events into one observation batch.
//! - [`client`]: the reqwest client implementing [`rfqsync_core::QuoteBackend`]
//!   (exchange, refresh, and collaborator REST operations).
//! - [`feed`]: the websocket implementation of [`rfqsync_core::EventFeed`].

pub mod client;
pub mod feed;
pub mod sse;
pub mod summary;
mod types;

pub use client::QuoteBackendClient;
pub use feed::WsEventFeed;
pub use sse::{STREAM_TERMINATOR, parse_exchange_stream};
pub use summary::{SummaryCollector, collect_update};
