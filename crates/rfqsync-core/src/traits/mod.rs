// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the engine's external collaborators.
//!
//! Both traits use `#[async_trait]` for dynamic dispatch compatibility: the
//! engine holds collaborators as trait objects so tests can substitute mocks.

pub mod backend;
pub mod feed;

pub use backend::{ExchangeStream, QuoteBackend};
pub use feed::{EventFeed, PushStream};
