// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for rfqsync engine tests.
//!
//! Provides mock collaborators for fast, deterministic, CI-runnable tests
//! without a real backend or feed:
//!
//! - [`MockBackend`] - scripted quoting backend (refreshes, exchange streams,
//!   failure injection, call counting)
//! - [`MockFeed`] - push feed driven by a [`FeedHandle`]

pub mod mock_backend;
pub mod mock_feed;

pub use mock_backend::{ExchangeHandle, MockBackend};
pub use mock_feed::{FeedHandle, MockFeed};
