// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Crambot integration tests.
//!
//! Provides mock collaborators and a harness backed by a temp SQLite
//! database, so flows can be tested without Telegram, Gemini or the business
//! APIs.
//!
//! # Components
//!
//! - [`MockTransport`] - captures sends, edits and callback answers
//! - [`MockClassifier`] - returns queued intent results
//! - [`MockBusinessApi`] - records calls and replays scripted responses
//! - [`FailingKv`] - a distributed cache that is always down
//! - [`TestHarness`] - temp storage, in-memory KV and the mocks above

pub mod failing_kv;
pub mod harness;
pub mod mock_api;
pub mod mock_classifier;
pub mod mock_transport;

pub use failing_kv::FailingKv;
pub use harness::TestHarness;
pub use mock_api::MockBusinessApi;
pub use mock_classifier::MockClassifier;
pub use mock_transport::{MockTransport, SentMessage};
