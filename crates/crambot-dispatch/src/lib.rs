// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent dispatch for the Crambot gateway.
//!
//! Holds the intent catalog and route table, the HTTP client for the
//! business APIs, the Gemini intent classifier, keyword rules for the
//! parent persona and the reply renderers.

pub mod calendar;
pub mod catalog;
pub mod client;
pub mod dispatcher;
pub mod gemini;
pub mod parent_rules;
pub mod render;
pub mod usage;

pub use catalog::{IntentKind, Route};
pub use client::BusinessApiClient;
pub use dispatcher::Dispatcher;
pub use gemini::{GeminiClassifier, classify_or_unknown};
