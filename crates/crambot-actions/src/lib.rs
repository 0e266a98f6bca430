// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confirmation gate for write intents.
//!
//! A write intent becomes a durable [`PendingAction`] and a prompt with
//! confirm and cancel buttons. The downstream call runs only after the
//! `pending -> confirmed` compare-and-transition succeeds.
//!
//! [`PendingAction`]: crambot_core::types::PendingAction

pub mod manager;

pub use manager::{ConfirmManager, ConfirmOutcome, Decision, NewAction, parse_callback};
