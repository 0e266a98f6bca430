// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram support for the Crambot gateway.
//!
//! [`update`] normalizes webhook payloads into unified messages and
//! [`TelegramTransport`] delivers replies through the Bot API via teloxide.

pub mod retry;
pub mod transport;
pub mod update;

pub use transport::TelegramTransport;
pub use update::{TelegramUpdate, parse_update};
