// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable request/decision correlation between the two bot personas.

pub mod bridge;

pub use bridge::{CrossBotBridge, Transports, parse_decision};
