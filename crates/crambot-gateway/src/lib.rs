// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface of Crambot.
//!
//! Two kinds of callers reach the gateway:
//! - Telegram, which delivers updates to one webhook per bot persona.
//!   Deliveries are acknowledged at once and processed on the background
//!   task tracker.
//! - Operators, who queue broadcasts and mint bind codes through a small
//!   bearer-token API.
//!
//! `/health` and `/metrics` are public.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod webhook;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, router, serve};
