// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite durable store for the Crambot gateway.
//!
//! WAL-mode SQLite with embedded migrations, a single writer thread via
//! `tokio-rusqlite`, and one query module per stored entity. Terminal state
//! changes are conditional updates whose affected-row count decides the winner.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
