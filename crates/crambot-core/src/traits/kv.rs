// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distributed key-value cache trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CrambotError;

/// A low-latency key-value service shared by every instance.
///
/// Callers treat every error as a miss or as a reason to fall back; errors
/// from this trait never reach the end user.
#[async_trait]
pub trait DistributedCache: Send + Sync + 'static {
    /// Returns the value stored at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, CrambotError>;

    /// Stores `value` at `key`, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CrambotError>;

    /// Atomically increments the integer at `key` and returns the new value.
    ///
    /// `ttl` is armed whenever the key carries no expiry yet, in the same
    /// round trip as the increment. A key left without expiry by an earlier
    /// failure is therefore repaired by the next increment.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CrambotError>;

    /// Sets a time-to-live on an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CrambotError>;

    /// Removes `key`.
    async fn del(&self, key: &str) -> Result<(), CrambotError>;
}
