// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A distributed cache whose every call fails, for exercising fallbacks.

use std::time::Duration;

use async_trait::async_trait;
use crambot_core::{CrambotError, DistributedCache};

#[derive(Debug, Default, Clone, Copy)]
pub struct FailingKv;

fn down() -> CrambotError {
    CrambotError::cache("kv unavailable")
}

#[async_trait]
impl DistributedCache for FailingKv {
    async fn get(&self, _key: &str) -> Result<Option<String>, CrambotError> {
        Err(down())
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), CrambotError> {
        Err(down())
    }

    async fn incr(&self, _key: &str, _ttl: Duration) -> Result<i64, CrambotError> {
        Err(down())
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), CrambotError> {
        Err(down())
    }

    async fn del(&self, _key: &str) -> Result<(), CrambotError> {
        Err(down())
    }
}
