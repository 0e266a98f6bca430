// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local key-value store with expiry.
//!
//! Suitable for single-instance deployments and tests; counters and cached
//! values are not shared with other processes.

use std::time::Duration;

use async_trait::async_trait;
use crambot_core::{CrambotError, DistributedCache};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryKv {
    slots: DashMap<String, Slot>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots.iter().filter(|s| s.live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DistributedCache for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CrambotError> {
        let now = Instant::now();
        let hit = self
            .slots
            .get(key)
            .filter(|s| s.live(now))
            .map(|s| s.value.clone());
        if hit.is_none() {
            self.slots.remove_if(key, |_, s| !s.live(now));
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CrambotError> {
        self.slots.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CrambotError> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if !slot.live(now) {
                    *slot = Slot {
                        value: "0".into(),
                        expires_at: None,
                    };
                }
                let current: i64 = slot.value.parse().map_err(|_| {
                    CrambotError::cache(format!("value at {key} is not an integer"))
                })?;
                let next = current + 1;
                slot.value = next.to_string();
                slot.expires_at.get_or_insert(now + ttl);
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: "1".into(),
                    expires_at: Some(now + ttl),
                });
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CrambotError> {
        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CrambotError> {
        self.slots.remove(key);
        Ok(())
    }
}
