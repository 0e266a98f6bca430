// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process token buckets, used when the distributed counter is unreachable.
//!
//! A subject seen for the first time in this process is reconciled with the
//! durable bucket row: whichever side has fewer tokens wins. Every debit is
//! persisted back as a detached task, so other instances falling back at the
//! same time see roughly the same budget. This bounds abuse during an outage;
//! it is not an exact quota.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crambot_core::types::BucketState;
use crambot_core::{BackgroundTasks, StorageAdapter};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

pub struct TokenBuckets {
    buckets: DashMap<String, Bucket>,
    capacity: f64,
    refill_per_sec: f64,
    store: Arc<dyn StorageAdapter>,
    tasks: BackgroundTasks,
}

impl TokenBuckets {
    /// `capacity` tokens refill evenly over `window`.
    pub fn new(
        capacity: u32,
        window: Duration,
        store: Arc<dyn StorageAdapter>,
        tasks: BackgroundTasks,
    ) -> Self {
        let capacity = f64::from(capacity);
        let window = window.as_secs_f64().max(f64::EPSILON);
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_per_sec: capacity / window,
            store,
            tasks,
        }
    }

    /// Takes one token for `subject` if one is available.
    pub async fn take(&self, subject: &str) -> bool {
        if !self.buckets.contains_key(subject) {
            let seeded = self.reconcile(subject).await;
            self.buckets.entry(subject.to_string()).or_insert(seeded);
        }

        let now = Instant::now();
        let (admitted, remaining) = {
            let Some(mut bucket) = self.buckets.get_mut(subject) else {
                return false;
            };
            let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
            bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            bucket.refilled_at = now;
            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                (true, bucket.tokens)
            } else {
                (false, bucket.tokens)
            }
        };

        if admitted {
            self.persist(subject, remaining);
        }
        admitted
    }

    /// Tokens currently held for `subject`, if it has a local bucket.
    pub fn tokens(&self, subject: &str) -> Option<f64> {
        self.buckets.get(subject).map(|b| b.tokens)
    }

    async fn reconcile(&self, subject: &str) -> Bucket {
        let now = Instant::now();
        let mut tokens = self.capacity;
        match self.store.get_rate_bucket(subject).await {
            Ok(Some(state)) => {
                let age = (Utc::now() - state.updated_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO)
                    .as_secs_f64();
                let durable = (state.tokens + age * self.refill_per_sec).min(self.capacity);
                debug!(subject, durable, "reconciled bucket with durable state");
                tokens = tokens.min(durable);
            }
            Ok(None) => {}
            Err(e) => warn!(subject, error = %e, "failed to read durable bucket"),
        }
        Bucket {
            tokens,
            refilled_at: now,
        }
    }

    fn persist(&self, subject: &str, tokens: f64) {
        let store = Arc::clone(&self.store);
        let subject = subject.to_string();
        let state = BucketState {
            tokens,
            updated_at: Utc::now(),
        };
        self.tasks.spawn_detached("rate_bucket_persist", async move {
            store.put_rate_bucket(&subject, &state).await
        });
    }
}
