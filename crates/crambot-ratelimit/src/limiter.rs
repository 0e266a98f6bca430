// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission control for inbound requests and outbound sends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crambot_config::model::RateLimitConfig;
use crambot_core::{BackgroundTasks, DistributedCache, StorageAdapter};
use metrics::counter;
use moka::future::Cache;
use tracing::{debug, warn};

use crate::bucket::TokenBuckets;
use crate::window::{FixedWindow, global_key, window_key};

const GLOBAL_BACKOFF: Duration = Duration::from_millis(50);

/// Per-subject limiter with a distributed fixed window and a local
/// token-bucket fallback, plus a global per-second send ceiling.
///
/// Counter errors never surface to callers; they only switch the strategy.
pub struct RateLimiter {
    subjects: FixedWindow,
    global: FixedWindow,
    buckets: TokenBuckets,
    violations: Cache<String, u32>,
    blocked: Cache<String, ()>,
    block_after: u32,
}

impl RateLimiter {
    pub fn new(
        config: &RateLimitConfig,
        kv: Arc<dyn DistributedCache>,
        store: Arc<dyn StorageAdapter>,
        tasks: BackgroundTasks,
    ) -> Self {
        let window = Duration::from_secs(config.window_secs);
        let violations = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(window)
            .build();
        let blocked = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(config.block_duration_secs))
            .build();
        Self {
            subjects: FixedWindow::new(kv.clone(), config.user_capacity, window),
            // Global keys are per epoch second; two seconds of TTL outlives the second.
            global: FixedWindow::new(kv, config.global_per_second, Duration::from_secs(2)),
            buckets: TokenBuckets::new(config.user_capacity, window, store, tasks),
            violations,
            blocked,
            block_after: config.block_after_violations,
        }
    }

    /// Decides whether `subject` may proceed.
    pub async fn admit(&self, subject: &str) -> bool {
        if self.blocked.contains_key(subject) {
            counter!("crambot_rate_limited_total", "scope" => "blocked").increment(1);
            debug!(subject, "subject is blocked");
            return false;
        }

        let admitted = match self.subjects.hit(&window_key(subject)).await {
            Ok(admitted) => admitted,
            Err(e) => {
                debug!(subject, error = %e, "counter unavailable, using local bucket");
                self.buckets.take(subject).await
            }
        };

        if !admitted {
            counter!("crambot_rate_limited_total", "scope" => "user").increment(1);
            self.record_violation(subject).await;
        }
        admitted
    }

    /// Enforces the per-second ceiling on outbound sends across instances.
    ///
    /// Fails open when the counter is unreachable.
    pub async fn global_admit(&self) -> bool {
        match self.global.hit(&global_key(Utc::now().timestamp())).await {
            Ok(true) => true,
            Ok(false) => {
                counter!("crambot_rate_limited_total", "scope" => "global").increment(1);
                false
            }
            Err(e) => {
                debug!(error = %e, "global counter unavailable, admitting");
                true
            }
        }
    }

    /// Waits until the global ceiling admits one more send.
    pub async fn wait_global(&self) {
        while !self.global_admit().await {
            tokio::time::sleep(GLOBAL_BACKOFF).await;
        }
    }

    pub async fn is_blocked(&self, subject: &str) -> bool {
        self.blocked.contains_key(subject)
    }

    async fn record_violation(&self, subject: &str) {
        if self.block_after == 0 {
            return;
        }
        let count = self.violations.get(subject).await.unwrap_or(0) + 1;
        if count >= self.block_after {
            warn!(subject, violations = count, "blocking subject after repeated violations");
            self.violations.invalidate(subject).await;
            self.blocked.insert(subject.to_string(), ()).await;
        } else {
            self.violations.insert(subject.to_string(), count).await;
        }
    }
}
