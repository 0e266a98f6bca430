// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator broadcasts.
//!
//! [`BroadcastQueue`] persists jobs and hands their ids to a single
//! [`BroadcastWorker`], which sends to every recipient in order, paced
//! locally and admitted through the global send ceiling.

pub mod queue;
pub mod worker;

pub use queue::{BroadcastQueue, new_job_id};
pub use worker::BroadcastWorker;

use std::sync::Arc;

use crambot_config::model::BroadcastConfig;
use crambot_core::{ChatTransport, StorageAdapter};
use crambot_ratelimit::RateLimiter;
use tokio::sync::mpsc;

/// Builds a connected queue and worker. The worker must be spawned with
/// [`BroadcastWorker::run`].
pub fn channel(
    config: &BroadcastConfig,
    store: Arc<dyn StorageAdapter>,
    transport: Arc<dyn ChatTransport>,
    limiter: Arc<RateLimiter>,
) -> (BroadcastQueue, BroadcastWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        BroadcastQueue::new(config, store.clone(), tx),
        BroadcastWorker::new(config, store, transport, limiter, rx),
    )
}
