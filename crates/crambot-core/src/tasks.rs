// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervised fire-and-forget work.
//!
//! Side effects that must not delay a reply (audit rows, cache write-back,
//! bucket persistence, usage counters, webhook processing) are spawned here
//! so that shutdown can wait for them and failures are logged in one place.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Tracker for detached background tasks. Cloning shares the tracker.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Spawns `fut` on the tracker. An `Err` result is logged with `label`.
    pub fn spawn_detached<F, E>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.tracker.spawn(async move {
            if let Err(e) = fut.await {
                warn!(task = label, error = %e, "background task failed");
            }
        });
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Waits until every task spawned so far has finished, then accepts new work again.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stops accepting new work and waits up to `timeout` for in-flight tasks.
    ///
    /// Returns `false` if tasks were still running when the timeout elapsed.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let remaining = self.tracker.len();
        debug!(remaining, "draining background tasks");
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    "background tasks still running at shutdown"
                );
                false
            }
        }
    }
}
