// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window counter on the distributed KV.

use std::sync::Arc;
use std::time::Duration;

use crambot_core::{CrambotError, DistributedCache};

pub fn window_key(subject: &str) -> String {
    format!("rl:{subject}")
}

/// Key of the global send counter for one epoch second.
pub fn global_key(epoch_secs: i64) -> String {
    format!("rl:global:{epoch_secs}")
}

#[derive(Clone)]
pub struct FixedWindow {
    kv: Arc<dyn DistributedCache>,
    capacity: u32,
    window: Duration,
}

impl FixedWindow {
    pub fn new(kv: Arc<dyn DistributedCache>, capacity: u32, window: Duration) -> Self {
        Self {
            kv,
            capacity,
            window,
        }
    }

    /// Counts one hit against `key` and reports whether it is within capacity.
    ///
    /// The first hit of a window arms the expiry, so the window starts at the
    /// first request rather than on a wall-clock boundary.
    pub async fn hit(&self, key: &str) -> Result<bool, CrambotError> {
        let count = self.kv.incr(key, self.window).await?;
        Ok(count <= i64::from(self.capacity))
    }
}
