// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distributed key-value backends.

pub mod memory;
pub mod upstash;

use std::sync::Arc;
use std::time::Duration;

use crambot_config::model::{KvBackend, KvConfig};
use crambot_core::{CrambotError, DistributedCache};

pub use memory::InMemoryKv;
pub use upstash::UpstashKv;

/// Builds the configured backend.
pub fn from_config(config: &KvConfig) -> Result<Arc<dyn DistributedCache>, CrambotError> {
    match config.backend {
        KvBackend::Memory => Ok(Arc::new(InMemoryKv::new())),
        KvBackend::Upstash => {
            let url = config
                .url
                .clone()
                .ok_or_else(|| CrambotError::Config("kv.url is required for upstash".into()))?;
            let token = config
                .token
                .clone()
                .ok_or_else(|| CrambotError::Config("kv.token is required for upstash".into()))?;
            Ok(Arc::new(UpstashKv::new(
                url,
                token,
                Duration::from_millis(config.timeout_ms),
            )?))
        }
    }
}
