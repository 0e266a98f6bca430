// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-through tenant reference-data cache.
//!
//! Three tiers are consulted in order: process memory, the distributed KV,
//! then the durable store. A hit in a slower tier is copied into every faster
//! tier before returning. KV failures are logged and treated as misses.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crambot_config::model::CacheConfig;
use crambot_core::types::TenantSnapshot;
use crambot_core::{BackgroundTasks, CrambotError, DistributedCache, StorageAdapter};
use metrics::counter;
use moka::future::Cache;
use tracing::{debug, warn};

/// Distributed-cache key of a tenant snapshot.
pub fn snapshot_key(tenant_id: &str) -> String {
    format!("tenant_cache:{tenant_id}")
}

#[derive(Clone)]
pub struct TenantCache {
    memory: Cache<String, TenantSnapshot>,
    kv: Arc<dyn DistributedCache>,
    store: Arc<dyn StorageAdapter>,
    ttl: Duration,
    tasks: BackgroundTasks,
}

impl TenantCache {
    pub fn new(
        config: &CacheConfig,
        kv: Arc<dyn DistributedCache>,
        store: Arc<dyn StorageAdapter>,
        tasks: BackgroundTasks,
    ) -> Self {
        let ttl = Duration::from_secs(config.memory_ttl_secs);
        let memory = Cache::builder()
            .max_capacity(config.memory_capacity)
            .time_to_live(ttl)
            .build();
        Self {
            memory,
            kv,
            store,
            ttl,
            tasks,
        }
    }

    /// Looks up a tenant snapshot. `Ok(None)` means the tenant was never synced.
    pub async fn get(&self, tenant_id: &str) -> Result<Option<TenantSnapshot>, CrambotError> {
        if let Some(snapshot) = self.memory.get(tenant_id).await {
            record_hit("memory");
            return Ok(Some(snapshot));
        }

        if let Some(snapshot) = self.kv_get(tenant_id).await {
            record_hit("distributed");
            self.memory
                .insert(tenant_id.to_string(), snapshot.clone())
                .await;
            return Ok(Some(snapshot));
        }

        let Some(snapshot) = self.store.get_tenant_snapshot(tenant_id).await? else {
            record_hit("none");
            debug!(tenant_id, "tenant snapshot not synced");
            return Ok(None);
        };
        record_hit("durable");

        self.memory
            .insert(tenant_id.to_string(), snapshot.clone())
            .await;
        self.write_back(tenant_id, &snapshot);
        Ok(Some(snapshot))
    }

    /// Writes through durable, then distributed, then memory.
    ///
    /// Only a durable-store failure is returned.
    pub async fn set(&self, tenant_id: &str, snapshot: TenantSnapshot) -> Result<(), CrambotError> {
        self.store.put_tenant_snapshot(tenant_id, &snapshot).await?;

        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                if let Err(e) = self
                    .kv
                    .set(&snapshot_key(tenant_id), &json, Some(self.ttl))
                    .await
                {
                    warn!(tenant_id, error = %e, "distributed cache write failed");
                }
            }
            Err(e) => warn!(tenant_id, error = %e, "failed to serialize tenant snapshot"),
        }

        self.memory.insert(tenant_id.to_string(), snapshot).await;
        Ok(())
    }

    /// Drops the memory and distributed copies. The durable snapshot stays.
    pub async fn invalidate(&self, tenant_id: &str) {
        self.memory.invalidate(tenant_id).await;
        if let Err(e) = self.kv.del(&snapshot_key(tenant_id)).await {
            warn!(tenant_id, error = %e, "distributed cache delete failed");
        }
    }

    /// True when the tenant was never synced or its snapshot is older than `max_age`.
    pub async fn is_stale(&self, tenant_id: &str, max_age: Duration) -> Result<bool, CrambotError> {
        let Some(snapshot) = self.get(tenant_id).await? else {
            return Ok(true);
        };
        let age = Utc::now() - snapshot.last_synced_at;
        Ok(age.to_std().map(|age| age > max_age).unwrap_or(false))
    }

    async fn kv_get(&self, tenant_id: &str) -> Option<TenantSnapshot> {
        let raw = match self.kv.get(&snapshot_key(tenant_id)).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(tenant_id, error = %e, "distributed cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(tenant_id, error = %e, "discarding unreadable cached snapshot");
                None
            }
        }
    }

    fn write_back(&self, tenant_id: &str, snapshot: &TenantSnapshot) {
        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!(tenant_id, error = %e, "failed to serialize tenant snapshot");
                return;
            }
        };
        let kv = Arc::clone(&self.kv);
        let key = snapshot_key(tenant_id);
        let ttl = self.ttl;
        self.tasks.spawn_detached("tenant_cache_write_back", async move {
            kv.set(&key, &json, Some(ttl)).await
        });
    }
}

fn record_hit(tier: &'static str) {
    counter!("crambot_tenant_cache_lookups_total", "tier" => tier).increment(1);
}
