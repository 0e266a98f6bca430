// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use crambot_config::model::StorageConfig;
use crambot_core::types::{
    ActionStatus, AuditEntry, BindCode, BroadcastJob, BucketState, ConversationEntry, CrossBotRequest,
    ParentBinding, PendingAction, RequestStatus, TenantBinding, TenantSnapshot, UsageKind,
    UsageSummary, UserBinding,
};
use crambot_core::{AdapterType, CrambotError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed durable store.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, CrambotError> {
        self.db.get().ok_or_else(|| CrambotError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CrambotError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CrambotError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), CrambotError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| CrambotError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), CrambotError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Pending actions ---

    async fn create_pending_action(&self, action: &PendingAction) -> Result<(), CrambotError> {
        queries::actions::create(self.db()?, action).await
    }

    async fn get_pending_action(&self, id: &str) -> Result<Option<PendingAction>, CrambotError> {
        queries::actions::get(self.db()?, id).await
    }

    async fn latest_pending_action_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<PendingAction>, CrambotError> {
        queries::actions::latest_pending_for_user(self.db()?, user_id).await
    }

    async fn transition_pending_action(
        &self,
        id: &str,
        from: ActionStatus,
        to: ActionStatus,
    ) -> Result<bool, CrambotError> {
        queries::actions::transition(self.db()?, id, from, to).await
    }

    async fn set_confirm_message_id(
        &self,
        id: &str,
        message_id: &str,
    ) -> Result<(), CrambotError> {
        queries::actions::set_confirm_message_id(self.db()?, id, message_id).await
    }

    // --- Cross-bot requests ---

    async fn create_cross_bot_request(
        &self,
        request: &CrossBotRequest,
    ) -> Result<(), CrambotError> {
        queries::requests::create(self.db()?, request).await
    }

    async fn get_cross_bot_request(
        &self,
        id: &str,
    ) -> Result<Option<CrossBotRequest>, CrambotError> {
        queries::requests::get(self.db()?, id).await
    }

    async fn decide_cross_bot_request(
        &self,
        id: &str,
        to: RequestStatus,
    ) -> Result<bool, CrambotError> {
        queries::requests::decide(self.db()?, id, to).await
    }

    async fn set_responder_chat_id(&self, id: &str, chat_id: &str) -> Result<(), CrambotError> {
        queries::requests::set_responder_chat_id(self.db()?, id, chat_id).await
    }

    async fn list_pending_cross_bot_requests(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<CrossBotRequest>, CrambotError> {
        queries::requests::list_pending(self.db()?, tenant_id, now, limit).await
    }

    // --- Tenant snapshots ---

    async fn get_tenant_snapshot(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TenantSnapshot>, CrambotError> {
        queries::tenant_cache::get(self.db()?, tenant_id).await
    }

    async fn put_tenant_snapshot(
        &self,
        tenant_id: &str,
        snapshot: &TenantSnapshot,
    ) -> Result<(), CrambotError> {
        queries::tenant_cache::put(self.db()?, tenant_id, snapshot).await
    }

    async fn delete_tenant_snapshot(&self, tenant_id: &str) -> Result<(), CrambotError> {
        queries::tenant_cache::delete(self.db()?, tenant_id).await
    }

    // --- Broadcast jobs ---

    async fn put_broadcast_job(&self, job: &BroadcastJob) -> Result<(), CrambotError> {
        queries::broadcast::put(self.db()?, job).await
    }

    async fn get_broadcast_job(&self, id: &str) -> Result<Option<BroadcastJob>, CrambotError> {
        queries::broadcast::get(self.db()?, id).await
    }

    async fn list_broadcast_jobs(&self, limit: u32) -> Result<Vec<BroadcastJob>, CrambotError> {
        queries::broadcast::list(self.db()?, limit).await
    }

    // --- Audit log ---

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), CrambotError> {
        queries::audit::append(self.db()?, entry).await
    }

    async fn list_audit(
        &self,
        tenant_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, CrambotError> {
        queries::audit::list(self.db()?, tenant_id, limit).await
    }

    // --- Parent conversations ---

    async fn append_conversation(&self, entry: &ConversationEntry) -> Result<(), CrambotError> {
        queries::conversations::append(self.db()?, entry).await
    }

    async fn recent_conversations(
        &self,
        tenant_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationEntry>, CrambotError> {
        queries::conversations::recent(self.db()?, tenant_id, limit).await
    }

    // --- Bindings ---

    async fn get_user_binding(&self, user_id: &str) -> Result<Option<UserBinding>, CrambotError> {
        queries::bindings::get_user(self.db()?, user_id).await
    }

    async fn add_user_binding(
        &self,
        user_id: &str,
        binding: &TenantBinding,
    ) -> Result<(), CrambotError> {
        queries::bindings::add_user(self.db()?, user_id, binding).await
    }

    async fn switch_active_tenant(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<bool, CrambotError> {
        queries::bindings::switch_active(self.db()?, user_id, tenant_id).await
    }

    async fn admin_chat_ids_for_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<String>, CrambotError> {
        queries::bindings::admin_chat_ids_for_tenant(self.db()?, tenant_id).await
    }

    async fn get_parent_binding(
        &self,
        user_id: &str,
    ) -> Result<Option<ParentBinding>, CrambotError> {
        queries::bindings::get_parent(self.db()?, user_id).await
    }

    async fn put_parent_binding(&self, binding: &ParentBinding) -> Result<(), CrambotError> {
        queries::bindings::put_parent(self.db()?, binding).await
    }

    // --- Bind codes ---

    async fn put_bind_code(&self, code: &BindCode) -> Result<(), CrambotError> {
        queries::bindings::put_code(self.db()?, code).await
    }

    async fn get_bind_code(&self, code: &str) -> Result<Option<BindCode>, CrambotError> {
        queries::bindings::get_code(self.db()?, code).await
    }

    async fn consume_bind_code(&self, code: &str, user_id: &str) -> Result<bool, CrambotError> {
        queries::bindings::consume_code(self.db()?, code, user_id).await
    }

    // --- Usage counters ---

    async fn increment_usage(
        &self,
        tenant_id: &str,
        kind: UsageKind,
        day: &str,
    ) -> Result<(), CrambotError> {
        queries::usage::increment(self.db()?, tenant_id, kind, day).await
    }

    async fn usage_summary(
        &self,
        tenant_id: &str,
        month: &str,
    ) -> Result<UsageSummary, CrambotError> {
        queries::usage::summary(self.db()?, tenant_id, month).await
    }

    // --- Rate-limit buckets ---

    async fn get_rate_bucket(&self, subject: &str) -> Result<Option<BucketState>, CrambotError> {
        queries::buckets::get(self.db()?, subject).await
    }

    async fn put_rate_bucket(
        &self,
        subject: &str,
        state: &BucketState,
    ) -> Result<(), CrambotError> {
        queries::buckets::put(self.db()?, subject, state).await
    }
}
