// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CrambotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ActionStatus, AuditEntry, BindCode, BroadcastJob, BucketState, ConversationEntry, CrossBotRequest,
    ParentBinding, PendingAction, RequestStatus, TenantBinding, TenantSnapshot, UsageKind,
    UsageSummary, UserBinding,
};

/// Adapter for the authoritative durable store.
///
/// Terminal transitions are compare-and-transition operations: they return
/// `true` only for the caller whose conditional update changed the row.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the backend (connection, migrations).
    async fn initialize(&self) -> Result<(), CrambotError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), CrambotError>;

    // --- Pending actions ---

    async fn create_pending_action(&self, action: &PendingAction) -> Result<(), CrambotError>;

    async fn get_pending_action(&self, id: &str) -> Result<Option<PendingAction>, CrambotError>;

    /// Most recent action still in `pending` status for the user.
    async fn latest_pending_action_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<PendingAction>, CrambotError>;

    /// Moves an action from `from` to `to` iff its current status is `from`.
    async fn transition_pending_action(
        &self,
        id: &str,
        from: ActionStatus,
        to: ActionStatus,
    ) -> Result<bool, CrambotError>;

    async fn set_confirm_message_id(
        &self,
        id: &str,
        message_id: &str,
    ) -> Result<(), CrambotError>;

    // --- Cross-bot requests ---

    async fn create_cross_bot_request(&self, request: &CrossBotRequest)
    -> Result<(), CrambotError>;

    async fn get_cross_bot_request(
        &self,
        id: &str,
    ) -> Result<Option<CrossBotRequest>, CrambotError>;

    /// Moves a request out of `pending` into `to`. Returns `false` if it was
    /// already decided.
    async fn decide_cross_bot_request(
        &self,
        id: &str,
        to: RequestStatus,
    ) -> Result<bool, CrambotError>;

    async fn set_responder_chat_id(&self, id: &str, chat_id: &str) -> Result<(), CrambotError>;

    /// Pending, unexpired requests of a tenant, newest first.
    async fn list_pending_cross_bot_requests(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<CrossBotRequest>, CrambotError>;

    // --- Tenant snapshots ---

    async fn get_tenant_snapshot(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TenantSnapshot>, CrambotError>;

    async fn put_tenant_snapshot(
        &self,
        tenant_id: &str,
        snapshot: &TenantSnapshot,
    ) -> Result<(), CrambotError>;

    async fn delete_tenant_snapshot(&self, tenant_id: &str) -> Result<(), CrambotError>;

    // --- Broadcast jobs ---

    /// Inserts or replaces the job record.
    async fn put_broadcast_job(&self, job: &BroadcastJob) -> Result<(), CrambotError>;

    async fn get_broadcast_job(&self, id: &str) -> Result<Option<BroadcastJob>, CrambotError>;

    /// Jobs ordered newest first.
    async fn list_broadcast_jobs(&self, limit: u32) -> Result<Vec<BroadcastJob>, CrambotError>;

    // --- Audit log ---

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), CrambotError>;

    async fn list_audit(
        &self,
        tenant_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, CrambotError>;

    // --- Parent conversations ---

    async fn append_conversation(&self, entry: &ConversationEntry) -> Result<(), CrambotError>;

    /// A tenant's turns ordered newest first.
    async fn recent_conversations(
        &self,
        tenant_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationEntry>, CrambotError>;

    // --- Bindings ---

    async fn get_user_binding(&self, user_id: &str) -> Result<Option<UserBinding>, CrambotError>;

    /// Adds (or refreshes) a tenant binding and makes it the active tenant.
    async fn add_user_binding(
        &self,
        user_id: &str,
        binding: &TenantBinding,
    ) -> Result<(), CrambotError>;

    /// Switches the active tenant. Returns `false` when the user is not bound to it.
    async fn switch_active_tenant(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<bool, CrambotError>;

    /// Users whose active tenant is `tenant_id`, most recently active first.
    async fn admin_chat_ids_for_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<String>, CrambotError>;

    async fn get_parent_binding(
        &self,
        user_id: &str,
    ) -> Result<Option<ParentBinding>, CrambotError>;

    async fn put_parent_binding(&self, binding: &ParentBinding) -> Result<(), CrambotError>;

    // --- Bind codes ---

    async fn put_bind_code(&self, code: &BindCode) -> Result<(), CrambotError>;

    async fn get_bind_code(&self, code: &str) -> Result<Option<BindCode>, CrambotError>;

    /// Marks an unused code as used by `user_id`. Returns `false` if it was already used.
    async fn consume_bind_code(&self, code: &str, user_id: &str) -> Result<bool, CrambotError>;

    // --- Usage counters ---

    /// Increments a daily counter. `day` is `YYYY-MM-DD`.
    async fn increment_usage(
        &self,
        tenant_id: &str,
        kind: UsageKind,
        day: &str,
    ) -> Result<(), CrambotError>;

    /// Aggregates the daily counters of a `YYYY-MM` month.
    async fn usage_summary(
        &self,
        tenant_id: &str,
        month: &str,
    ) -> Result<UsageSummary, CrambotError>;

    // --- Rate-limit buckets ---

    async fn get_rate_bucket(&self, subject: &str) -> Result<Option<BucketState>, CrambotError>;

    async fn put_rate_bucket(
        &self,
        subject: &str,
        state: &BucketState,
    ) -> Result<(), CrambotError>;
}
