// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pending-action state machine.

use std::sync::Arc;

use chrono::Utc;
use crambot_config::model::ActionsConfig;
use crambot_core::types::{
    ActionStatus, ApiResponse, AuditEntry, AuditStatus, AuthContext, Params, PendingAction,
    SendOptions, UsageKind,
};
use crambot_core::{BackgroundTasks, ChatTransport, CrambotError, StorageAdapter};
use crambot_dispatch::usage::record_usage;
use crambot_dispatch::{Dispatcher, render};
use tracing::{debug, info, warn};

pub const EXPIRED_TEXT: &str = "⏰ 此操作已逾時，已自動取消";
pub const PROCESSED_TEXT: &str = "⚠️ 此操作已過期或已處理";
pub const CANCELLED_TEXT: &str = "❌ 已取消";
pub const NOT_OWNER_TEXT: &str = "⚠️ 只有發起人可以確認此操作";
pub const REVOKED_TEXT: &str = "⚠️ 您已不再綁定此補習班，操作已取消";

/// A write intent about to be gated.
#[derive(Debug, Clone, Copy)]
pub struct NewAction<'a> {
    pub auth: &'a AuthContext,
    pub chat_id: &'a str,
    pub intent: &'a str,
    pub params: &'a Params,
}

/// Result of pressing confirm or cancel.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Executed {
        action: PendingAction,
        response: ApiResponse,
    },
    Cancelled(PendingAction),
    Expired,
    /// Unknown id, already terminal, or lost the transition race.
    AlreadyProcessed,
    NotOwner,
    /// The user is no longer bound to the action's tenant.
    Revoked,
}

impl ConfirmOutcome {
    /// Text that replaces the confirmation prompt.
    pub fn text(&self) -> String {
        match self {
            ConfirmOutcome::Executed { response, .. } => render::format_response(response),
            ConfirmOutcome::Cancelled(_) => CANCELLED_TEXT.to_string(),
            ConfirmOutcome::Expired => EXPIRED_TEXT.to_string(),
            ConfirmOutcome::AlreadyProcessed => PROCESSED_TEXT.to_string(),
            ConfirmOutcome::NotOwner => NOT_OWNER_TEXT.to_string(),
            ConfirmOutcome::Revoked => REVOKED_TEXT.to_string(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ConfirmOutcome::Executed { .. } => "executed",
            ConfirmOutcome::Cancelled(_) => "cancelled",
            ConfirmOutcome::Expired => "expired",
            ConfirmOutcome::AlreadyProcessed => "already_processed",
            ConfirmOutcome::NotOwner => "not_owner",
            ConfirmOutcome::Revoked => "revoked",
        }
    }
}

/// Button pressed on a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Cancel,
}

/// Splits `confirm:{id}` / `cancel:{id}` callback data.
pub fn parse_callback(data: &str) -> Option<(Decision, &str)> {
    let (verb, id) = data.split_once(':')?;
    if id.is_empty() {
        return None;
    }
    match verb {
        "confirm" => Some((Decision::Confirm, id)),
        "cancel" => Some((Decision::Cancel, id)),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ConfirmManager {
    store: Arc<dyn StorageAdapter>,
    dispatcher: Dispatcher,
    tasks: BackgroundTasks,
    ttl: chrono::Duration,
}

enum Gate {
    Open(PendingAction),
    Closed(ConfirmOutcome),
}

impl ConfirmManager {
    pub fn new(
        config: &ActionsConfig,
        store: Arc<dyn StorageAdapter>,
        dispatcher: Dispatcher,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            store,
            dispatcher,
            tasks,
            ttl: chrono::Duration::from_std(std::time::Duration::from_secs(config.ttl_secs))
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Persists a pending action and sends its confirmation prompt.
    pub async fn create(
        &self,
        new: NewAction<'_>,
        transport: &dyn ChatTransport,
    ) -> Result<PendingAction, CrambotError> {
        let now = Utc::now();
        let mut action = PendingAction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: new.auth.user_id.clone(),
            chat_id: new.chat_id.to_string(),
            tenant_id: new.auth.tenant_id.clone(),
            tenant_name: new.auth.tenant_name.clone(),
            intent: new.intent.to_string(),
            params: new.params.clone(),
            status: ActionStatus::Pending,
            confirm_message_id: None,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.store.create_pending_action(&action).await?;

        let prompt = render::confirmation_prompt(&action.tenant_name, &action.intent, &action.params);
        let options = SendOptions::with_keyboard(render::confirmation_keyboard(&action.id));
        let sent = match transport.send_message(&action.chat_id, &prompt, &options).await {
            Ok(sent) => sent,
            Err(e) => {
                // Nobody can press a button that was never delivered.
                self.store
                    .transition_pending_action(&action.id, ActionStatus::Pending, ActionStatus::Cancelled)
                    .await?;
                return Err(e);
            }
        };
        self.store.set_confirm_message_id(&action.id, &sent.0).await?;
        action.confirm_message_id = Some(sent.0);

        metrics::counter!("crambot_pending_actions_total", "event" => "created").increment(1);
        info!(
            action_id = %action.id,
            tenant_id = %action.tenant_id,
            intent = %action.intent,
            "pending action created"
        );
        Ok(action)
    }

    /// Reads an action, moving it to `expired` if its deadline has passed.
    pub async fn load(&self, id: &str) -> Result<Option<PendingAction>, CrambotError> {
        let Some(mut action) = self.store.get_pending_action(id).await? else {
            return Ok(None);
        };
        if action.is_expired_at(Utc::now()) {
            if self
                .store
                .transition_pending_action(id, ActionStatus::Pending, ActionStatus::Expired)
                .await?
            {
                debug!(action_id = %id, "pending action expired on access");
            }
            action.status = ActionStatus::Expired;
        }
        Ok(Some(action))
    }

    /// Most recent action the user still has to answer.
    pub async fn latest_for_user(&self, user_id: &str) -> Result<Option<PendingAction>, CrambotError> {
        match self.store.latest_pending_action_for_user(user_id).await? {
            Some(action) => self.load(&action.id).await.map(|a| {
                a.filter(|a| a.status == ActionStatus::Pending)
            }),
            None => Ok(None),
        }
    }

    async fn gate(&self, id: &str, user_id: &str) -> Result<Gate, CrambotError> {
        let Some(action) = self.load(id).await? else {
            return Ok(Gate::Closed(ConfirmOutcome::AlreadyProcessed));
        };
        if action.user_id != user_id {
            return Ok(Gate::Closed(ConfirmOutcome::NotOwner));
        }
        Ok(match action.status {
            ActionStatus::Pending => Gate::Open(action),
            ActionStatus::Expired => Gate::Closed(ConfirmOutcome::Expired),
            ActionStatus::Confirmed | ActionStatus::Cancelled => {
                Gate::Closed(ConfirmOutcome::AlreadyProcessed)
            }
        })
    }

    /// `pending -> cancelled`. Never calls downstream.
    pub async fn cancel(&self, id: &str, user_id: &str) -> Result<ConfirmOutcome, CrambotError> {
        let mut action = match self.gate(id, user_id).await? {
            Gate::Open(action) => action,
            Gate::Closed(outcome) => return Ok(self.finish(id, outcome)),
        };
        if !self
            .store
            .transition_pending_action(id, ActionStatus::Pending, ActionStatus::Cancelled)
            .await?
        {
            return Ok(self.finish(id, ConfirmOutcome::AlreadyProcessed));
        }
        action.status = ActionStatus::Cancelled;
        self.audit(&action, AuditStatus::Cancelled, None, None);
        Ok(self.finish(id, ConfirmOutcome::Cancelled(action)))
    }

    /// `pending -> confirmed`, then the downstream call with fresh authorization.
    pub async fn confirm(&self, id: &str, user_id: &str) -> Result<ConfirmOutcome, CrambotError> {
        let mut action = match self.gate(id, user_id).await? {
            Gate::Open(action) => action,
            Gate::Closed(outcome) => return Ok(self.finish(id, outcome)),
        };

        let auth = self
            .store
            .get_user_binding(user_id)
            .await?
            .and_then(|b| b.context_for(&action.tenant_id));
        let Some(auth) = auth else {
            if self
                .store
                .transition_pending_action(id, ActionStatus::Pending, ActionStatus::Cancelled)
                .await?
            {
                action.status = ActionStatus::Cancelled;
                self.audit(
                    &action,
                    AuditStatus::Error,
                    None,
                    Some("binding revoked before confirmation".to_string()),
                );
                return Ok(self.finish(id, ConfirmOutcome::Revoked));
            }
            return Ok(self.finish(id, ConfirmOutcome::AlreadyProcessed));
        };

        if !self
            .store
            .transition_pending_action(id, ActionStatus::Pending, ActionStatus::Confirmed)
            .await?
        {
            return Ok(self.finish(id, ConfirmOutcome::AlreadyProcessed));
        }
        action.status = ActionStatus::Confirmed;

        let response = self
            .dispatcher
            .execute(&action.intent, &action.params, &auth.tenant_id)
            .await;
        record_usage(&self.tasks, &self.store, &auth.tenant_id, UsageKind::ApiCalls);

        let (status, error_message) = match &response {
            ApiResponse::Success { .. } => (AuditStatus::Confirmed, None),
            ApiResponse::Failure { error, message, .. } => (
                AuditStatus::Error,
                Some(message.clone().unwrap_or_else(|| error.clone())),
            ),
        };
        self.audit(
            &action,
            status,
            serde_json::to_value(&response).ok(),
            error_message,
        );
        Ok(self.finish(id, ConfirmOutcome::Executed { action, response }))
    }

    fn finish(&self, id: &str, outcome: ConfirmOutcome) -> ConfirmOutcome {
        metrics::counter!("crambot_pending_actions_total", "event" => outcome.label()).increment(1);
        debug!(action_id = %id, outcome = outcome.label(), "pending action resolved");
        outcome
    }

    fn audit(
        &self,
        action: &PendingAction,
        status: AuditStatus,
        api_response: Option<serde_json::Value>,
        error_message: Option<String>,
    ) {
        let entry = AuditEntry {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: action.tenant_id.clone(),
            user_id: action.user_id.clone(),
            intent: action.intent.clone(),
            params: action.params.clone(),
            status,
            api_response,
            error_message,
            created_at: Utc::now(),
        };
        if status == AuditStatus::Error {
            warn!(action_id = %action.id, intent = %action.intent, "operation audited as error");
        }
        let store = self.store.clone();
        self.tasks
            .spawn_detached("audit_append", async move { store.append_audit(&entry).await });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crambot_core::types::ApiResponse;
    use crambot_test_utils::TestHarness;
    use serde_json::json;

    fn manager(h: &TestHarness) -> ConfirmManager {
        ConfirmManager::new(
            &h.config.actions,
            h.store(),
            Dispatcher::new(h.api()),
            h.tasks.clone(),
        )
    }

    fn auth(user: &str, tenant: &str) -> AuthContext {
        AuthContext {
            user_id: user.into(),
            tenant_id: tenant.into(),
            tenant_name: "大安補習班".into(),
            role: "admin".into(),
        }
    }

    fn leave_params() -> Params {
        json!({"student_name": "陳小明", "date": "2026-10-19"})
            .as_object()
            .cloned()
            .unwrap()
    }

    async fn create_leave(h: &TestHarness, m: &ConfirmManager, user: &str, tenant: &str) -> PendingAction {
        let ctx = auth(user, tenant);
        let params = leave_params();
        m.create(
            NewAction {
                auth: &ctx,
                chat_id: "chat-1",
                intent: "inclass.leave",
                params: &params,
            },
            h.admin_transport.as_ref(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn callback_data_parses() {
        assert_eq!(parse_callback("confirm:abc"), Some((Decision::Confirm, "abc")));
        assert_eq!(parse_callback("cancel:abc"), Some((Decision::Cancel, "abc")));
        assert_eq!(parse_callback("confirm:"), None);
        assert_eq!(parse_callback("crossbot:approve:abc"), None);
    }

    #[tokio::test]
    async fn create_persists_and_sends_prompt() {
        let h = TestHarness::new().await;
        let m = manager(&h);
        let action = create_leave(&h, &m, "u1", "t1").await;

        let sent = h.admin_transport.last_sent().await.unwrap();
        assert_eq!(sent.chat_id, "chat-1");
        assert!(sent.text.starts_with("📋 請確認：\n🏫 大安補習班\n操作：登記請假"));
        assert_eq!(
            sent.button_data(),
            vec![format!("confirm:{}", action.id), format!("cancel:{}", action.id)]
        );

        let stored = h.storage.get_pending_action(&action.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Pending);
        assert_eq!(stored.confirm_message_id, Some(sent.message_id));
        assert_eq!(stored.expires_at - stored.created_at, chrono::Duration::seconds(300));
    }

    #[tokio::test]
    async fn failed_prompt_cancels_action() {
        let h = TestHarness::new().await;
        h.admin_transport.fail_chat("chat-1").await;
        let m = manager(&h);
        let ctx = auth("u1", "t1");
        let params = leave_params();
        let err = m
            .create(
                NewAction {
                    auth: &ctx,
                    chat_id: "chat-1",
                    intent: "inclass.leave",
                    params: &params,
                },
                h.admin_transport.as_ref(),
            )
            .await;
        assert!(err.is_err());
        assert!(m.latest_for_user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn confirm_twice_executes_once() {
        let h = TestHarness::new().await;
        h.bind_admin("u1", "t1", "大安補習班").await;
        h.api.respond_ok("/attendance/leave", "已登記陳小明請假", json!({})).await;
        let m = manager(&h);
        let action = create_leave(&h, &m, "u1", "t1").await;

        let first = m.confirm(&action.id, "u1").await.unwrap();
        assert_eq!(first.text(), "已登記陳小明請假");
        let second = m.confirm(&action.id, "u1").await.unwrap();
        assert_eq!(second, ConfirmOutcome::AlreadyProcessed);
        assert_eq!(second.text(), PROCESSED_TEXT);

        assert_eq!(h.api.calls_to("/attendance/leave").await.len(), 1);
        h.tasks.settle().await;
        let audit = h.storage.list_audit("t1", 10).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].status, AuditStatus::Confirmed);
        assert!(audit[0].api_response.is_some());
    }

    #[tokio::test]
    async fn concurrent_confirms_execute_once() {
        let h = TestHarness::new().await;
        h.bind_admin("u1", "t1", "大安補習班").await;
        let m = manager(&h);
        let action = create_leave(&h, &m, "u1", "t1").await;

        let (a, b) = tokio::join!(m.confirm(&action.id, "u1"), m.confirm(&action.id, "u1"));
        let executed = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|o| matches!(o, ConfirmOutcome::Executed { .. }))
            .count();
        assert_eq!(executed, 1);
        assert_eq!(h.api.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn expired_action_never_executes() {
        let h = TestHarness::new().await;
        h.bind_admin("u1", "t1", "大安補習班").await;
        let m = manager(&h);
        let now = Utc::now();
        let action = PendingAction {
            id: "old".into(),
            user_id: "u1".into(),
            chat_id: "chat-1".into(),
            tenant_id: "t1".into(),
            tenant_name: "大安補習班".into(),
            intent: "inclass.leave".into(),
            params: leave_params(),
            status: ActionStatus::Pending,
            confirm_message_id: None,
            created_at: now - chrono::Duration::minutes(10),
            expires_at: now - chrono::Duration::minutes(5),
        };
        h.storage.create_pending_action(&action).await.unwrap();

        let outcome = m.confirm("old", "u1").await.unwrap();
        assert_eq!(outcome, ConfirmOutcome::Expired);
        assert_eq!(outcome.text(), EXPIRED_TEXT);
        assert!(h.api.calls().await.is_empty());
        let stored = h.storage.get_pending_action("old").await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Expired);
        assert_eq!(m.cancel("old", "u1").await.unwrap(), ConfirmOutcome::Expired);
    }

    #[tokio::test]
    async fn cancel_audits_and_blocks_confirm() {
        let h = TestHarness::new().await;
        h.bind_admin("u1", "t1", "大安補習班").await;
        let m = manager(&h);
        let action = create_leave(&h, &m, "u1", "t1").await;

        let outcome = m.cancel(&action.id, "u1").await.unwrap();
        assert!(matches!(outcome, ConfirmOutcome::Cancelled(ref a) if a.status == ActionStatus::Cancelled));
        assert_eq!(outcome.text(), CANCELLED_TEXT);
        assert_eq!(
            m.confirm(&action.id, "u1").await.unwrap(),
            ConfirmOutcome::AlreadyProcessed
        );
        assert!(h.api.calls().await.is_empty());

        h.tasks.settle().await;
        let audit = h.storage.list_audit("t1", 10).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].status, AuditStatus::Cancelled);
    }

    #[tokio::test]
    async fn only_owner_may_answer() {
        let h = TestHarness::new().await;
        h.bind_admin("u1", "t1", "大安補習班").await;
        h.bind_admin("u2", "t1", "大安補習班").await;
        let m = manager(&h);
        let action = create_leave(&h, &m, "u1", "t1").await;

        assert_eq!(m.confirm(&action.id, "u2").await.unwrap(), ConfirmOutcome::NotOwner);
        assert_eq!(m.cancel(&action.id, "u2").await.unwrap(), ConfirmOutcome::NotOwner);
        assert!(m.latest_for_user("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoked_binding_cancels_without_calling_downstream() {
        let h = TestHarness::new().await;
        h.bind_admin("u1", "t1", "大安補習班").await;
        let m = manager(&h);
        let action = create_leave(&h, &m, "u1", "t2").await;

        assert_eq!(m.confirm(&action.id, "u1").await.unwrap(), ConfirmOutcome::Revoked);
        assert!(h.api.calls().await.is_empty());
        let stored = h.storage.get_pending_action(&action.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Cancelled);
    }

    #[tokio::test]
    async fn downstream_failure_is_audited_as_error() {
        let h = TestHarness::new().await;
        h.bind_admin("u1", "t1", "大安補習班").await;
        h.api
            .respond(
                "/attendance/leave",
                ApiResponse::failure("student_not_found", "找不到學生"),
            )
            .await;
        let m = manager(&h);
        let action = create_leave(&h, &m, "u1", "t1").await;

        let outcome = m.confirm(&action.id, "u1").await.unwrap();
        assert_eq!(outcome.text(), "⚠️ 找不到學生");
        h.tasks.settle().await;
        let audit = h.storage.list_audit("t1", 10).await.unwrap();
        assert_eq!(audit[0].status, AuditStatus::Error);
        assert_eq!(audit[0].error_message.as_deref(), Some("找不到學生"));
    }
}
