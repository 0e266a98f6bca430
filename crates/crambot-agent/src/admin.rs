// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation flow of the staff-facing bot.
//!
//! One call to [`AdminBot::handle`] processes one inbound event end to end:
//! group gating, admission, callbacks, slash commands, authorization,
//! classification and finally dispatch. Read intents execute at once; write intents go through
//! the confirmation state machine.

use crambot_actions::{ConfirmOutcome, Decision, NewAction, parse_callback};
use crambot_bridge::parse_decision;
use crambot_core::types::{
    AuthContext, CrossBotRequest, IntentResult, Params, Persona, RequestStatus, UnifiedMessage,
    UsageKind,
};
use crambot_core::{ClassifierContext, CrambotError};
use crambot_dispatch::catalog::{self, IntentKind};
use crambot_dispatch::{classify_or_unknown, render};
use tracing::{debug, error, info, warn};

use crate::ERROR_TEXT;
use crate::commands::{self, parse_command};
use crate::group;
use crate::services::BotServices;

pub const UNBOUND_TEXT: &str =
    "👋 歡迎使用 94CramBot！\n\n請先在 94Manage 後台生成綁定碼，然後輸入：\n/bind 123456";
pub const UNKNOWN_TEXT: &str = "🤔 我沒聽懂，可以換個方式說嗎？\n輸入 /help 查看使用說明";
pub const UNHANDLED_TEXT: &str = "🤔 我不確定要怎麼處理這個指令";
pub const REQUEST_PROCESSED_TEXT: &str = "⚠️ 此申請已處理或已過期";
pub const REQUEST_FORBIDDEN_TEXT: &str = "⚠️ 您沒有權限處理此申請";

#[derive(Clone)]
pub struct AdminBot {
    services: BotServices,
}

impl AdminBot {
    pub fn new(services: BotServices) -> Self {
        Self { services }
    }

    /// Processes one event. Failures are logged and answered with a generic
    /// error message; nothing propagates to the caller.
    pub async fn handle(&self, msg: &UnifiedMessage) {
        metrics::counter!("crambot_inbound_messages_total", "persona" => "admin").increment(1);
        if let Err(e) = self.process(msg).await {
            error!(user_id = %msg.user_id, chat_id = %msg.chat_id, error = %e, "admin message failed");
            if let Err(e) = self.services.reply(Persona::Admin, &msg.chat_id, ERROR_TEXT).await {
                warn!(chat_id = %msg.chat_id, error = %e, "error notice not delivered");
            }
        }
    }

    async fn process(&self, msg: &UnifiedMessage) -> Result<(), CrambotError> {
        let s = &self.services;
        let Some(text) = group::addressed_text(msg, s.bot_username(Persona::Admin)) else {
            debug!(chat_id = %msg.chat_id, "group message not addressed to the bot");
            return Ok(());
        };
        if !s.admit(Persona::Admin, msg).await? {
            return Ok(());
        }

        if msg.is_callback() {
            return self.on_callback(msg).await;
        }

        let text = text.as_str();
        if let Some(cmd) = parse_command(text) {
            match cmd.name {
                "bind" => return commands::bind(s, msg, cmd.args).await,
                "switch" => return commands::switch(s, msg, cmd.args).await,
                "sync" => return commands::sync(s, msg).await,
                "pending" => return commands::pending(s, msg).await,
                "conversations" => return commands::conversations(s, msg).await,
                "help" | "start" => return commands::help(s, msg).await,
                _ => {}
            }
        }

        let auth = s
            .store
            .get_user_binding(&msg.user_id)
            .await?
            .and_then(|b| b.active_context());
        let Some(auth) = auth else {
            return s.reply(Persona::Admin, &msg.chat_id, UNBOUND_TEXT).await;
        };

        let snapshot = match s.cache.get(&auth.tenant_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(tenant_id = %auth.tenant_id, error = %e, "tenant snapshot unavailable");
                None
            }
        };
        let context = ClassifierContext {
            persona: Persona::Admin,
            tenant_name: auth.tenant_name.clone(),
            snapshot,
            children: Vec::new(),
        };
        let intent = classify_or_unknown(s.classifier.as_ref(), text, &context).await;
        s.count_usage(&auth.tenant_id, UsageKind::AiCalls);
        debug!(
            user_id = %msg.user_id,
            intent = %intent.intent,
            confidence = intent.confidence,
            "admin message classified"
        );

        if intent.need_clarification {
            if let Some(question) = intent.clarification_question.as_deref() {
                return s
                    .reply(Persona::Admin, &msg.chat_id, &format!("🤔 {question}"))
                    .await;
            }
        }

        if intent.intent == IntentResult::UNKNOWN {
            return s.reply(Persona::Admin, &msg.chat_id, UNKNOWN_TEXT).await;
        }

        match catalog::kind_of(&intent.intent) {
            IntentKind::System => match intent.intent.as_str() {
                catalog::SYSTEM_SWITCH => commands::switch(s, msg, "").await,
                catalog::SYSTEM_SYNC => commands::sync(s, msg).await,
                _ => commands::help(s, msg).await,
            },
            IntentKind::Query => {
                let response = s
                    .dispatcher
                    .execute(&intent.intent, &intent.params, &auth.tenant_id)
                    .await;
                s.count_usage(&auth.tenant_id, UsageKind::ApiCalls);
                s.reply(Persona::Admin, &msg.chat_id, &render::format_response(&response))
                    .await
            }
            IntentKind::Write => {
                self.request_confirmation(msg, &auth, &intent.intent, &intent.params)
                    .await
            }
            IntentKind::Unknown => s.reply(Persona::Admin, &msg.chat_id, UNHANDLED_TEXT).await,
        }
    }

    async fn request_confirmation(
        &self,
        msg: &UnifiedMessage,
        auth: &AuthContext,
        intent: &str,
        params: &Params,
    ) -> Result<(), CrambotError> {
        let action = self
            .services
            .actions
            .create(
                NewAction {
                    auth,
                    chat_id: &msg.chat_id,
                    intent,
                    params,
                },
                self.services.transport(Persona::Admin).as_ref(),
            )
            .await?;
        debug!(action_id = %action.id, "confirmation requested");
        Ok(())
    }

    async fn on_callback(&self, msg: &UnifiedMessage) -> Result<(), CrambotError> {
        let s = &self.services;
        let data = msg.text();
        if let Some((approved, request_id)) = parse_decision(data) {
            return self.on_decision(msg, request_id, approved).await;
        }

        let Some((decision, action_id)) = parse_callback(data) else {
            debug!(data, "ignoring unrecognized callback");
            return Ok(());
        };
        let outcome = match decision {
            Decision::Confirm => s.actions.confirm(action_id, &msg.user_id).await?,
            Decision::Cancel => s.actions.cancel(action_id, &msg.user_id).await?,
        };
        if let ConfirmOutcome::Executed { action, response } = &outcome {
            info!(
                action_id = %action.id,
                intent = %action.intent,
                success = response.is_success(),
                "pending action executed"
            );
        }
        s.edit(
            Persona::Admin,
            &msg.chat_id,
            msg.reply_to_message_id.as_deref(),
            &outcome.text(),
        )
        .await
    }

    async fn on_decision(
        &self,
        msg: &UnifiedMessage,
        request_id: &str,
        approved: bool,
    ) -> Result<(), CrambotError> {
        let s = &self.services;
        let prompt_id = msg.reply_to_message_id.as_deref();

        let Some(request) = s.bridge.get(request_id).await? else {
            return s
                .edit(Persona::Admin, &msg.chat_id, prompt_id, REQUEST_PROCESSED_TEXT)
                .await;
        };
        let authorized = s
            .store
            .get_user_binding(&msg.user_id)
            .await?
            .is_some_and(|b| b.context_for(&request.tenant_id).is_some());
        if !authorized {
            warn!(user_id = %msg.user_id, request_id, "decision from user outside tenant");
            return s
                .edit(Persona::Admin, &msg.chat_id, prompt_id, REQUEST_FORBIDDEN_TEXT)
                .await;
        }

        let Some(decided) = s.bridge.decide(request_id, approved).await? else {
            return s
                .edit(Persona::Admin, &msg.chat_id, prompt_id, REQUEST_PROCESSED_TEXT)
                .await;
        };
        if let Err(e) = s.bridge.notify_requester(&decided).await {
            warn!(request_id, error = %e, "requester notice failed");
        }
        s.edit(Persona::Admin, &msg.chat_id, prompt_id, &decision_text(&decided))
            .await
    }
}

/// Replacement for the responder's prompt once a request is decided.
pub fn decision_text(request: &CrossBotRequest) -> String {
    let date = request.data_str("date").unwrap_or("未指定");
    match request.status {
        RequestStatus::Approved => format!(
            "✅ 已核准 <b>{}</b> {date} 的請假申請，已通知家長",
            request.student_name
        ),
        RequestStatus::Rejected => format!(
            "❌ 已拒絕 <b>{}</b> {date} 的請假申請，已通知家長",
            request.student_name
        ),
        RequestStatus::Pending => REQUEST_PROCESSED_TEXT.to_string(),
    }
}
