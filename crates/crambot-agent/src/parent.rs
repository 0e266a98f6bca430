// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation flow of the guardian-facing bot.
//!
//! Parents only read their own children's data. The single mutating intent,
//! a leave request, is validated by the class module and then handed to the
//! admin persona through the cross-bot bridge for approval. Personal data is
//! never shown in a group; such questions are redirected to a private chat.
//! Every answered turn is logged for staff review.

use chrono::Utc;
use crambot_core::types::{
    ApiMethod, ApiRequest, BindKind, BusinessModule, ChatType, ConversationEntry, CrossBotKind,
    IntentResult, NewCrossBotRequest, ParentBinding, ParentChild, Params, Persona, UnifiedMessage,
    UsageKind, param_str,
};
use crambot_core::{ClassifierContext, CrambotError};
use crambot_dispatch::catalog::parent as intents;
use crambot_dispatch::{calendar, parent_rules};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::ERROR_TEXT;
use crate::commands::{BIND_CODE_LEN, parse_command};
use crate::group;
use crate::parent_views as views;
use crate::services::BotServices;

pub const BIND_FORMAT_TEXT: &str = "❌ 格式錯誤，請輸入：/bind 123456";
pub const INVITE_MISSING_TEXT: &str = "❌ 邀請碼不存在或已過期";
pub const INVITE_USED_TEXT: &str = "❌ 此邀請碼已被使用";
pub const INVITE_EXPIRED_TEXT: &str = "❌ 邀請碼已過期，請聯繫補習班重新生成";
pub const ALREADY_BOUND_TEXT: &str = "⚠️ 您已綁定此學生";
pub const QUERY_FAILED_TEXT: &str = "⚠️ 目前無法取得資料，請稍後再試 🙏";

const RELATION: &str = "家長";

#[derive(Clone)]
pub struct ParentBot {
    services: BotServices,
}

impl ParentBot {
    pub fn new(services: BotServices) -> Self {
        Self { services }
    }

    /// Processes one event. Never fails; errors are logged and the parent
    /// gets a generic apology.
    pub async fn handle(&self, msg: &UnifiedMessage) {
        metrics::counter!("crambot_inbound_messages_total", "persona" => "parent").increment(1);
        if let Err(e) = self.process(msg).await {
            error!(user_id = %msg.user_id, chat_id = %msg.chat_id, error = %e, "parent message failed");
            if let Err(e) = self.reply(&msg.chat_id, ERROR_TEXT).await {
                warn!(chat_id = %msg.chat_id, error = %e, "error notice not delivered");
            }
        }
    }

    async fn reply(&self, chat_id: &str, text: &str) -> Result<(), CrambotError> {
        self.services.reply(Persona::Parent, chat_id, text).await
    }

    async fn process(&self, msg: &UnifiedMessage) -> Result<(), CrambotError> {
        let s = &self.services;
        let Some(text) = group::addressed_text(msg, s.bot_username(Persona::Parent)) else {
            debug!(chat_id = %msg.chat_id, "group message not addressed to the bot");
            return Ok(());
        };
        if !s.admit(Persona::Parent, msg).await? {
            return Ok(());
        }
        // The parent bot sends no buttons; admission already answered the press.
        if msg.is_callback() {
            return Ok(());
        }

        let command = parse_command(&text);
        match command.map(|c| c.name) {
            Some("start") => return self.reply(&msg.chat_id, views::WELCOME_TEXT).await,
            Some("bind") => {
                let args = command.map(|c| c.args).unwrap_or_default();
                return self.bind(msg, args).await;
            }
            _ => {}
        }

        let Some(binding) = s.store.get_parent_binding(&msg.user_id).await? else {
            return self.reply(&msg.chat_id, views::UNBOUND_TEXT).await;
        };
        self.touch(&binding);

        if command.is_some_and(|c| c.name == "help") {
            return self.reply(&msg.chat_id, views::HELP_TEXT).await;
        }

        let result = self.classify(&text, &binding).await;
        debug!(user_id = %msg.user_id, intent = %result.intent, "parent message classified");

        let answer = self.answer(msg, &binding, &result).await?;
        self.reply(&msg.chat_id, &answer).await?;
        self.log_turn(msg, &binding, &text, &answer, &result.intent);
        Ok(())
    }

    async fn answer(
        &self,
        msg: &UnifiedMessage,
        binding: &ParentBinding,
        result: &IntentResult,
    ) -> Result<String, CrambotError> {
        let personal = matches!(
            result.intent.as_str(),
            intents::LEAVE | intents::ATTENDANCE | intents::PAYMENTS | intents::SCHEDULE
        );
        if personal && msg.chat_type != ChatType::Private {
            return Ok(views::private_redirect(
                self.services.bot_username(Persona::Parent),
            ));
        }

        if result.need_clarification {
            if let Some(question) = result.clarification_question.as_deref() {
                return Ok(format!("🤔 {question}"));
            }
        }

        match result.intent.as_str() {
            intents::LEAVE => self.leave(msg, binding, &result.params).await,
            intents::ATTENDANCE | intents::PAYMENTS | intents::SCHEDULE => {
                self.query(binding, result).await
            }
            intents::HELP => Ok(views::HELP_TEXT.to_string()),
            _ => Ok(views::unknown_text(&binding.children)),
        }
    }

    /// Records the turn for staff review in the background.
    fn log_turn(
        &self,
        msg: &UnifiedMessage,
        binding: &ParentBinding,
        question: &str,
        answer: &str,
        intent: &str,
    ) {
        let entry = ConversationEntry {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: binding.tenant_id.clone(),
            parent_user_id: msg.user_id.clone(),
            parent_name: msg.user_name.clone(),
            chat_type: msg.chat_type,
            user_message: question.to_string(),
            bot_response: answer.to_string(),
            intent: intent.to_string(),
            created_at: Utc::now(),
        };
        let store = self.services.store.clone();
        self.services.tasks.spawn_detached("parent_conversation", async move {
            store.append_conversation(&entry).await
        });
    }

    /// Classifies with the AI provider, falling back to keyword rules when it
    /// fails or cannot place the message, then fills in missing parameters.
    async fn classify(&self, text: &str, binding: &ParentBinding) -> IntentResult {
        let s = &self.services;
        let today = calendar::today();
        let context = ClassifierContext {
            persona: Persona::Parent,
            tenant_name: String::new(),
            snapshot: None,
            children: binding.children.clone(),
        };

        let mut result = match s.classifier.classify(text, &context).await {
            Ok(result) => {
                s.count_usage(&binding.tenant_id, UsageKind::AiCalls);
                if result.intent == IntentResult::UNKNOWN {
                    let fallback = parent_rules::parse(text, &binding.children, today);
                    if fallback.intent != IntentResult::UNKNOWN {
                        return fallback;
                    }
                }
                result
            }
            Err(e) => {
                warn!(classifier = s.classifier.name(), error = %e, "parent classification failed, using keywords");
                metrics::counter!("crambot_classification_failures_total").increment(1);
                return parent_rules::parse(text, &binding.children, today);
            }
        };
        parent_rules::complete_params(&mut result, text, &binding.children, today);
        result
    }

    /// Refreshes `last_active_at` in the background.
    fn touch(&self, binding: &ParentBinding) {
        let mut binding = binding.clone();
        binding.last_active_at = Utc::now();
        let store = self.services.store.clone();
        self.services
            .tasks
            .spawn_detached("parent_touch", async move { store.put_parent_binding(&binding).await });
    }

    /// `/bind <code>`: adds the invited child to the parent's binding.
    async fn bind(&self, msg: &UnifiedMessage, args: &str) -> Result<(), CrambotError> {
        let s = &self.services;
        let code = args.trim();
        if code.chars().count() != BIND_CODE_LEN {
            return self.reply(&msg.chat_id, BIND_FORMAT_TEXT).await;
        }

        let invite = match s.store.get_bind_code(code).await? {
            Some(c) if c.kind == BindKind::Parent => c,
            _ => return self.reply(&msg.chat_id, INVITE_MISSING_TEXT).await,
        };
        let (Some(student_id), Some(student_name)) =
            (invite.student_id.clone(), invite.student_name.clone())
        else {
            warn!(code, "parent invite without a student");
            return self.reply(&msg.chat_id, INVITE_MISSING_TEXT).await;
        };
        if invite.used_by.is_some() {
            return self.reply(&msg.chat_id, INVITE_USED_TEXT).await;
        }
        if invite.expires_at < Utc::now() {
            return self.reply(&msg.chat_id, INVITE_EXPIRED_TEXT).await;
        }

        let existing = s
            .store
            .get_parent_binding(&msg.user_id)
            .await?
            .filter(|b| b.tenant_id == invite.tenant_id);
        if existing
            .as_ref()
            .is_some_and(|b| b.children.iter().any(|c| c.student_id == student_id))
        {
            return self.reply(&msg.chat_id, ALREADY_BOUND_TEXT).await;
        }
        if !s.store.consume_bind_code(code, &msg.user_id).await? {
            return self.reply(&msg.chat_id, INVITE_USED_TEXT).await;
        }

        let now = Utc::now();
        let child = ParentChild {
            student_id,
            student_name: student_name.clone(),
            relation: RELATION.to_string(),
        };
        let binding = match existing {
            Some(mut b) => {
                b.children.push(child);
                b.last_active_at = now;
                b
            }
            None => ParentBinding {
                user_id: msg.user_id.clone(),
                tenant_id: invite.tenant_id.clone(),
                parent_name: msg.user_name.clone(),
                children: vec![child],
                created_at: now,
                last_active_at: now,
            },
        };
        s.store.put_parent_binding(&binding).await?;
        info!(user_id = %msg.user_id, tenant_id = %binding.tenant_id, "parent bound");

        let text = format!(
            "✅ 綁定成功！\n👤 學生：{student_name}\n\n現在您可以查詢孩子的資訊，例如：\n「查出缺勤」、「查繳費」、「查課表」、「幫小明請假」"
        );
        self.reply(&msg.chat_id, &text).await
    }

    async fn leave(
        &self,
        msg: &UnifiedMessage,
        binding: &ParentBinding,
        params: &Params,
    ) -> Result<String, CrambotError> {
        let s = &self.services;
        let student_id = param_str(params, "student_id");
        let child_name = param_str(params, "child_name");

        let Some(student_id) = student_id else {
            let text = match binding.children.as_slice() {
                [only] => format!(
                    "📝 請告訴我請假的日期和原因，例如「幫{}明天請假，腸胃炎」",
                    only.student_name
                ),
                children => format!(
                    "📝 請問要幫哪位孩子請假呢？\n\n{}\n\n請輸入孩子的名字，例如「幫小明明天請假」",
                    views::numbered(children)
                ),
            };
            return Ok(text);
        };
        let child_name = child_name.unwrap_or_else(|| "未知".to_string());

        let Some(date) = param_str(params, "date") else {
            let text = format!(
                "📅 請問 {child_name} 要請哪一天的假呢？\n\n例如「明天」、「1/5」、「1月5日」"
            );
            return Ok(text);
        };
        let reason = param_str(params, "reason")
            .unwrap_or_else(|| parent_rules::DEFAULT_LEAVE_REASON.to_string());

        let mut body = Params::new();
        body.insert("student_id".into(), json!(student_id));
        body.insert("student_name".into(), json!(child_name));
        body.insert("date".into(), json!(date));
        body.insert("reason".into(), json!(reason));
        let validated = s
            .dispatcher
            .api()
            .call(ApiRequest::parent(
                BusinessModule::Inclass,
                ApiMethod::Post,
                "/leave",
                &binding.tenant_id,
                body,
            ))
            .await;
        s.count_usage(&binding.tenant_id, UsageKind::ApiCalls);
        if !validated.is_success() {
            let text = format!(
                "⚠️ 請假申請失敗：{}，請稍後再試 🙏",
                validated.message().unwrap_or("系統錯誤")
            );
            return Ok(text);
        }

        let request_id = s
            .bridge
            .create_request(NewCrossBotRequest {
                kind: CrossBotKind::LeaveRequest,
                from: Persona::Parent,
                to: Persona::Admin,
                tenant_id: binding.tenant_id.clone(),
                student_id,
                student_name: child_name.clone(),
                requester_user_id: msg.user_id.clone(),
                requester_chat_id: msg.chat_id.clone(),
                data: json!({ "date": date, "reason": reason }),
            })
            .await?;
        match s.bridge.get(&request_id).await {
            Ok(Some(request)) => {
                let responder = s.bridge.notify_responder(&request).await;
                debug!(request_id = %request_id, responder = ?responder, "leave request filed");
            }
            Ok(None) => warn!(request_id = %request_id, "new request vanished before notice"),
            Err(e) => warn!(request_id = %request_id, error = %e, "responder notice skipped"),
        }

        Ok(format!(
            "📝 收到！我已經幫您向老師提出 <b>{child_name}</b> {date} 的請假申請，原因：{reason}。\n\n老師確認後會立即通知您，祝早日康復 🙏"
        ))
    }

    async fn query(
        &self,
        binding: &ParentBinding,
        result: &IntentResult,
    ) -> Result<String, CrambotError> {
        let s = &self.services;
        let Some(student_id) = result.param_str("student_id") else {
            return Ok(views::which_child(&binding.children));
        };
        let child = result
            .param_str("child_name")
            .unwrap_or_else(|| "您的孩子".to_string());
        let tenant = binding.tenant_id.as_str();
        let api = s.dispatcher.api();
        let get = |module, path: String| {
            ApiRequest::parent(module, ApiMethod::Get, &path, tenant, Params::new())
        };

        let text = match result.intent.as_str() {
            intents::ATTENDANCE => {
                let (summary, records) = tokio::join!(
                    api.call(get(BusinessModule::Inclass, format!("/attendance/{student_id}/summary"))),
                    api.call(get(BusinessModule::Inclass, format!("/attendance/{student_id}"))),
                );
                views::attendance(&child, &summary, &records)
            }
            intents::PAYMENTS => {
                let (status, history) = tokio::join!(
                    api.call(get(BusinessModule::Manage, format!("/payments/{student_id}/status"))),
                    api.call(get(BusinessModule::Manage, format!("/payments/{student_id}"))),
                );
                views::payments(&child, &status, &history)
            }
            _ => {
                let response = api
                    .call(get(BusinessModule::Inclass, format!("/schedule/{student_id}")))
                    .await;
                views::schedule(&child, &response)
            }
        };
        s.count_usage(&binding.tenant_id, UsageKind::ApiCalls);

        Ok(text.unwrap_or_else(|| {
            warn!(intent = %result.intent, tenant_id = %tenant, "parent query failed");
            QUERY_FAILED_TEXT.to_string()
        }))
    }
}
