// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slash commands of the admin bot.

use std::sync::LazyLock;

use chrono::Utc;
use crambot_bridge::bridge::{decision_keyboard, responder_notice};
use crambot_core::CrambotError;
use crambot_core::types::{
    ApiRequest, ApiResponse, AuthContext, BindKind, BusinessModule, ChatType, ConversationEntry,
    ItemRef, Params, Persona, SendOptions, StudentRef, TenantBinding, TenantSnapshot,
    UnifiedMessage, WarehouseRef,
};
use crambot_dispatch::{calendar, catalog};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::services::BotServices;

pub const HELP_TEXT: &str = "📖 94CramBot 使用說明\n\n\
直接輸入指令就可以，例如：\n\
「陳小明今天請假」\n\
「高二陳小明繳5000元」\n\
「今天誰沒到」\n\
「紙杯出貨 20 個到大安分校」\n\n\
會改動資料的操作都會先請你確認，按下 ✅ 才會執行。\n\n\
/bind 123456 綁定補習班\n\
/switch 切換補習班\n\
/sync 同步學生與品項資料\n\
/pending 查看待處理事項\n\
/conversations 查看家長對話紀錄\n\
/help 查看使用說明";

pub const BIND_FORMAT_TEXT: &str = "❌ 格式錯誤，請輸入：/bind 123456";
pub const BIND_MISSING_TEXT: &str = "❌ 綁定碼不存在或已過期";
pub const BIND_USED_TEXT: &str = "❌ 此綁定碼已被使用";
pub const BIND_EXPIRED_TEXT: &str = "❌ 綁定碼已過期，請重新生成";

pub const SWITCH_UNBOUND_TEXT: &str = "❌ 尚未綁定任何補習班，請先使用 /bind";
pub const SWITCH_INVALID_TEXT: &str = "❌ 無效的選擇";

pub const SYNC_UNBOUND_TEXT: &str = "❌ 尚未綁定補習班，請先使用 /bind";
pub const SYNC_STARTED_TEXT: &str = "🔄 正在同步資料...";

pub const PENDING_NONE_TEXT: &str = "✅ 目前沒有待處理的事項";
pub const CONVERSATIONS_EMPTY_TEXT: &str = "📭 目前還沒有家長對話紀錄";

const CONVERSATION_LIST_LIMIT: u32 = 15;
/// Digests longer than this are cut to stay under Telegram's 4096 limit.
const DIGEST_MAX_CHARS: usize = 4000;
const DIGEST_CUT_CHARS: usize = 3950;
const DIGEST_MORE_TEXT: &str = "\n\n⋯（更多紀錄請查看後台）";

/// Bind codes are six characters long.
pub const BIND_CODE_LEN: usize = 6;

/// A slash command split into its name and argument string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    pub name: &'a str,
    pub args: &'a str,
}

/// Parses `/name@bot args`. Returns `None` for anything that is not a command.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some(Command { name, args })
}

pub async fn help(services: &BotServices, msg: &UnifiedMessage) -> Result<(), CrambotError> {
    services.reply(Persona::Admin, &msg.chat_id, HELP_TEXT).await
}

/// `/bind <code>`: consumes an admin bind code and binds the user to its tenant.
pub async fn bind(services: &BotServices, msg: &UnifiedMessage, args: &str) -> Result<(), CrambotError> {
    let code = args.trim();
    if code.chars().count() != BIND_CODE_LEN {
        return services.reply(Persona::Admin, &msg.chat_id, BIND_FORMAT_TEXT).await;
    }

    let bind_code = match services.store.get_bind_code(code).await? {
        Some(c) if c.kind == BindKind::Admin => c,
        _ => return services.reply(Persona::Admin, &msg.chat_id, BIND_MISSING_TEXT).await,
    };
    if bind_code.used_by.is_some() {
        return services.reply(Persona::Admin, &msg.chat_id, BIND_USED_TEXT).await;
    }
    if bind_code.expires_at < Utc::now() {
        return services.reply(Persona::Admin, &msg.chat_id, BIND_EXPIRED_TEXT).await;
    }
    if !services.store.consume_bind_code(code, &msg.user_id).await? {
        return services.reply(Persona::Admin, &msg.chat_id, BIND_USED_TEXT).await;
    }

    services
        .store
        .add_user_binding(
            &msg.user_id,
            &TenantBinding {
                tenant_id: bind_code.tenant_id.clone(),
                tenant_name: bind_code.tenant_name.clone(),
                role: "admin".to_string(),
            },
        )
        .await?;
    info!(user_id = %msg.user_id, tenant_id = %bind_code.tenant_id, "admin bound");

    let text = format!(
        "✅ 綁定成功！\n🏫 {}\n\n現在可以直接輸入指令操作，例如：\n「陳小明今天請假」\n「高二陳小明繳5000元」",
        bind_code.tenant_name
    );
    services.reply(Persona::Admin, &msg.chat_id, &text).await
}

/// `/switch [n]`: lists the user's tenants or activates the n-th one.
pub async fn switch(services: &BotServices, msg: &UnifiedMessage, args: &str) -> Result<(), CrambotError> {
    let binding = match services.store.get_user_binding(&msg.user_id).await? {
        Some(b) if !b.bindings.is_empty() => b,
        _ => return services.reply(Persona::Admin, &msg.chat_id, SWITCH_UNBOUND_TEXT).await,
    };

    if binding.bindings.len() == 1 {
        let text = format!("你只有綁定一間補習班：{}", binding.active_tenant_name);
        return services.reply(Persona::Admin, &msg.chat_id, &text).await;
    }

    let choice = args.trim();
    if choice.is_empty() {
        let list: Vec<String> = binding
            .bindings
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let current = if b.tenant_id == binding.active_tenant_id {
                    " ← 目前"
                } else {
                    ""
                };
                format!("{}\u{fe0f}\u{20e3} {}{current}", i + 1, b.tenant_name)
            })
            .collect();
        let text = format!(
            "🏫 你管理的補習班：\n{}\n\n請回覆數字切換，例如：/switch 2",
            list.join("\n")
        );
        return services.reply(Persona::Admin, &msg.chat_id, &text).await;
    }

    let target = choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| binding.bindings.get(i));
    let Some(target) = target else {
        return services.reply(Persona::Admin, &msg.chat_id, SWITCH_INVALID_TEXT).await;
    };

    if !services
        .store
        .switch_active_tenant(&msg.user_id, &target.tenant_id)
        .await?
    {
        return services.reply(Persona::Admin, &msg.chat_id, SWITCH_INVALID_TEXT).await;
    }
    info!(user_id = %msg.user_id, tenant_id = %target.tenant_id, "active tenant switched");
    let text = format!("✅ 已切換到：{}\n接下來的操作都會在這裡執行。", target.tenant_name);
    services.reply(Persona::Admin, &msg.chat_id, &text).await
}

async fn active_context(
    services: &BotServices,
    msg: &UnifiedMessage,
) -> Result<Option<AuthContext>, CrambotError> {
    Ok(services
        .store
        .get_user_binding(&msg.user_id)
        .await?
        .and_then(|b| b.active_context()))
}

/// `/sync`: refreshes the tenant snapshot from the business modules.
pub async fn sync(services: &BotServices, msg: &UnifiedMessage) -> Result<(), CrambotError> {
    let Some(auth) = active_context(services, msg).await? else {
        return services.reply(Persona::Admin, &msg.chat_id, SYNC_UNBOUND_TEXT).await;
    };

    services
        .reply(Persona::Admin, &msg.chat_id, SYNC_STARTED_TEXT)
        .await?;

    let api = services.dispatcher.api();
    let empty = Params::new();
    let tenant = auth.tenant_id.as_str();
    let (students, classes, items, warehouses) = tokio::join!(
        api.call(ApiRequest::bot(BusinessModule::Manage, "/data/students", tenant, &empty)),
        api.call(ApiRequest::bot(BusinessModule::Manage, "/data/classes", tenant, &empty)),
        api.call(ApiRequest::bot(BusinessModule::Stock, "/data/items", tenant, &empty)),
        api.call(ApiRequest::bot(BusinessModule::Stock, "/data/warehouses", tenant, &empty)),
    );

    let snapshot = TenantSnapshot {
        students: list_of::<StudentRef>(&students),
        classes: class_names(&classes),
        items: list_of::<ItemRef>(&items),
        warehouses: list_of::<WarehouseRef>(&warehouses),
        tenant_name: Some(auth.tenant_name.clone()),
        tenant_address: None,
        last_synced_at: Utc::now(),
    };
    let text = format!(
        "✅ 同步完成！\n📚 學生 {} 人\n🏫 班級 {} 個\n📦 品項 {} 個\n🏪 倉庫 {} 個",
        snapshot.students.len(),
        snapshot.classes.len(),
        snapshot.items.len(),
        snapshot.warehouses.len(),
    );
    services.cache.set(&auth.tenant_id, snapshot).await?;
    info!(tenant_id = %auth.tenant_id, "tenant snapshot synced");
    services.reply(Persona::Admin, &msg.chat_id, &text).await
}

/// `/pending`: the user's own unanswered confirmation and the tenant's open
/// parent requests. Each request is sent again with its decision buttons.
pub async fn pending(services: &BotServices, msg: &UnifiedMessage) -> Result<(), CrambotError> {
    let Some(auth) = active_context(services, msg).await? else {
        return services.reply(Persona::Admin, &msg.chat_id, SYNC_UNBOUND_TEXT).await;
    };
    let own = services.actions.latest_for_user(&msg.user_id).await?;
    let requests = services.bridge.list_pending(&auth.tenant_id).await?;
    if own.is_none() && requests.is_empty() {
        return services.reply(Persona::Admin, &msg.chat_id, PENDING_NONE_TEXT).await;
    }

    if let Some(action) = own {
        let text = format!(
            "⏳ 你有一筆操作等待確認：{}\n請在先前的確認訊息按下 ✅ 或 ❌",
            catalog::label(&action.intent)
        );
        services.reply(Persona::Admin, &msg.chat_id, &text).await?;
    }
    if requests.is_empty() {
        return Ok(());
    }

    let header = format!(
        "📩 {} 有 {} 筆家長申請待處理：",
        auth.tenant_name,
        requests.len()
    );
    services.reply(Persona::Admin, &msg.chat_id, &header).await?;
    let transport = services.transport(Persona::Admin);
    for request in &requests {
        let options = SendOptions::with_keyboard(decision_keyboard(&request.id));
        transport
            .send_message(&msg.chat_id, &responder_notice(request), &options)
            .await?;
    }
    Ok(())
}

/// `/conversations`: recent parent-bot turns of the active tenant.
pub async fn conversations(services: &BotServices, msg: &UnifiedMessage) -> Result<(), CrambotError> {
    let Some(auth) = active_context(services, msg).await? else {
        return services.reply(Persona::Admin, &msg.chat_id, SYNC_UNBOUND_TEXT).await;
    };
    let turns = services
        .store
        .recent_conversations(&auth.tenant_id, CONVERSATION_LIST_LIMIT)
        .await?;
    let text = conversation_digest(&auth.tenant_name, &turns);
    services.reply(Persona::Admin, &msg.chat_id, &text).await
}

/// Renders turns newest first as one HTML message.
pub fn conversation_digest(tenant_name: &str, turns: &[ConversationEntry]) -> String {
    if turns.is_empty() {
        return CONVERSATIONS_EMPTY_TEXT.to_string();
    }

    let mut text = format!(
        "📋 <b>最近家長對話紀錄</b>\n🏫 {}\n\n",
        escape_html(tenant_name)
    );
    for turn in turns {
        let icon = if turn.chat_type == ChatType::Private {
            "👤"
        } else {
            "👥"
        };
        let time = calendar::local_time(turn.created_at).format("%-m/%-d %H:%M");
        text.push_str(&format!(
            "{icon} <b>{}</b>（{time}）\n💬 {}\n🤖 {}\n\n",
            escape_html(&turn.parent_name),
            escape_html(&truncate(&turn.user_message, 60)),
            escape_html(&truncate(&strip_tags(&turn.bot_response), 80)),
        ));
    }
    text.push_str(&format!("共 {} 筆紀錄", turns.len()));

    if text.chars().count() > DIGEST_MAX_CHARS {
        let cut = text
            .char_indices()
            .nth(DIGEST_CUT_CHARS)
            .map_or(text.len(), |(i, _)| i);
        // Cut between entries so no tag is left open.
        let end = text[..cut].rfind("\n\n").unwrap_or(cut);
        text.truncate(end);
        text.push_str(DIGEST_MORE_TEXT);
    }
    text
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars - 1).collect();
    cut.push('…');
    cut
}

fn strip_tags(html: &str) -> String {
    static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
    TAG.replace_all(html, "").into_owned()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Elements of an array payload that deserialize as `T`. Anything else is empty.
fn list_of<T: DeserializeOwned>(response: &ApiResponse) -> Vec<T> {
    let Some(Value::Array(rows)) = response.data() else {
        if let ApiResponse::Failure { error, .. } = response {
            warn!(error = %error, "sync source failed");
        }
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| serde_json::from_value(row.clone()).ok())
        .collect()
}

/// Classes arrive either as plain names or as `{ "name": ... }` objects.
fn class_names(response: &ApiResponse) -> Vec<String> {
    let Some(Value::Array(rows)) = response.data() else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| match row {
            Value::String(name) => Some(name.clone()),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect()
}
