// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook update parsing.
//!
//! Only the fields the gateway reads are modelled; everything else in the
//! Bot API payload is ignored. [`parse_update`] turns a text message or a
//! button press into a [`UnifiedMessage`] and drops everything else.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crambot_core::types::{ChatType, MessageKind, Persona, Platform, UnifiedMessage};

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    /// Unix seconds. Zero for inaccessible messages.
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<Box<TelegramMessage>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl TelegramUser {
    /// First and last name, falling back to the username.
    pub fn display_name(&self) -> String {
        let full = match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        };
        if full.trim().is_empty() {
            self.username.clone().unwrap_or_default()
        } else {
            full
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

fn chat_type(kind: &str) -> ChatType {
    match kind {
        "group" => ChatType::Group,
        "supergroup" => ChatType::Supergroup,
        "channel" => ChatType::Channel,
        _ => ChatType::Private,
    }
}

fn timestamp(unix: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix, 0)
        .filter(|_| unix > 0)
        .unwrap_or_else(Utc::now)
}

/// Normalizes one webhook update received by the `persona` bot.
///
/// Returns `None` for updates the gateway does not handle (edits, stickers,
/// joins, messages without a sender).
pub fn parse_update(update: &TelegramUpdate, persona: Persona) -> Option<UnifiedMessage> {
    if let Some(query) = &update.callback_query {
        let (chat_id, chat_kind, message_id) = match &query.message {
            Some(m) => (m.chat.id, chat_type(&m.chat.kind), Some(m.message_id.to_string())),
            None => (query.from.id, ChatType::Private, None),
        };
        return Some(UnifiedMessage {
            platform: Platform::Telegram,
            persona,
            user_id: query.from.id.to_string(),
            user_name: query.from.display_name(),
            chat_id: chat_id.to_string(),
            chat_type: chat_kind,
            kind: MessageKind::Callback,
            content: query.data.clone().unwrap_or_default(),
            callback_id: Some(query.id.clone()),
            reply_to_message_id: message_id,
            timestamp: Utc::now(),
        });
    }

    let message = update.message.as_ref()?;
    let text = message.text.as_ref()?;
    let from = message.from.as_ref()?;
    Some(UnifiedMessage {
        platform: Platform::Telegram,
        persona,
        user_id: from.id.to_string(),
        user_name: from.display_name(),
        chat_id: message.chat.id.to_string(),
        chat_type: chat_type(&message.chat.kind),
        kind: MessageKind::Text,
        content: text.clone(),
        callback_id: None,
        reply_to_message_id: message
            .reply_to_message
            .as_ref()
            .map(|m| m.message_id.to_string()),
        timestamp: timestamp(message.date),
    })
}
