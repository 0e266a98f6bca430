// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared builders for the conversation-flow tests.

#![allow(dead_code)]

use chrono::Utc;
use crambot_agent::{BotServices, Bots};
use crambot_bridge::Transports;
use crambot_core::types::{ChatType, MessageKind, Persona, Platform, UnifiedMessage};
use crambot_test_utils::TestHarness;

pub fn bots(h: &TestHarness) -> Bots {
    Bots::new(BotServices::new(
        &h.config,
        h.store(),
        h.kv(),
        h.classifier(),
        h.api(),
        Transports {
            admin: h.admin(),
            parent: h.parent(),
        },
        h.tasks.clone(),
    ))
}

/// A private-chat text message; the chat id equals the user id.
pub fn text(persona: Persona, user_id: &str, body: &str) -> UnifiedMessage {
    UnifiedMessage {
        platform: Platform::Telegram,
        persona,
        user_id: user_id.to_string(),
        user_name: "王老師".to_string(),
        chat_id: user_id.to_string(),
        chat_type: ChatType::Private,
        kind: MessageKind::Text,
        content: body.to_string(),
        callback_id: None,
        reply_to_message_id: None,
        timestamp: Utc::now(),
    }
}

/// A text message posted by `user_id` in a group chat.
pub fn group_text(persona: Persona, user_id: &str, body: &str) -> UnifiedMessage {
    UnifiedMessage {
        chat_id: "-100200".to_string(),
        chat_type: ChatType::Supergroup,
        ..text(persona, user_id, body)
    }
}

/// A button press on message `message_id`.
pub fn press(persona: Persona, user_id: &str, data: &str, message_id: &str) -> UnifiedMessage {
    UnifiedMessage {
        kind: MessageKind::Callback,
        callback_id: Some(format!("cb-{data}")),
        reply_to_message_id: Some(message_id.to_string()),
        ..text(persona, user_id, data)
    }
}
