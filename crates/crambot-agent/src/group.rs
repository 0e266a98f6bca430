// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Which group-chat messages are addressed to the bot.
//!
//! In a group the bot only speaks when spoken to: a slash command not
//! aimed at another bot, or a message that `@mentions` it. Private chats
//! and button presses always reach the flow.

use crambot_core::types::{ChatType, UnifiedMessage};
use regex::RegexBuilder;

/// Stands in for a bare mention with no question attached.
pub const BARE_MENTION_TEXT: &str = "你好";

/// Returns the text the flow should act on, or `None` when the message is
/// group chatter the bot must ignore.
///
/// Mentions of `username` are stripped from the returned text.
pub fn addressed_text(msg: &UnifiedMessage, username: Option<&str>) -> Option<String> {
    let text = msg.text();
    if msg.chat_type == ChatType::Private || msg.is_callback() {
        return Some(text.to_string());
    }
    let username = username.map(|u| u.trim_start_matches('@'));

    if let Some(rest) = text.strip_prefix('/') {
        let head = rest.split(char::is_whitespace).next().unwrap_or(rest);
        return match head.split_once('@') {
            Some((_, target)) => username
                .is_some_and(|u| target.eq_ignore_ascii_case(u))
                .then(|| text.to_string()),
            None => Some(text.to_string()),
        };
    }

    let username = username.filter(|u| !u.is_empty())?;
    let mention = RegexBuilder::new(&format!(r"@{}\b", regex::escape(username)))
        .case_insensitive(true)
        .build()
        .ok()?;
    if !mention.is_match(text) {
        return None;
    }
    let cleaned = mention.replace_all(text, "");
    let cleaned = cleaned.trim();
    Some(if cleaned.is_empty() {
        BARE_MENTION_TEXT.to_string()
    } else {
        cleaned.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crambot_core::types::{MessageKind, Persona, Platform};

    fn message(chat_type: ChatType, body: &str) -> UnifiedMessage {
        UnifiedMessage {
            platform: Platform::Telegram,
            persona: Persona::Parent,
            user_id: "p1".into(),
            user_name: "陳媽媽".into(),
            chat_id: "-100200".into(),
            chat_type,
            kind: MessageKind::Text,
            content: body.into(),
            callback_id: None,
            reply_to_message_id: None,
            timestamp: Utc::now(),
        }
    }

    const BOT: Option<&str> = Some("CramParentBot");

    #[test]
    fn private_chats_always_pass() {
        let msg = message(ChatType::Private, "查繳費");
        assert_eq!(addressed_text(&msg, None).as_deref(), Some("查繳費"));
    }

    #[test]
    fn group_chatter_is_ignored() {
        let msg = message(ChatType::Group, "今天下雨好大");
        assert_eq!(addressed_text(&msg, BOT), None);
        assert_eq!(addressed_text(&msg, None), None);
    }

    #[test]
    fn mention_is_stripped_case_insensitively() {
        let msg = message(ChatType::Supergroup, "@cramparentbot 補習班幾點開門？");
        assert_eq!(addressed_text(&msg, BOT).as_deref(), Some("補習班幾點開門？"));

        let bare = message(ChatType::Group, "@CramParentBot");
        assert_eq!(addressed_text(&bare, BOT).as_deref(), Some(BARE_MENTION_TEXT));
    }

    #[test]
    fn a_longer_username_is_not_a_mention() {
        let msg = message(ChatType::Group, "@CramParentBot2 在嗎");
        assert_eq!(addressed_text(&msg, BOT), None);
    }

    #[test]
    fn commands_pass_unless_aimed_at_another_bot() {
        let plain = message(ChatType::Group, "/help");
        assert_eq!(addressed_text(&plain, BOT).as_deref(), Some("/help"));

        let ours = message(ChatType::Group, "/help@cramparentbot");
        assert!(addressed_text(&ours, BOT).is_some());

        let theirs = message(ChatType::Group, "/help@OtherBot");
        assert_eq!(addressed_text(&theirs, BOT), None);
    }
}
