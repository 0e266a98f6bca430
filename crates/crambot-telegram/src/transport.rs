// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound Bot API calls for one bot persona.

use async_trait::async_trait;
use metrics::counter;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId,
    ParseMode as TgParseMode,
};
use teloxide::RequestError;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crambot_core::types::{
    AdapterType, HealthStatus, InlineButton, MessageRef, ParseMode, Persona, SendOptions,
};
use crambot_core::{ChatTransport, CrambotError, PluginAdapter};

use crate::retry::with_retry;

/// Telegram transport implementing [`ChatTransport`].
///
/// Sends go out one at a time per persona. Transient failures (network
/// errors and 429 flood control) are retried with backoff unless the
/// options ask for a single attempt; other API errors fail immediately.
pub struct TelegramTransport {
    bot: Bot,
    persona: Persona,
    name: String,
    send_lock: Mutex<()>,
}

impl TelegramTransport {
    /// Creates a transport for `persona`. `api_url` overrides the Bot API server.
    pub fn new(persona: Persona, token: &str, api_url: Option<&str>) -> Result<Self, CrambotError> {
        if token.is_empty() {
            return Err(CrambotError::Config(format!(
                "telegram token for the {persona} bot cannot be empty"
            )));
        }

        let mut bot = Bot::new(token);
        if let Some(url) = api_url {
            let url = reqwest::Url::parse(url)
                .map_err(|e| CrambotError::Config(format!("invalid telegram.api_url: {e}")))?;
            bot = bot.set_api_url(url);
        }

        Ok(Self {
            bot,
            persona,
            name: format!("telegram-{persona}"),
            send_lock: Mutex::new(()),
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// The bot's `@username` as reported by `getMe`.
    pub async fn username(&self) -> Result<Option<String>, CrambotError> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| transport_error("look up bot identity", e))?;
        Ok(me.user.username.clone())
    }
}

/// Network errors and flood control are worth another attempt.
pub fn is_transient(e: &RequestError) -> bool {
    matches!(
        e,
        RequestError::Network(_) | RequestError::RetryAfter(_) | RequestError::Io(_)
    )
}

fn is_not_modified(e: &RequestError) -> bool {
    e.to_string().contains("message is not modified")
}

fn parse_chat_id(chat_id: &str) -> Result<ChatId, CrambotError> {
    chat_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| CrambotError::Transport {
            message: format!("invalid chat_id {chat_id:?}: {e}"),
            source: None,
        })
}

fn parse_message_id(message_id: &str) -> Result<MessageId, CrambotError> {
    message_id
        .parse::<i32>()
        .map(MessageId)
        .map_err(|e| CrambotError::Transport {
            message: format!("invalid message_id {message_id:?}: {e}"),
            source: None,
        })
}

/// Builds the Bot API inline keyboard.
pub fn keyboard(rows: &[Vec<InlineButton>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.callback_data.clone()))
            .collect::<Vec<_>>()
    }))
}

fn transport_error(action: &str, e: RequestError) -> CrambotError {
    CrambotError::Transport {
        message: format!("failed to {action}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for TelegramTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CrambotError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), CrambotError> {
        // Wait for an in-flight send to finish.
        let _guard = self.send_lock.lock().await;
        debug!(persona = %self.persona, "telegram transport shut down");
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<MessageRef, CrambotError> {
        let chat = parse_chat_id(chat_id)?;
        let _guard = self.send_lock.lock().await;

        let retryable = |e: &RequestError| !options.single_attempt && is_transient(e);
        let result = with_retry("sendMessage", retryable, || {
            let mut request = self.bot.send_message(chat, text);
            if options.parse_mode == ParseMode::Html {
                request = request.parse_mode(TgParseMode::Html);
            }
            if let Some(rows) = &options.keyboard {
                request = request.reply_markup(keyboard(rows));
            }
            async move { request.await }
        })
        .await;

        match result {
            Ok(sent) => {
                counter!("crambot_telegram_sends_total", "persona" => self.persona.to_string(), "outcome" => "ok")
                    .increment(1);
                Ok(MessageRef(sent.id.0.to_string()))
            }
            Err(e) => {
                counter!("crambot_telegram_sends_total", "persona" => self.persona.to_string(), "outcome" => "error")
                    .increment(1);
                warn!(persona = %self.persona, chat_id, error = %e, "sendMessage failed");
                Err(transport_error("send message", e))
            }
        }
    }

    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<(), CrambotError> {
        let chat = parse_chat_id(chat_id)?;
        let message = parse_message_id(message_id)?;

        let retryable = |e: &RequestError| !options.single_attempt && is_transient(e);
        let result = with_retry("editMessageText", retryable, || {
            let mut request = self.bot.edit_message_text(chat, message, text);
            if options.parse_mode == ParseMode::Html {
                request = request.parse_mode(TgParseMode::Html);
            }
            if let Some(rows) = &options.keyboard {
                request = request.reply_markup(keyboard(rows));
            }
            async move { request.await }
        })
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => {
                warn!(persona = %self.persona, chat_id, message_id, error = %e, "editMessageText failed");
                Err(transport_error("edit message", e))
            }
        }
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), CrambotError> {
        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(text) = text {
            request = request.text(text);
        }
        request
            .await
            .map(|_| ())
            .map_err(|e| transport_error("answer callback", e))
    }
}
