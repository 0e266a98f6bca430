// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat transport for deterministic testing.
//!
//! `MockTransport` implements `ChatTransport`, capturing every send, edit
//! and callback answer for assertions. Chosen chats can be made to fail.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crambot_core::types::{AdapterType, HealthStatus, MessageRef, SendOptions};
use crambot_core::{ChatTransport, CrambotError, PluginAdapter};

/// A message passed to `send_message` or `edit_message_text`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat_id: String,
    pub message_id: String,
    pub text: String,
    pub options: SendOptions,
}

impl SentMessage {
    /// Callback data of every inline button, row by row.
    pub fn button_data(&self) -> Vec<String> {
        self.options
            .keyboard
            .iter()
            .flatten()
            .flatten()
            .map(|b| b.callback_data.clone())
            .collect()
    }
}

pub struct MockTransport {
    name: String,
    next_id: AtomicU64,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    edits: Arc<Mutex<Vec<SentMessage>>>,
    answers: Arc<Mutex<Vec<(String, Option<String>)>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockTransport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next_id: AtomicU64::new(100),
            sent: Arc::new(Mutex::new(Vec::new())),
            edits: Arc::new(Mutex::new(Vec::new())),
            answers: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Makes every send to `chat_id` fail with a transport error.
    pub async fn fail_chat(&self, chat_id: &str) {
        self.failing.lock().await.insert(chat_id.to_string());
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Messages sent to one chat, oldest first.
    pub async fn sent_to(&self, chat_id: &str) -> Vec<SentMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub async fn last_sent(&self) -> Option<SentMessage> {
        self.sent.lock().await.last().cloned()
    }

    pub async fn edits(&self) -> Vec<SentMessage> {
        self.edits.lock().await.clone()
    }

    pub async fn last_edit(&self) -> Option<SentMessage> {
        self.edits.lock().await.last().cloned()
    }

    pub async fn answers(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
        self.edits.lock().await.clear();
        self.answers.lock().await.clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new("mock-transport")
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
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
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CrambotError> {
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<MessageRef, CrambotError> {
        if self.failing.lock().await.contains(chat_id) {
            return Err(CrambotError::Transport {
                message: format!("chat {chat_id} unreachable"),
                source: None,
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.sent.lock().await.push(SentMessage {
            chat_id: chat_id.to_string(),
            message_id: id.clone(),
            text: text.to_string(),
            options: options.clone(),
        });
        Ok(MessageRef(id))
    }

    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<(), CrambotError> {
        self.edits.lock().await.push(SentMessage {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            text: text.to_string(),
            options: options.clone(),
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), CrambotError> {
        self.answers
            .lock()
            .await
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crambot_core::types::InlineButton;

    #[tokio::test]
    async fn captures_sends_with_increasing_ids() {
        let transport = MockTransport::default();
        let a = transport
            .send_message("c1", "hello", &SendOptions::default())
            .await
            .unwrap();
        let b = transport
            .send_message("c2", "world", &SendOptions::default())
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(transport.sent().await.len(), 2);
        assert_eq!(transport.sent_to("c2").await[0].text, "world");
    }

    #[tokio::test]
    async fn failing_chat_returns_transport_error() {
        let transport = MockTransport::default();
        transport.fail_chat("bad").await;
        let err = transport
            .send_message("bad", "x", &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CrambotError::Transport { .. }));
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn button_data_flattens_keyboard() {
        let transport = MockTransport::default();
        let options = SendOptions::with_keyboard(vec![vec![
            InlineButton::callback("✅", "confirm:a1"),
            InlineButton::callback("❌", "cancel:a1"),
        ]]);
        transport.send_message("c1", "ok?", &options).await.unwrap();
        let sent = transport.last_sent().await.unwrap();
        assert_eq!(sent.button_data(), vec!["confirm:a1", "cancel:a1"]);
    }
}
