// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound chat transport trait.

use async_trait::async_trait;

use crate::error::CrambotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageRef, SendOptions};

/// Outbound calls a bot persona makes against its messaging platform.
///
/// Each persona owns one transport bound to its own bot token.
#[async_trait]
pub trait ChatTransport: PluginAdapter {
    /// Sends a message and returns the platform message id.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<MessageRef, CrambotError>;

    /// Replaces the text (and keyboard) of a previously sent message.
    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<(), CrambotError>;

    /// Acknowledges a button press so the client stops its spinner.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), CrambotError>;
}
