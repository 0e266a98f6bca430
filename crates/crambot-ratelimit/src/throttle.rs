// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound transport held under the global send ceiling.

use std::sync::Arc;

use async_trait::async_trait;
use crambot_core::types::{AdapterType, HealthStatus, MessageRef, SendOptions};
use crambot_core::{ChatTransport, CrambotError, PluginAdapter};

use crate::RateLimiter;

/// Wraps a transport so every send and edit first takes a slot under
/// [`RateLimiter::wait_global`]. Callback answers are not messages and pass
/// straight through.
pub struct ThrottledTransport {
    inner: Arc<dyn ChatTransport>,
    limiter: Arc<RateLimiter>,
}

impl ThrottledTransport {
    pub fn wrap(inner: Arc<dyn ChatTransport>, limiter: Arc<RateLimiter>) -> Arc<dyn ChatTransport> {
        Arc::new(Self { inner, limiter })
    }
}

#[async_trait]
impl PluginAdapter for ThrottledTransport {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CrambotError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), CrambotError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl ChatTransport for ThrottledTransport {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<MessageRef, CrambotError> {
        self.limiter.wait_global().await;
        self.inner.send_message(chat_id, text, options).await
    }

    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<(), CrambotError> {
        self.limiter.wait_global().await;
        self.inner
            .edit_message_text(chat_id, message_id, text, options)
            .await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), CrambotError> {
        self.inner.answer_callback(callback_id, text).await
    }
}
