// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Components shared by both bot personas.

use std::sync::Arc;

use crambot_actions::ConfirmManager;
use crambot_bridge::{CrossBotBridge, Transports};
use crambot_cache::TenantCache;
use crambot_config::model::CrambotConfig;
use crambot_core::types::{Persona, SendOptions, UnifiedMessage, UsageKind};
use crambot_core::{
    BackgroundTasks, BusinessApi, ChatTransport, CrambotError, DistributedCache,
    IntentClassifier, StorageAdapter,
};
use crambot_dispatch::Dispatcher;
use crambot_dispatch::usage::record_usage;
use crambot_ratelimit::{RateLimiter, ThrottledTransport};
use tracing::warn;

use crate::RATE_LIMITED_TEXT;

/// Everything a conversation flow needs, built once at start-up.
///
/// Cloning is cheap; every member is shared.
#[derive(Clone)]
pub struct BotServices {
    pub store: Arc<dyn StorageAdapter>,
    pub cache: TenantCache,
    pub limiter: Arc<RateLimiter>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub dispatcher: Dispatcher,
    pub actions: ConfirmManager,
    pub bridge: CrossBotBridge,
    pub transports: Transports,
    pub tasks: BackgroundTasks,
    admin_username: Option<String>,
    parent_username: Option<String>,
}

impl BotServices {
    pub fn new(
        config: &CrambotConfig,
        store: Arc<dyn StorageAdapter>,
        kv: Arc<dyn DistributedCache>,
        classifier: Arc<dyn IntentClassifier>,
        api: Arc<dyn BusinessApi>,
        transports: Transports,
        tasks: BackgroundTasks,
    ) -> Self {
        let dispatcher = Dispatcher::new(api);
        let limiter = Arc::new(RateLimiter::new(
            &config.rate_limit,
            kv.clone(),
            store.clone(),
            tasks.clone(),
        ));
        // Replies, edits and bridge notices all share the global send ceiling.
        let transports = Transports {
            admin: ThrottledTransport::wrap(transports.admin, limiter.clone()),
            parent: ThrottledTransport::wrap(transports.parent, limiter.clone()),
        };
        Self {
            cache: TenantCache::new(&config.cache, kv, store.clone(), tasks.clone()),
            limiter,
            actions: ConfirmManager::new(
                &config.actions,
                store.clone(),
                dispatcher.clone(),
                tasks.clone(),
            ),
            bridge: CrossBotBridge::new(&config.bridge, store.clone(), transports.clone()),
            classifier,
            dispatcher,
            transports,
            store,
            tasks,
            admin_username: config.telegram.admin_bot_username.clone(),
            parent_username: config.telegram.parent_bot_username.clone(),
        }
    }

    /// The persona's `@username`, when known.
    pub fn bot_username(&self, persona: Persona) -> Option<&str> {
        match persona {
            Persona::Admin => self.admin_username.as_deref(),
            Persona::Parent => self.parent_username.as_deref(),
        }
    }

    /// Runs per-user admission for one inbound event.
    ///
    /// A button press is always answered so the client stops its spinner; a
    /// refused press gets the notice as a toast, a refused message as a reply.
    pub async fn admit(&self, persona: Persona, msg: &UnifiedMessage) -> Result<bool, CrambotError> {
        let admitted = self.limiter.admit(&format!("{persona}:{}", msg.user_id)).await;
        if let Some(callback_id) = msg.callback_id.as_deref() {
            let toast = (!admitted).then_some(RATE_LIMITED_TEXT);
            if let Err(e) = self.transport(persona).answer_callback(callback_id, toast).await {
                warn!(callback_id, error = %e, "callback answer failed");
            }
        } else if !admitted {
            self.reply(persona, &msg.chat_id, RATE_LIMITED_TEXT).await?;
        }
        Ok(admitted)
    }

    pub fn transport(&self, persona: Persona) -> &Arc<dyn ChatTransport> {
        self.transports.for_persona(persona)
    }

    /// Sends plain HTML text through the persona's transport.
    pub async fn reply(&self, persona: Persona, chat_id: &str, text: &str) -> Result<(), CrambotError> {
        self.transport(persona)
            .send_message(chat_id, text, &SendOptions::default())
            .await
            .map(|_| ())
    }

    /// Replaces the text of an earlier message and drops its keyboard.
    pub async fn edit(
        &self,
        persona: Persona,
        chat_id: &str,
        message_id: Option<&str>,
        text: &str,
    ) -> Result<(), CrambotError> {
        match message_id {
            Some(id) => {
                self.transport(persona)
                    .edit_message_text(chat_id, id, text, &SendOptions::default())
                    .await
            }
            None => self.reply(persona, chat_id, text).await,
        }
    }

    pub fn count_usage(&self, tenant_id: &str, kind: UsageKind) {
        record_usage(&self.tasks, &self.store, tenant_id, kind);
    }
}
