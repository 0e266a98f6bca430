// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation flows of the Crambot gateway.
//!
//! [`Bots`] is the single entry point per inbound event. It routes a
//! [`UnifiedMessage`] to the flow of its persona:
//! - [`AdminBot`] for staff: commands, AI-classified queries and confirmed writes
//! - [`ParentBot`] for guardians: read-only queries and bridged leave requests

pub mod admin;
pub mod commands;
pub mod group;
pub mod parent;
pub mod parent_views;
pub mod services;
pub mod shutdown;

use crambot_core::types::{Persona, UnifiedMessage};

pub use admin::AdminBot;
pub use parent::ParentBot;
pub use services::BotServices;

pub const RATE_LIMITED_TEXT: &str = "⚠️ 操作太頻繁，請稍後再試";
pub const ERROR_TEXT: &str = "⚠️ 系統發生錯誤，請稍後再試";

/// Both personas over one set of shared services.
#[derive(Clone)]
pub struct Bots {
    admin: AdminBot,
    parent: ParentBot,
}

impl Bots {
    pub fn new(services: BotServices) -> Self {
        Self {
            admin: AdminBot::new(services.clone()),
            parent: ParentBot::new(services),
        }
    }

    pub async fn handle(&self, msg: &UnifiedMessage) {
        match msg.persona {
            Persona::Admin => self.admin.handle(msg).await,
            Persona::Parent => self.parent.handle(msg).await,
        }
    }
}
