// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The cross-bot bridge.
//!
//! A requester persona files a request, a responder of the other persona
//! is resolved by tenant and notified with approve/reject buttons, the
//! decision is written exactly once and only then is the requester told.

use std::sync::Arc;

use chrono::Utc;
use crambot_config::model::BridgeConfig;
use crambot_core::types::{
    CrossBotRequest, InlineButton, NewCrossBotRequest, Persona, RequestStatus, SendOptions,
};
use crambot_core::{ChatTransport, CrambotError, StorageAdapter};
use tracing::{debug, info, warn};

/// Newest pending requests shown per tenant.
pub const PENDING_LIST_LIMIT: u32 = 20;

/// One outbound transport per persona.
#[derive(Clone)]
pub struct Transports {
    pub admin: Arc<dyn ChatTransport>,
    pub parent: Arc<dyn ChatTransport>,
}

impl Transports {
    pub fn for_persona(&self, persona: Persona) -> &Arc<dyn ChatTransport> {
        match persona {
            Persona::Admin => &self.admin,
            Persona::Parent => &self.parent,
        }
    }
}

#[derive(Clone)]
pub struct CrossBotBridge {
    store: Arc<dyn StorageAdapter>,
    transports: Transports,
    ttl: chrono::Duration,
}

impl CrossBotBridge {
    pub fn new(config: &BridgeConfig, store: Arc<dyn StorageAdapter>, transports: Transports) -> Self {
        Self {
            store,
            transports,
            ttl: chrono::Duration::from_std(std::time::Duration::from_secs(
                config.request_ttl_hours.saturating_mul(3600),
            ))
            .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Files a pending request and returns its id.
    pub async fn create_request(&self, new: NewCrossBotRequest) -> Result<String, CrambotError> {
        let now = Utc::now();
        let request = CrossBotRequest {
            id: uuid::Uuid::new_v4().to_string(),
            kind: new.kind,
            from: new.from,
            to: new.to,
            tenant_id: new.tenant_id,
            student_id: new.student_id,
            student_name: new.student_name,
            requester_user_id: new.requester_user_id,
            requester_chat_id: new.requester_chat_id,
            responder_chat_id: None,
            data: new.data,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: now + self.ttl,
        };
        self.store.create_cross_bot_request(&request).await?;
        metrics::counter!("crambot_crossbot_requests_total", "event" => "created").increment(1);
        info!(
            request_id = %request.id,
            tenant_id = %request.tenant_id,
            kind = %request.kind,
            "cross-bot request created"
        );
        Ok(request.id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<CrossBotRequest>, CrambotError> {
        self.store.get_cross_bot_request(id).await
    }

    /// Writes the decision once. Returns `None` for unknown, expired or already decided requests.
    pub async fn decide(
        &self,
        id: &str,
        approved: bool,
    ) -> Result<Option<CrossBotRequest>, CrambotError> {
        let Some(mut request) = self.store.get_cross_bot_request(id).await? else {
            return Ok(None);
        };
        let now = Utc::now();
        if request.status != RequestStatus::Pending {
            debug!(request_id = %id, status = %request.status, "request already decided");
            return Ok(None);
        }
        if now > request.expires_at {
            debug!(request_id = %id, "request expired before decision");
            return Ok(None);
        }

        let to = if approved {
            RequestStatus::Approved
        } else {
            RequestStatus::Rejected
        };
        if !self.store.decide_cross_bot_request(id, to).await? {
            return Ok(None);
        }
        request.status = to;
        request.updated_at = now;
        metrics::counter!("crambot_crossbot_requests_total", "event" => to.to_string()).increment(1);
        info!(request_id = %id, status = %to, "cross-bot request decided");
        Ok(Some(request))
    }

    /// Notifies a responder of the target persona and records its chat.
    ///
    /// Candidates are the tenant's admins, most recently active first; the
    /// first successful delivery wins. Failures are logged and never fatal.
    pub async fn notify_responder(&self, request: &CrossBotRequest) -> Option<String> {
        let candidates = match self.store.admin_chat_ids_for_tenant(&request.tenant_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "responder lookup failed");
                return None;
            }
        };
        if candidates.is_empty() {
            warn!(
                request_id = %request.id,
                tenant_id = %request.tenant_id,
                "no responder bound to tenant"
            );
            return None;
        }

        let text = responder_notice(request);
        let options = SendOptions::with_keyboard(decision_keyboard(&request.id));
        let transport = self.transports.for_persona(request.to);
        for chat_id in candidates {
            match transport.send_message(&chat_id, &text, &options).await {
                Ok(_) => {
                    if let Err(e) = self.store.set_responder_chat_id(&request.id, &chat_id).await {
                        warn!(request_id = %request.id, error = %e, "failed to record responder chat");
                    }
                    return Some(chat_id);
                }
                Err(e) => {
                    warn!(request_id = %request.id, chat_id = %chat_id, error = %e, "responder notice failed");
                }
            }
        }
        None
    }

    /// Tells the requester the outcome of a decided request.
    pub async fn notify_requester(&self, request: &CrossBotRequest) -> Result<(), CrambotError> {
        let Some(text) = requester_notice(request) else {
            return Ok(());
        };
        self.transports
            .for_persona(request.from)
            .send_message(&request.requester_chat_id, &text, &SendOptions::default())
            .await?;
        Ok(())
    }

    /// Pending, unexpired requests of a tenant, newest first.
    pub async fn list_pending(&self, tenant_id: &str) -> Result<Vec<CrossBotRequest>, CrambotError> {
        self.store
            .list_pending_cross_bot_requests(tenant_id, Utc::now(), PENDING_LIST_LIMIT)
            .await
    }
}

/// `crossbot:approve:{id}` / `crossbot:reject:{id}`.
pub fn decision_keyboard(request_id: &str) -> Vec<Vec<InlineButton>> {
    vec![vec![
        InlineButton::callback("✅ 確認", format!("crossbot:approve:{request_id}")),
        InlineButton::callback("❌ 拒絕", format!("crossbot:reject:{request_id}")),
    ]]
}

/// Splits decision callback data into `(approved, request_id)`.
pub fn parse_decision(data: &str) -> Option<(bool, &str)> {
    let rest = data.strip_prefix("crossbot:")?;
    let (verb, id) = rest.split_once(':')?;
    if id.is_empty() {
        return None;
    }
    match verb {
        "approve" => Some((true, id)),
        "reject" => Some((false, id)),
        _ => None,
    }
}

pub fn responder_notice(request: &CrossBotRequest) -> String {
    format!(
        "📩 <b>家長代請假通知</b>\n\n👤 學生：{}\n📅 日期：{}\n📝 原因：{}\n\n請確認是否核准：",
        request.student_name,
        request.data_str("date").unwrap_or("未指定"),
        request.data_str("reason").unwrap_or("未說明"),
    )
}

/// Outcome text for the requester. `None` while the request is still pending.
pub fn requester_notice(request: &CrossBotRequest) -> Option<String> {
    let date = request.data_str("date").unwrap_or_default();
    match request.status {
        RequestStatus::Pending => None,
        RequestStatus::Approved => Some(format!(
            "✅ 班主任已確認 <b>{}</b> {date} 的請假申請。\n\n祝早日康復 🙏",
            request.student_name
        )),
        RequestStatus::Rejected => Some(format!(
            "❌ 班主任未核准 <b>{}</b> {date} 的請假申請。\n\n如有疑問，請直接聯繫補習班 📞",
            request.student_name
        )),
    }
}
