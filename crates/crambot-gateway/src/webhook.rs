// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram webhook endpoints.
//!
//! Telegram redelivers anything that is not answered with a 2xx, so every
//! delivery that passes the secret check is acknowledged with
//! `{"ok":true}`, even when its body cannot be parsed. The update itself is
//! handled on the background task tracker.

use std::convert::Infallible;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use crambot_core::types::Persona;
use crambot_telegram::{TelegramUpdate, parse_update};
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::webhook_secret_matches;
use crate::server::GatewayState;

pub async fn admin_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receive(&state, Persona::Admin, &headers, &body)
}

pub async fn parent_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receive(&state, Persona::Parent, &headers, &body)
}

fn receive(state: &GatewayState, persona: Persona, headers: &HeaderMap, body: &[u8]) -> Response {
    if !webhook_secret_matches(state.webhook_secret.as_deref(), headers) {
        warn!(%persona, "webhook call with a wrong secret token");
        count(persona, "rejected");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "ok": false }))).into_response();
    }

    let update: TelegramUpdate = match serde_json::from_slice(body) {
        Ok(update) => update,
        Err(e) => {
            warn!(%persona, error = %e, "malformed webhook body");
            count(persona, "malformed");
            return ok();
        }
    };
    let Some(msg) = parse_update(&update, persona) else {
        debug!(%persona, update_id = update.update_id, "update carries nothing to handle");
        count(persona, "ignored");
        return ok();
    };

    count(persona, "accepted");
    let bots = state.bots.clone();
    let label = match persona {
        Persona::Admin => "admin_update",
        Persona::Parent => "parent_update",
    };
    state.tasks.spawn_detached(label, async move {
        bots.handle(&msg).await;
        Ok::<(), Infallible>(())
    });
    ok()
}

fn ok() -> Response {
    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

fn count(persona: Persona, outcome: &'static str) {
    metrics::counter!(
        "crambot_webhook_updates_total",
        "persona" => persona.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
