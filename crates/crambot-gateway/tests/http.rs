// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router behavior driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use crambot_agent::admin::UNBOUND_TEXT;
use crambot_agent::{BotServices, Bots};
use crambot_bridge::Transports;
use crambot_core::StorageAdapter;
use crambot_core::types::{BindKind, JobStatus};
use crambot_gateway::{AuthConfig, GatewayState, HealthState, router};
use crambot_ratelimit::RateLimiter;
use crambot_test_utils::TestHarness;
use serde_json::{Value, json};
use tower::ServiceExt;

const TOKEN: &str = "op-token";

struct Gateway {
    app: Router,
    h: TestHarness,
    _worker: crambot_broadcast::BroadcastWorker,
}

async fn gateway(
    admin_token: Option<&str>,
    webhook_secret: Option<&str>,
    metrics: bool,
) -> Gateway {
    let h = TestHarness::new().await;
    let bots = Bots::new(BotServices::new(
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
    ));
    let limiter = Arc::new(RateLimiter::new(
        &h.config.rate_limit,
        h.kv(),
        h.store(),
        h.tasks.clone(),
    ));
    // The worker is never started, so queued jobs stay pending.
    let (queue, worker) =
        crambot_broadcast::channel(&h.config.broadcast, h.store(), h.admin(), limiter);
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> = if metrics {
        Some(Arc::new(|| "crambot_inbound_messages_total 3\n".to_string()))
    } else {
        None
    };

    let state = GatewayState {
        bots,
        tasks: h.tasks.clone(),
        store: h.store(),
        broadcast: queue,
        webhook_secret: webhook_secret.map(str::to_string),
        auth: AuthConfig {
            bearer_token: admin_token.map(str::to_string),
        },
        health: HealthState {
            start_time: Instant::now(),
            prometheus_render,
        },
    };
    Gateway {
        app: router(state),
        h,
        _worker: worker,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
}

fn operator(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {TOKEN}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn text_update(user_id: i64, text: &str) -> String {
    json!({
        "update_id": 1,
        "message": {
            "message_id": 5,
            "from": {"id": user_id, "is_bot": false, "first_name": "王"},
            "chat": {"id": user_id, "type": "private"},
            "date": 1_760_000_000,
            "text": text
        }
    })
    .to_string()
}

#[tokio::test]
async fn health_is_public() {
    let g = gateway(None, None, false).await;
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&g.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn metrics_render_only_when_installed() {
    let without = gateway(None, None, false).await;
    let request = Request::get("/metrics").body(Body::empty()).unwrap();
    assert_eq!(send(&without.app, request).await.0, StatusCode::NOT_FOUND);

    let with = gateway(None, None, true).await;
    let response = with
        .app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("crambot_inbound_messages_total 3"));
}

#[tokio::test]
async fn malformed_webhook_body_is_acknowledged() {
    let g = gateway(None, None, false).await;
    let request = post("/webhook/telegram")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&g.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));
    assert!(g.h.tasks.is_empty());
}

#[tokio::test]
async fn webhook_secret_is_enforced() {
    let g = gateway(None, Some("hook-secret"), false).await;

    let forged = post("/webhook/telegram-parent")
        .header("x-telegram-bot-api-secret-token", "guess")
        .body(Body::from(text_update(42, "嗨")))
        .unwrap();
    assert_eq!(send(&g.app, forged).await.0, StatusCode::UNAUTHORIZED);

    let missing = post("/webhook/telegram-parent")
        .body(Body::from(text_update(42, "嗨")))
        .unwrap();
    assert_eq!(send(&g.app, missing).await.0, StatusCode::UNAUTHORIZED);

    let genuine = post("/webhook/telegram-parent")
        .header("x-telegram-bot-api-secret-token", "hook-secret")
        .body(Body::from(text_update(42, "嗨")))
        .unwrap();
    assert_eq!(send(&g.app, genuine).await.0, StatusCode::OK);
}

#[tokio::test]
async fn admin_update_is_processed_in_background() {
    let g = gateway(None, None, false).await;
    let request = post("/webhook/telegram")
        .body(Body::from(text_update(42, "陳小明今天請假")))
        .unwrap();
    let (status, body) = send(&g.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    g.h.tasks.settle().await;
    let reply = g.h.admin_transport.last_sent().await.expect("reply sent");
    assert_eq!(reply.chat_id, "42");
    assert_eq!(reply.text, UNBOUND_TEXT);
    assert!(g.h.parent_transport.sent().await.is_empty());
}

#[tokio::test]
async fn operator_api_fails_closed_without_token() {
    let g = gateway(None, None, false).await;
    let request = operator("GET", "/api/broadcast", Value::Null);
    assert_eq!(send(&g.app, request).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn operator_api_rejects_wrong_token() {
    let g = gateway(Some("something-else"), None, false).await;
    let request = operator("GET", "/api/broadcast", Value::Null);
    assert_eq!(send(&g.app, request).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn broadcast_is_queued_and_visible() {
    let g = gateway(Some(TOKEN), None, false).await;

    let (status, body) = send(
        &g.app,
        operator(
            "POST",
            "/api/broadcast",
            json!({"chat_ids": ["1", "2", "3"], "message": "颱風停課"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().expect("job id").to_string();
    assert!(job_id.starts_with("broadcast_"));

    let (status, job) = send(
        &g.app,
        operator("GET", &format!("/api/broadcast/{job_id}"), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["progress"]["total"], 3);
    let stored = g.h.storage.get_broadcast_job(&job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Pending);

    let (status, jobs) = send(&g.app, operator("GET", "/api/broadcast?limit=5", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs.as_array().map(Vec::len), Some(1));

    let (status, _) = send(
        &g.app,
        operator("GET", "/api/broadcast/broadcast_0_nothere", Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_broadcast_is_rejected() {
    let g = gateway(Some(TOKEN), None, false).await;
    let (status, body) = send(
        &g.app,
        operator("POST", "/api/broadcast", json!({"chat_ids": [], "message": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("chat_ids"));
}

#[tokio::test]
async fn bind_codes_are_minted_per_kind() {
    let g = gateway(Some(TOKEN), None, false).await;

    let (status, issued) = send(
        &g.app,
        operator(
            "POST",
            "/api/bind-codes",
            json!({"kind": "admin", "tenant_id": "t1", "tenant_name": "大安補習班"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let code = issued["code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
    let stored = g.h.storage.get_bind_code(code).await.unwrap().unwrap();
    assert_eq!(stored.kind, BindKind::Admin);
    assert_eq!(stored.tenant_name, "大安補習班");
    assert!(stored.used_by.is_none());

    let (status, _) = send(
        &g.app,
        operator(
            "POST",
            "/api/bind-codes",
            json!({"kind": "parent", "tenant_id": "t1", "student_name": "陳小明"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, invite) = send(
        &g.app,
        operator(
            "POST",
            "/api/bind-codes",
            json!({"kind": "parent", "tenant_id": "t1", "student_id": "s1", "student_name": "陳小明"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(invite["kind"], "parent");
    let stored = g
        .h
        .storage
        .get_bind_code(invite["code"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.student_id.as_deref(), Some("s1"));
}
