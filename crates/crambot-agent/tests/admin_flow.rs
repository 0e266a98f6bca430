// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end flows of the staff-facing bot against mock collaborators.

mod common;

use chrono::{Duration, Utc};
use crambot_actions::manager::{CANCELLED_TEXT, NOT_OWNER_TEXT, PROCESSED_TEXT};
use crambot_agent::admin::{UNBOUND_TEXT, UNKNOWN_TEXT};
use crambot_agent::commands::{
    BIND_FORMAT_TEXT, BIND_USED_TEXT, HELP_TEXT, PENDING_NONE_TEXT, SWITCH_INVALID_TEXT,
};
use crambot_agent::RATE_LIMITED_TEXT;
use crambot_config::model::CrambotConfig;
use crambot_core::{DistributedCache, StorageAdapter};
use crambot_dispatch::calendar;
use crambot_core::types::{
    AuditStatus, BindCode, BindKind, IntentResult, Params, Persona, TenantBinding,
};
use crambot_test_utils::TestHarness;
use serde_json::json;

use common::{bots, group_text, press, text};

async fn leave_prompt(h: &TestHarness) -> crambot_test_utils::SentMessage {
    h.classifier
        .push_intent(
            "inclass.leave",
            json!({"student_name": "陳小明", "date": "2026-10-19", "reason": "感冒"}),
        )
        .await;
    bots(h)
        .handle(&text(Persona::Admin, "u1", "陳小明今天請假"))
        .await;
    h.admin_transport.last_sent().await.expect("prompt sent")
}

#[tokio::test]
async fn leave_is_confirmed_executed_and_audited() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    h.api
        .respond_ok("/attendance/leave", "✅ 陳小明 10/19 請假已登記", json!({}))
        .await;
    let bots = bots(&h);

    let prompt = leave_prompt(&h).await;
    assert!(prompt.text.contains("🏫 大安補習班"));
    assert!(prompt.text.contains("登記請假"));
    assert!(prompt.text.contains("學生：陳小明"));
    let buttons = prompt.button_data();
    assert_eq!(buttons.len(), 2);
    assert!(buttons[0].starts_with("confirm:"));
    assert!(h.api.calls().await.is_empty(), "nothing runs before confirmation");

    bots.handle(&press(Persona::Admin, "u1", &buttons[0], &prompt.message_id))
        .await;

    let calls = h.api.calls_to("/attendance/leave").await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body.get("tenant_id"), Some(&json!("t1")));
    assert_eq!(calls[0].body.get("student_name"), Some(&json!("陳小明")));

    let edit = h.admin_transport.last_edit().await.expect("prompt edited");
    assert_eq!(edit.message_id, prompt.message_id);
    assert_eq!(edit.text, "✅ 陳小明 10/19 請假已登記");
    assert!(edit.options.keyboard.is_none());

    h.tasks.settle().await;
    let audit = h.storage.list_audit("t1", 10).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].status, AuditStatus::Confirmed);
    assert_eq!(audit[0].intent, "inclass.leave");
    assert_eq!(h.admin_transport.answers().await.len(), 1);
}

#[tokio::test]
async fn second_confirm_reports_already_processed() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    let bots = bots(&h);

    let prompt = leave_prompt(&h).await;
    let confirm = &prompt.button_data()[0];
    bots.handle(&press(Persona::Admin, "u1", confirm, &prompt.message_id))
        .await;
    bots.handle(&press(Persona::Admin, "u1", confirm, &prompt.message_id))
        .await;

    assert_eq!(h.api.calls_to("/attendance/leave").await.len(), 1);
    let edit = h.admin_transport.last_edit().await.unwrap();
    assert_eq!(edit.text, PROCESSED_TEXT);
}

#[tokio::test]
async fn cancel_never_calls_downstream() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    let bots = bots(&h);

    let prompt = leave_prompt(&h).await;
    let cancel = &prompt.button_data()[1];
    bots.handle(&press(Persona::Admin, "u1", cancel, &prompt.message_id))
        .await;

    assert!(h.api.calls().await.is_empty());
    assert_eq!(h.admin_transport.last_edit().await.unwrap().text, CANCELLED_TEXT);
    h.tasks.settle().await;
    let audit = h.storage.list_audit("t1", 10).await.unwrap();
    assert_eq!(audit[0].status, AuditStatus::Cancelled);
}

#[tokio::test]
async fn only_the_initiator_can_confirm() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    h.bind_admin("u2", "t1", "大安補習班").await;
    let bots = bots(&h);

    let prompt = leave_prompt(&h).await;
    bots.handle(&press(Persona::Admin, "u2", &prompt.button_data()[0], &prompt.message_id))
        .await;

    assert!(h.api.calls().await.is_empty());
    assert_eq!(h.admin_transport.last_edit().await.unwrap().text, NOT_OWNER_TEXT);
}

#[tokio::test]
async fn unbound_user_gets_bind_instructions() {
    let h = TestHarness::new().await;
    bots(&h)
        .handle(&text(Persona::Admin, "stranger", "陳小明今天請假"))
        .await;

    assert_eq!(h.admin_transport.last_sent().await.unwrap().text, UNBOUND_TEXT);
    assert!(h.classifier.seen().await.is_empty());
}

#[tokio::test]
async fn query_intent_executes_immediately() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    h.classifier
        .push_intent("stock.query", json!({"item_name": "紙杯"}))
        .await;
    h.api
        .respond_ok("/stock/check", "📦 紙杯 庫存 120", json!({"stock": 120}))
        .await;

    bots(&h)
        .handle(&text(Persona::Admin, "u1", "紙杯還有多少"))
        .await;

    assert_eq!(h.api.calls_to("/stock/check").await.len(), 1);
    let reply = h.admin_transport.last_sent().await.unwrap();
    assert_eq!(reply.text, "📦 紙杯 庫存 120");
    assert!(reply.options.keyboard.is_none());

    h.tasks.settle().await;
    let month = calendar::today().format("%Y-%m").to_string();
    let usage = h.storage.usage_summary("t1", &month).await.unwrap();
    assert_eq!(usage.ai_calls, 1);
    assert_eq!(usage.api_calls, 1);
}

#[tokio::test]
async fn clarification_question_is_relayed() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    h.classifier
        .push(IntentResult {
            intent: "inclass.leave".into(),
            confidence: 0.4,
            params: Params::new(),
            need_clarification: true,
            clarification_question: Some("請問是哪一位陳小明？".into()),
            reply: None,
        })
        .await;

    bots(&h)
        .handle(&text(Persona::Admin, "u1", "陳小明請假"))
        .await;

    assert_eq!(
        h.admin_transport.last_sent().await.unwrap().text,
        "🤔 請問是哪一位陳小明？"
    );
    assert!(h.api.calls().await.is_empty());
}

#[tokio::test]
async fn provider_failure_degrades_to_clarification() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    h.classifier.push_error("quota exceeded").await;

    bots(&h).handle(&text(Persona::Admin, "u1", "嗨")).await;

    let reply = h.admin_transport.last_sent().await.unwrap();
    assert!(reply.text.starts_with("🤔 "));
    assert!(h.storage.latest_pending_action_for_user("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_without_question_suggests_help() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    h.classifier.push_intent("unknown", json!({})).await;

    bots(&h).handle(&text(Persona::Admin, "u1", "今天天氣如何")).await;

    assert_eq!(h.admin_transport.last_sent().await.unwrap().text, UNKNOWN_TEXT);
}

fn admin_code(code: &str, tenant_id: &str, tenant_name: &str) -> BindCode {
    let now = Utc::now();
    BindCode {
        code: code.into(),
        kind: BindKind::Admin,
        tenant_id: tenant_id.into(),
        tenant_name: tenant_name.into(),
        student_id: None,
        student_name: None,
        used_by: None,
        created_at: now,
        expires_at: now + Duration::minutes(10),
    }
}

#[tokio::test]
async fn bind_code_is_single_use() {
    let h = TestHarness::new().await;
    h.storage
        .put_bind_code(&admin_code("123456", "t1", "大安補習班"))
        .await
        .unwrap();
    let bots = bots(&h);

    bots.handle(&text(Persona::Admin, "u1", "/bind 123456")).await;
    let reply = h.admin_transport.last_sent().await.unwrap();
    assert!(reply.text.starts_with("✅ 綁定成功！\n🏫 大安補習班"));
    let binding = h.storage.get_user_binding("u1").await.unwrap().unwrap();
    assert_eq!(binding.active_tenant_id, "t1");

    bots.handle(&text(Persona::Admin, "u2", "/bind 123456")).await;
    assert_eq!(h.admin_transport.last_sent().await.unwrap().text, BIND_USED_TEXT);
    assert!(h.storage.get_user_binding("u2").await.unwrap().is_none());

    bots.handle(&text(Persona::Admin, "u2", "/bind 12")).await;
    assert_eq!(h.admin_transport.last_sent().await.unwrap().text, BIND_FORMAT_TEXT);
}

#[tokio::test]
async fn switch_lists_and_changes_active_tenant() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    h.storage
        .add_user_binding(
            "u1",
            &TenantBinding {
                tenant_id: "t2".into(),
                tenant_name: "信義補習班".into(),
                role: "admin".into(),
            },
        )
        .await
        .unwrap();
    let bots = bots(&h);

    bots.handle(&text(Persona::Admin, "u1", "/switch")).await;
    let list = h.admin_transport.last_sent().await.unwrap().text;
    assert!(list.starts_with("🏫 你管理的補習班："));
    assert!(list.contains("信義補習班 ← 目前"));
    assert!(!list.contains("大安補習班 ← 目前"));

    bots.handle(&text(Persona::Admin, "u1", "/switch 9")).await;
    assert_eq!(h.admin_transport.last_sent().await.unwrap().text, SWITCH_INVALID_TEXT);

    let position = list
        .lines()
        .position(|l| l.contains("大安補習班"))
        .expect("listed");
    bots.handle(&text(Persona::Admin, "u1", &format!("/switch {position}")))
        .await;
    let reply = h.admin_transport.last_sent().await.unwrap().text;
    assert!(reply.starts_with("✅ 已切換到：大安補習班"));
    let binding = h.storage.get_user_binding("u1").await.unwrap().unwrap();
    assert_eq!(binding.active_tenant_id, "t1");
}

#[tokio::test]
async fn sync_feeds_the_classifier_context() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    h.api
        .respond_ok(
            "/data/students",
            "",
            json!([
                {"id": "s1", "name": "陳小明", "class_name": "高二A"},
                {"id": "s2", "name": "林小華", "class_name": "高二A"}
            ]),
        )
        .await;
    h.api
        .respond_ok("/data/classes", "", json!(["高二A"]))
        .await;
    h.api
        .respond_ok("/data/items", "", json!([{"id": "i1", "name": "紙杯", "stock": 120}]))
        .await;
    h.api
        .respond_ok("/data/warehouses", "", json!({"unexpected": true}))
        .await;
    let bots = bots(&h);

    bots.handle(&text(Persona::Admin, "u1", "/sync")).await;
    let sent = h.admin_transport.sent_to("u1").await;
    assert_eq!(sent[0].text, "🔄 正在同步資料...");
    assert_eq!(
        sent[1].text,
        "✅ 同步完成！\n📚 學生 2 人\n🏫 班級 1 個\n📦 品項 1 個\n🏪 倉庫 0 個"
    );

    bots.handle(&text(Persona::Admin, "u1", "陳小明今天請假")).await;
    let seen = h.classifier.seen().await;
    let (_, context) = seen.last().expect("classified");
    let snapshot = context.snapshot.as_ref().expect("snapshot in context");
    assert_eq!(snapshot.students.len(), 2);
    assert_eq!(context.tenant_name, "大安補習班");
}

#[tokio::test]
async fn rate_limited_user_is_told_to_slow_down() {
    let mut config = CrambotConfig::default();
    config.rate_limit.user_capacity = 2;
    config.rate_limit.window_secs = 60;
    let h = TestHarness::with_config(config).await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    let bots = bots(&h);

    for _ in 0..3 {
        bots.handle(&text(Persona::Admin, "u1", "/help")).await;
    }

    let sent = h.admin_transport.sent_to("u1").await;
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2].text, RATE_LIMITED_TEXT);
    assert_ne!(sent[1].text, RATE_LIMITED_TEXT);
}

#[tokio::test]
async fn rate_limited_press_is_still_answered() {
    let mut config = CrambotConfig::default();
    config.rate_limit.user_capacity = 1;
    let h = TestHarness::with_config(config).await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    let bots = bots(&h);

    bots.handle(&text(Persona::Admin, "u1", "/help")).await;
    bots.handle(&press(Persona::Admin, "u1", "confirm:a1", "7")).await;

    assert_eq!(
        h.admin_transport.answers().await,
        vec![("cb-confirm:a1".to_string(), Some(RATE_LIMITED_TEXT.to_string()))]
    );
    assert!(h.admin_transport.edits().await.is_empty());
    assert_eq!(h.admin_transport.sent_to("u1").await.len(), 1);
}

#[tokio::test]
async fn ordinary_replies_wait_for_the_global_ceiling() {
    let h = TestHarness::new().await;
    let second = Utc::now().timestamp();
    let ceiling = h.config.rate_limit.global_per_second.to_string();
    h.kv.set(&crambot_ratelimit::window::global_key(second), &ceiling, None)
        .await
        .unwrap();

    bots(&h).handle(&text(Persona::Admin, "u1", "/help")).await;

    assert!(Utc::now().timestamp() > second);
    assert_eq!(h.admin_transport.last_sent().await.unwrap().text, HELP_TEXT);
}

#[tokio::test]
async fn group_chatter_is_ignored_but_commands_are_answered() {
    let mut config = CrambotConfig::default();
    config.telegram.admin_bot_username = Some("CramAdminBot".into());
    let h = TestHarness::with_config(config).await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    let bots = bots(&h);

    bots.handle(&group_text(Persona::Admin, "u1", "今天誰沒到")).await;
    assert!(h.admin_transport.sent().await.is_empty());
    assert!(h.classifier.seen().await.is_empty());

    bots.handle(&group_text(Persona::Admin, "u1", "/help@CramAdminBot")).await;
    assert_eq!(h.admin_transport.last_sent().await.unwrap().chat_id, "-100200");

    h.classifier.push_intent("inclass.query_list", json!({})).await;
    bots.handle(&group_text(Persona::Admin, "u1", "@cramadminbot 今天誰沒到"))
        .await;
    let seen = h.classifier.seen().await;
    assert_eq!(seen.last().map(|(t, _)| t.as_str()), Some("今天誰沒到"));
}

#[tokio::test]
async fn pending_reports_the_users_open_confirmation() {
    let h = TestHarness::new().await;
    h.bind_admin("u1", "t1", "大安補習班").await;
    let bots = bots(&h);

    bots.handle(&text(Persona::Admin, "u1", "/pending")).await;
    assert_eq!(h.admin_transport.last_sent().await.unwrap().text, PENDING_NONE_TEXT);

    leave_prompt(&h).await;
    bots.handle(&text(Persona::Admin, "u1", "/pending")).await;
    let reply = h.admin_transport.last_sent().await.unwrap();
    assert!(reply.text.starts_with("⏳ 你有一筆操作等待確認：登記請假"));
}
