// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text rendering of parent-facing query results.

use chrono::NaiveDate;
use crambot_core::types::{ApiResponse, ParentChild};
use crambot_dispatch::render::format_amount;
use serde_json::Value;

const DAY_NAMES: [&str; 7] = ["日", "一", "二", "三", "四", "五", "六"];
const RECENT_ROWS: usize = 5;

pub const HELP_TEXT: &str = "👋 您好！我是順風耳，您的補習班小幫手 😊\n\n\
您可以直接用自然的方式問我：\n\n\
📋 「孩子今天有到嗎？」\n\
💰 「學費繳了嗎？」\n\
📅 「什麼時候上課？」\n\
📝 「幫孩子明天請假」\n\n\
有任何問題都可以直接問我～";

pub const WELCOME_TEXT: &str = "👋 歡迎使用<b>順風耳家長 Bot</b>！\n\n\
請先輸入補習班提供的邀請碼進行綁定：\n\
<code>/bind 123456</code>\n\n\
綁定後即可查詢孩子的出缺勤、繳費、課表等資訊。";

pub const UNBOUND_TEXT: &str =
    "👋 您尚未綁定，請先輸入補習班提供的邀請碼：\n<code>/bind 123456</code>";

pub fn unknown_text(children: &[ParentChild]) -> String {
    let name = match children {
        [only] => only.student_name.as_str(),
        _ => "孩子",
    };
    format!(
        "不好意思，我沒有完全理解您的意思 😅\n\n您可以直接跟我說：\n\
📋 「{name}今天有到嗎」\n💰 「學費繳了沒」\n📅 「什麼時候上課」\n📝 「幫{name}請假」\n\n\
有什麼問題都可以問我～"
    )
}

/// Asks which child a query is about.
pub fn which_child(children: &[ParentChild]) -> String {
    format!(
        "👋 您綁定了多位孩子，請問要查詢哪位？\n\n{}\n\n請輸入孩子的名字再試一次",
        numbered(children)
    )
}

/// Reply to a personal question asked in a group.
pub fn private_redirect(bot_username: Option<&str>) -> String {
    let mention = bot_username
        .map(|u| format!(" 👉 @{}", u.trim_start_matches('@')))
        .unwrap_or_default();
    format!(
        "😊 這類查詢涉及個人資料，為了保護隱私，請私訊我查詢唷！{mention}\n\n\
私聊中我可以幫您查出缺勤、繳費狀況、課表等個人資訊～"
    )
}

pub fn numbered(children: &[ParentChild]) -> String {
    children
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.student_name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn attendance(child: &str, summary: &ApiResponse, records: &ApiResponse) -> Option<String> {
    if !summary.is_success() && !records.is_success() {
        return None;
    }
    let mut text = format!("📋 {child}的出勤紀錄\n\n");

    let summary = summary.data().and_then(Value::as_object);
    if let Some(d) = summary {
        text.push_str(&format!("📅 {} 月統計：\n", str_field(d.get("month")).unwrap_or_default()));
        text.push_str(&format!("✅ 到課 {} 天\n", num_field(d.get("present_days"))));
        text.push_str(&format!("未到班 {} 天\n", num_field(d.get("absent_days"))));
        text.push_str(&format!("⏰ 遲到 {} 天\n", num_field(d.get("late_days"))));
        text.push_str(&format!("🏥 請假 {} 天\n", num_field(d.get("leave_days"))));
        text.push_str(&format!("📊 出勤率 {}%\n", num_field(d.get("attendance_rate"))));
    }

    let rows = records
        .data()
        .and_then(|d| d.get("records"))
        .and_then(Value::as_array);
    if let Some(rows) = rows.filter(|r| !r.is_empty()) {
        text.push_str("\n📜 最近紀錄：\n");
        for r in rows.iter().take(RECENT_ROWS) {
            let emoji = match r.get("status").and_then(Value::as_str) {
                Some("present") => "✅",
                Some("absent") => "❌",
                Some("late") => "⏰",
                _ => "📝",
            };
            let note = str_field(r.get("note"))
                .map(|n| format!("（{n}）"))
                .unwrap_or_default();
            text.push_str(&format!("{emoji} {} {note}\n", local_date(r.get("date"))));
        }
    }

    let rate = summary
        .and_then(|d| d.get("attendance_rate"))
        .and_then(Value::as_f64);
    match rate {
        Some(r) if r >= 90.0 => text.push_str("\n出勤狀況很穩定！"),
        Some(r) if r >= 70.0 => text.push_str("\n如果有什麼狀況，可以跟老師聊聊"),
        _ => {}
    }
    Some(text)
}

pub fn payments(child: &str, status: &ApiResponse, history: &ApiResponse) -> Option<String> {
    if !status.is_success() && !history.is_success() {
        return None;
    }
    let mut text = format!("💰 {child}的繳費狀態\n\n");

    if let Some(d) = status.data().and_then(Value::as_object) {
        let next_due = str_field(d.get("next_due"));
        match d.get("current_status").and_then(Value::as_str) {
            Some("paid") => text.push_str("✅ 目前繳費狀態：已繳清\n"),
            Some("pending") => {
                text.push_str("⏳ 有待繳款項\n");
                if let Some(due) = &next_due {
                    text.push_str(&format!("📅 下次繳費期限：{due}\n"));
                }
            }
            Some("overdue") => {
                text.push_str(&format!(
                    "⚠️ 目前有一筆待繳款項 NT${}，方便的話請盡快完成繳費喔 💰\n",
                    format_amount(&num_field(d.get("overdue_amount")))
                ));
                if let Some(due) = &next_due {
                    text.push_str(&format!("📅 繳費期限：{due}\n"));
                }
            }
            _ => {}
        }
    }

    let rows = history
        .data()
        .and_then(|d| d.get("payments"))
        .and_then(Value::as_array);
    if let Some(rows) = rows.filter(|r| !r.is_empty()) {
        text.push_str("\n📜 繳費紀錄：\n");
        for p in rows.iter().take(RECENT_ROWS) {
            let emoji = match p.get("status").and_then(Value::as_str) {
                Some("paid") => "✅",
                Some("overdue") => "⚠️",
                _ => "⏳",
            };
            text.push_str(&format!(
                "{emoji} {} NT${}\n",
                local_date(p.get("date")),
                format_amount(&num_field(p.get("amount")))
            ));
        }
    }

    text.push_str("\n如需繳費方式說明，跟我說就好");
    Some(text)
}

pub fn schedule(child: &str, response: &ApiResponse) -> Option<String> {
    if !response.is_success() {
        return None;
    }
    let rows = response
        .data()
        .and_then(|d| d.get("schedules"))
        .and_then(Value::as_array)
        .filter(|r| !r.is_empty());
    let Some(rows) = rows else {
        return Some(format!(
            "📅 {child}的課表\n\n目前沒有排課資料，有疑問可以聯繫補習班"
        ));
    };

    let mut by_day: Vec<(i64, Vec<&Value>)> = Vec::new();
    for row in rows {
        let day = row.get("day_of_week").and_then(Value::as_i64).unwrap_or(-1);
        match by_day.iter_mut().find(|(d, _)| *d == day) {
            Some((_, items)) => items.push(row),
            None => by_day.push((day, vec![row])),
        }
    }
    by_day.sort_by_key(|(day, _)| *day);

    let mut text = format!("📅 {child}的課表\n\n");
    for (day, items) in by_day {
        let day_name = usize::try_from(day)
            .ok()
            .and_then(|d| DAY_NAMES.get(d))
            .map(|d| d.to_string())
            .unwrap_or_else(|| day.to_string());
        text.push_str(&format!("📌 週{day_name}：\n"));
        for item in items {
            let course = str_field(item.get("course_name")).unwrap_or_else(|| "未知課程".into());
            let start = str_field(item.get("start_time")).unwrap_or_default();
            let end = str_field(item.get("end_time")).unwrap_or_default();
            let room = str_field(item.get("room"))
                .map(|r| format!("（{r}）"))
                .unwrap_or_default();
            text.push_str(&format!("  {start}~{end} {course}{room}\n"));
        }
    }
    Some(text)
}

fn str_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn num_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => "0".to_string(),
    }
}

/// `2026-01-05...` as `2026/1/5`.
fn local_date(value: Option<&Value>) -> String {
    let Some(raw) = value.and_then(Value::as_str) else {
        return "未知".to_string();
    };
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .map(|d| d.format("%Y/%-m/%-d").to_string())
        .unwrap_or_else(|| raw.to_string())
}
