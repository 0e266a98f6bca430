// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply texts built from API responses and intent parameters.

use crambot_core::types::{ApiResponse, InlineButton, Params, param_str};
use serde_json::Value;

use crate::catalog;

pub const SUCCESS_FALLBACK: &str = "操作完成";
pub const FAILURE_FALLBACK: &str = "操作失敗，請稍後再試";

/// Renders a downstream response for the chat.
pub fn format_response(response: &ApiResponse) -> String {
    match response {
        ApiResponse::Success { message, .. } => message
            .clone()
            .unwrap_or_else(|| SUCCESS_FALLBACK.to_string()),
        ApiResponse::Failure {
            message,
            suggestions,
            ..
        } => {
            let mut text = format!("⚠️ {}", message.as_deref().unwrap_or(FAILURE_FALLBACK));
            if !suggestions.is_empty() {
                text.push_str("\n\n是不是這幾個？");
                for (i, s) in suggestions.iter().enumerate() {
                    text.push_str(&format!("\n{}. {}", i + 1, suggestion_name(s)));
                }
            }
            text
        }
    }
}

fn suggestion_name(s: &Params) -> String {
    param_str(s, "name")
        .or_else(|| param_str(s, "student_name"))
        .unwrap_or_else(|| Value::Object(s.clone()).to_string())
}

/// One labelled line per known parameter, in a fixed order.
pub fn format_params(params: &Params) -> String {
    const FIELDS: &[(&str, &str)] = &[
        ("student_name", "學生"),
        ("class_name", "班級"),
        ("date", "日期"),
        ("reason", "原因"),
        ("amount", "金額"),
        ("item_name", "品項"),
        ("quantity", "數量"),
        ("destination", "目的地"),
        ("name", "姓名"),
        ("parent_phone", "家長電話"),
    ];

    FIELDS
        .iter()
        .filter_map(|(key, label)| {
            let value = param_str(params, key)?;
            let value = if *key == "amount" {
                format!("NT$ {}", format_amount(&value))
            } else {
                value
            };
            Some(format!("{label}：{value}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Groups the integer part of an amount by thousands. Non-numeric input is returned as is.
pub fn format_amount(raw: &str) -> String {
    let Ok(n) = raw.parse::<f64>() else {
        return raw.to_string();
    };
    let negative = n < 0.0;
    let abs = n.abs();
    let whole = abs.trunc() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let fraction = abs - abs.trunc();
    if fraction > 0.0 {
        let cents = format!("{fraction:.2}");
        grouped.push_str(cents.trim_start_matches('0').trim_end_matches('0'));
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Text of the confirmation prompt for a write intent.
pub fn confirmation_prompt(tenant_name: &str, intent: &str, params: &Params) -> String {
    let mut text = format!(
        "📋 請確認：\n🏫 {tenant_name}\n操作：{}",
        catalog::label(intent)
    );
    let lines = format_params(params);
    if !lines.is_empty() {
        text.push('\n');
        text.push_str(&lines);
    }
    text
}

pub fn confirmation_keyboard(action_id: &str) -> Vec<Vec<InlineButton>> {
    vec![vec![
        InlineButton::callback("✅ 確認", format!("confirm:{action_id}")),
        InlineButton::callback("❌ 取消", format!("cancel:{action_id}")),
    ]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn success_without_message_uses_fallback() {
        let resp = ApiResponse::Success {
            message: None,
            data: None,
        };
        assert_eq!(format_response(&resp), "操作完成");
    }

    #[test]
    fn failure_lists_suggestions() {
        let resp = ApiResponse::Failure {
            error: "student_not_found".into(),
            message: Some("找不到學生「陳曉明」".into()),
            suggestions: vec![
                params(json!({"name": "陳小明"})),
                params(json!({"student_name": "陳曉民"})),
                params(json!({"id": 7})),
            ],
        };
        assert_eq!(
            format_response(&resp),
            "⚠️ 找不到學生「陳曉明」\n\n是不是這幾個？\n1. 陳小明\n2. 陳曉民\n3. {\"id\":7}"
        );
    }

    #[test]
    fn failure_without_message_uses_fallback() {
        let resp = ApiResponse::Failure {
            error: "api_error".into(),
            message: None,
            suggestions: vec![],
        };
        assert_eq!(format_response(&resp), "⚠️ 操作失敗，請稍後再試");
    }

    #[test]
    fn amounts_are_grouped() {
        assert_eq!(format_amount("5000"), "5,000");
        assert_eq!(format_amount("1234567"), "1,234,567");
        assert_eq!(format_amount("999"), "999");
        assert_eq!(format_amount("1500.5"), "1,500.5");
        assert_eq!(format_amount("兩千"), "兩千");
    }

    #[test]
    fn prompt_lists_params_in_fixed_order() {
        let p = params(json!({
            "reason": "感冒",
            "student_name": "陳小明",
            "date": "2026-10-19",
        }));
        assert_eq!(
            confirmation_prompt("大安補習班", "inclass.leave", &p),
            "📋 請確認：\n🏫 大安補習班\n操作：登記請假\n學生：陳小明\n日期：2026-10-19\n原因：感冒"
        );
    }

    #[test]
    fn prompt_formats_payment_amount() {
        let p = params(json!({"student_name": "王大明", "amount": 12000}));
        let text = confirmation_prompt("大安補習班", "manage.payment", &p);
        assert!(text.contains("操作：登記繳費"));
        assert!(text.ends_with("金額：NT$ 12,000"));
    }

    #[test]
    fn keyboard_carries_action_id() {
        let rows = confirmation_keyboard("abc");
        assert_eq!(rows[0][0].callback_data, "confirm:abc");
        assert_eq!(rows[0][1].callback_data, "cancel:abc");
    }
}
