// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword rules for the parent persona.
//!
//! Used when the classifier is unavailable or cannot place a parent's
//! message, and to fill in the child, date and reason it left out.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use crambot_core::types::{IntentResult, ParentChild, Params};
use regex::Regex;
use serde_json::Value;

use crate::calendar;
use crate::catalog::parent;

pub const DEFAULT_LEAVE_REASON: &str = "家長代請假";

const KEYWORDS: &[(&str, &[&str])] = &[
    (
        parent::LEAVE,
        &["請假", "代請假", "病假", "事假", "不去上課", "不能去"],
    ),
    (
        parent::ATTENDANCE,
        &[
            "出勤", "出缺勤", "缺席", "遲到", "到校", "出席", "有到", "到了嗎", "到了沒",
            "到補習班", "到班", "有沒有到", "有去", "去了嗎",
        ],
    ),
    (
        parent::PAYMENTS,
        &[
            "繳費", "費用", "學費", "帳單", "付款", "欠費", "繳了", "繳錢", "繳清", "錢",
        ],
    ),
    (
        parent::SCHEDULE,
        &["課表", "上課", "課程", "排課", "幾點上", "什麼時候上", "哪些班", "班級"],
    ),
    (
        parent::HELP,
        &["說明", "幫助", "功能", "help", "你好", "嗨", "哈囉"],
    ),
];

const COMMON_REASONS: &[&str] = &[
    "腸胃炎", "感冒", "發燒", "生病", "家庭因素", "私事", "看醫生", "身體不適", "頭痛", "牙痛",
];

static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})").unwrap());
static CN_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})月(\d{1,2})[日號]").unwrap());
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());

/// Classifies a parent's message by keywords.
pub fn parse(text: &str, children: &[ParentChild], today: NaiveDate) -> IntentResult {
    let normalized = text.trim().to_lowercase();
    let Some((intent, _)) = KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| normalized.contains(w)))
    else {
        return IntentResult {
            intent: IntentResult::UNKNOWN.to_string(),
            confidence: 0.0,
            params: Params::new(),
            need_clarification: false,
            clarification_question: None,
            reply: None,
        };
    };

    let mut result = IntentResult {
        intent: intent.to_string(),
        confidence: 0.6,
        params: Params::new(),
        need_clarification: false,
        clarification_question: None,
        reply: None,
    };
    complete_params(&mut result, text, children, today);
    result
}

/// Fills in child, date and reason parameters the classifier did not provide.
pub fn complete_params(
    result: &mut IntentResult,
    text: &str,
    children: &[ParentChild],
    today: NaiveDate,
) {
    let named = result.param_str("child_name");
    if result.param_str("student_id").is_none() {
        let child = named
            .as_deref()
            .and_then(|n| match_child(n, children))
            .or_else(|| match_child(text, children));
        if let Some(child) = child {
            result
                .params
                .insert("student_id".into(), Value::String(child.student_id.clone()));
            result
                .params
                .insert("child_name".into(), Value::String(child.student_name.clone()));
        }
    }

    if result.intent == parent::LEAVE {
        if result.param_str("date").is_none() {
            if let Some(date) = extract_date(text, today) {
                result.params.insert("date".into(), Value::String(date));
            }
        }
        if result.param_str("reason").is_none() {
            if let Some(reason) = extract_reason(text) {
                result.params.insert("reason".into(), Value::String(reason));
            }
        }
    }
}

/// Finds the child named in `text`. A single bound child is the default.
pub fn match_child<'a>(text: &str, children: &'a [ParentChild]) -> Option<&'a ParentChild> {
    let text = text.trim();
    children
        .iter()
        .find(|c| {
            !text.is_empty() && (text.contains(&c.student_name) || c.student_name.contains(text))
        })
        .or(match children {
            [only] => Some(only),
            _ => None,
        })
}

/// Recognizes 今天/明天/後天, `M/D`, `M月D日` and ISO dates.
pub fn extract_date(text: &str, today: NaiveDate) -> Option<String> {
    if text.contains("今天") {
        return Some(calendar::iso(today));
    }
    if text.contains("明天") {
        return Some(calendar::iso(today + Duration::days(1)));
    }
    if text.contains("後天") {
        return Some(calendar::iso(today + Duration::days(2)));
    }

    let month_day = SLASH_DATE
        .captures(text)
        .or_else(|| CN_DATE.captures(text))
        .and_then(|c| Some((c[1].parse::<u32>().ok()?, c[2].parse::<u32>().ok()?)));
    if let Some((month, day)) = month_day {
        return NaiveDate::from_ymd_opt(today.year(), month, day).map(calendar::iso);
    }

    ISO_DATE
        .captures(text)
        .and_then(|c| {
            NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
        })
        .map(calendar::iso)
}

pub fn extract_reason(text: &str) -> Option<String> {
    if let Some(reason) = COMMON_REASONS.iter().find(|r| text.contains(*r)) {
        return Some(reason.to_string());
    }
    ["原因", "因為", "因", "，"].iter().find_map(|marker| {
        let (_, after) = text.split_once(marker)?;
        let after = after.trim();
        let len = after.chars().count();
        (len > 0 && len <= 20).then(|| after.to_string())
    })
}
