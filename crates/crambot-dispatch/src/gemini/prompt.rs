// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System instructions for each persona.

use chrono::NaiveDate;
use crambot_core::ClassifierContext;
use crambot_core::types::Persona;

use crate::calendar;

const OUTPUT_FORMAT: &str = r#"你必須輸出 JSON，格式如下：
{
  "intent": "意圖 ID",
  "confidence": 0.0-1.0,
  "params": { ... },
  "need_clarification": false,
  "clarification_question": null,
  "reply": null
}

如果資訊不足以確定意圖或參數，設 need_clarification 為 true 並提供 clarification_question。"#;

/// Builds the system instruction for `context` as of `today`.
pub fn system_prompt(context: &ClassifierContext, today: NaiveDate) -> String {
    match context.persona {
        Persona::Admin => admin_prompt(context, today),
        Persona::Parent => parent_prompt(context, today),
    }
}

fn admin_prompt(context: &ClassifierContext, today: NaiveDate) -> String {
    let mut prompt = format!(
        "你是 94CramBot，{} 的補習班管理助手。你的工作是解析班主任的自然語言指令，判斷意圖並萃取參數。

可用的意圖：
- inclass.leave: 登記學生請假（需要：student_name, date, reason?）
- inclass.late: 登記學生遲到（需要：student_name, date）
- inclass.checkin: 登記學生到班（需要：student_name, date?）
- inclass.query_list: 查詢出缺勤名單（需要：class_name? 或 student_name?, date?）
- inclass.query_report: 查詢出缺勤報表（需要：class_name?, start_date?, end_date?）
- manage.payment: 登記繳費（需要：student_name, amount, payment_type?, date?）
- manage.add_student: 新增學生（需要：name, class_name?, parent_phone?, parent_name?）
- manage.query_student: 查學生資料（需要：student_name 或 keyword）
- manage.query_finance: 查財務報表（需要：start_date?, end_date?, payment_type?）
- manage.query_history: 查繳費紀錄（需要：student_name?, start_date?, end_date?）
- stock.ship: 出貨（需要：item_name, quantity, destination）
- stock.restock: 進貨（需要：item_name, quantity）
- stock.query: 查庫存（需要：item_name?）
- stock.query_history: 查進出貨紀錄（需要：item_name?, start_date?, end_date?）
- system.switch: 切換補習班
- system.help: 查看使用說明
- system.sync: 同步補習班資料
- unknown: 無法辨識

今天的日期是 {}。
如果使用者說「今天」，date 就是今天。
如果使用者說「這個月」，start_date 是本月 1 號，end_date 是今天。

{OUTPUT_FORMAT}",
        context.tenant_name,
        calendar::iso(today),
    );

    if let Some(snapshot) = &context.snapshot {
        if !snapshot.students.is_empty() {
            let lines: Vec<String> = snapshot
                .students
                .iter()
                .map(|s| format!("- {}（{}，ID: {}）", s.name, s.class_name, s.id))
                .collect();
            prompt.push_str(&format!("\n\n該補習班的學生名單：\n{}", lines.join("\n")));
        }
        if !snapshot.classes.is_empty() {
            prompt.push_str(&format!("\n\n班級列表：{}", snapshot.classes.join("、")));
        }
        if !snapshot.items.is_empty() {
            let lines: Vec<String> = snapshot
                .items
                .iter()
                .map(|i| format!("- {}（庫存: {}，ID: {}）", i.name, i.stock, i.id))
                .collect();
            prompt.push_str(&format!("\n\n品項列表：\n{}", lines.join("\n")));
        }
        if !snapshot.warehouses.is_empty() {
            let lines: Vec<String> = snapshot
                .warehouses
                .iter()
                .map(|w| format!("- {}（ID: {}）", w.name, w.id))
                .collect();
            prompt.push_str(&format!("\n\n倉庫/分校：\n{}", lines.join("\n")));
        }
    }
    prompt
}

fn parent_prompt(context: &ClassifierContext, today: NaiveDate) -> String {
    let children: Vec<String> = context
        .children
        .iter()
        .map(|c| format!("- {}（ID: {}）", c.student_name, c.student_id))
        .collect();
    format!(
        "你是順風耳，{} 的家長小幫手。你的工作是理解家長的訊息，判斷意圖並萃取參數。

可用的意圖：
- parent.leave: 幫孩子請假（需要：child_name, date, reason?）
- parent.attendance: 查詢孩子出缺勤（需要：child_name?）
- parent.payments: 查詢繳費狀態（需要：child_name?）
- parent.schedule: 查詢課表（需要：child_name?）
- parent.help: 使用說明或打招呼
- unknown: 無法辨識

家長綁定的孩子：
{}

今天的日期是 {}。date 一律使用 YYYY-MM-DD 格式。
child_name 必須是上面名單中的名字；如果家長只有一位孩子，可以省略。

{OUTPUT_FORMAT}",
        context.tenant_name,
        children.join("\n"),
        calendar::iso(today),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crambot_core::types::{ParentChild, StudentRef, TenantSnapshot};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn admin_prompt_embeds_reference_data() {
        let ctx = ClassifierContext {
            persona: Persona::Admin,
            tenant_name: "大安補習班".into(),
            snapshot: Some(TenantSnapshot {
                students: vec![StudentRef {
                    id: "s1".into(),
                    name: "陳小明".into(),
                    class_name: "國一A".into(),
                }],
                classes: vec!["國一A".into(), "國二B".into()],
                items: vec![],
                warehouses: vec![],
                tenant_name: None,
                tenant_address: None,
                last_synced_at: chrono::Utc::now(),
            }),
            children: vec![],
        };
        let prompt = system_prompt(&ctx, day());
        assert!(prompt.contains("大安補習班"));
        assert!(prompt.contains("今天的日期是 2026-10-19"));
        assert!(prompt.contains("- 陳小明（國一A，ID: s1）"));
        assert!(prompt.contains("班級列表：國一A、國二B"));
        assert!(!prompt.contains("品項列表"));
    }

    #[test]
    fn parent_prompt_lists_children() {
        let ctx = ClassifierContext {
            persona: Persona::Parent,
            tenant_name: "大安補習班".into(),
            snapshot: None,
            children: vec![ParentChild {
                student_id: "s9".into(),
                student_name: "林小華".into(),
                relation: "家長".into(),
            }],
        };
        let prompt = system_prompt(&ctx, day());
        assert!(prompt.contains("parent.leave"));
        assert!(prompt.contains("- 林小華（ID: s9）"));
        assert!(!prompt.contains("inclass.leave"));
    }
}
