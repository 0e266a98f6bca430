// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only log of parent-bot conversations.

use crambot_core::CrambotError;
use crambot_core::types::ConversationEntry;
use rusqlite::params;

use super::{enum_col, fmt_ts, ts_col};
use crate::database::{Database, map_tr_err};

pub async fn append(db: &Database, entry: &ConversationEntry) -> Result<(), CrambotError> {
    let e = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO parent_conversations (id, tenant_id, parent_user_id, parent_name, \
                 chat_type, user_message, bot_response, intent, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    e.id,
                    e.tenant_id,
                    e.parent_user_id,
                    e.parent_name,
                    e.chat_type.to_string(),
                    e.user_message,
                    e.bot_response,
                    e.intent,
                    fmt_ts(e.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Newest turns of a tenant first.
pub async fn recent(
    db: &Database,
    tenant_id: &str,
    limit: u32,
) -> Result<Vec<ConversationEntry>, CrambotError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, parent_user_id, parent_name, chat_type, user_message, \
                 bot_response, intent, created_at FROM parent_conversations \
                 WHERE tenant_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![tenant_id, limit], |row| {
                Ok(ConversationEntry {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    parent_user_id: row.get(2)?,
                    parent_name: row.get(3)?,
                    chat_type: enum_col(row, 4)?,
                    user_message: row.get(5)?,
                    bot_response: row.get(6)?,
                    intent: row.get(7)?,
                    created_at: ts_col(row, 8)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
