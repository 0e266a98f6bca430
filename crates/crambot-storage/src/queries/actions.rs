// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-action rows.

use crambot_core::CrambotError;
use crambot_core::types::{ActionStatus, PendingAction};
use rusqlite::{OptionalExtension, params};

use super::{enum_col, fmt_ts, json_col, to_json, ts_col};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, user_id, chat_id, tenant_id, tenant_name, intent, params, status, \
                       confirm_message_id, created_at, expires_at";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingAction> {
    Ok(PendingAction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        chat_id: row.get(2)?,
        tenant_id: row.get(3)?,
        tenant_name: row.get(4)?,
        intent: row.get(5)?,
        params: json_col(row, 6)?,
        status: enum_col(row, 7)?,
        confirm_message_id: row.get(8)?,
        created_at: ts_col(row, 9)?,
        expires_at: ts_col(row, 10)?,
    })
}

pub async fn create(db: &Database, action: &PendingAction) -> Result<(), CrambotError> {
    let params_json = to_json(&action.params)?;
    let a = action.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO pending_actions ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    a.id,
                    a.user_id,
                    a.chat_id,
                    a.tenant_id,
                    a.tenant_name,
                    a.intent,
                    params_json,
                    a.status.to_string(),
                    a.confirm_message_id,
                    fmt_ts(a.created_at),
                    fmt_ts(a.expires_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<PendingAction>, CrambotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM pending_actions WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn latest_pending_for_user(
    db: &Database,
    user_id: &str,
) -> Result<Option<PendingAction>, CrambotError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM pending_actions \
                     WHERE user_id = ?1 AND status = 'pending' \
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![user_id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Conditional status update. `true` iff this call performed the transition.
pub async fn transition(
    db: &Database,
    id: &str,
    from: ActionStatus,
    to: ActionStatus,
) -> Result<bool, CrambotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE pending_actions SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![to.to_string(), id, from.to_string()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_confirm_message_id(
    db: &Database,
    id: &str,
    message_id: &str,
) -> Result<(), CrambotError> {
    let id = id.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE pending_actions SET confirm_message_id = ?1 WHERE id = ?2",
                params![message_id, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
