// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only operation audit log.

use crambot_core::CrambotError;
use crambot_core::types::AuditEntry;
use rusqlite::params;

use super::{enum_col, fmt_ts, json_col, to_json, ts_col};
use crate::database::{Database, map_tr_err};

pub async fn append(db: &Database, entry: &AuditEntry) -> Result<(), CrambotError> {
    let params_json = to_json(&entry.params)?;
    let response = entry.api_response.as_ref().map(to_json).transpose()?;
    let e = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO audit_log (id, tenant_id, user_id, intent, params, status, \
                 api_response, error_message, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    e.id,
                    e.tenant_id,
                    e.user_id,
                    e.intent,
                    params_json,
                    e.status.to_string(),
                    response,
                    e.error_message,
                    fmt_ts(e.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Newest entries of a tenant first.
pub async fn list(
    db: &Database,
    tenant_id: &str,
    limit: u32,
) -> Result<Vec<AuditEntry>, CrambotError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, user_id, intent, params, status, api_response, \
                 error_message, created_at FROM audit_log \
                 WHERE tenant_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![tenant_id, limit], |row| {
                let response: Option<String> = row.get(6)?;
                let api_response = match response {
                    Some(_) => Some(json_col(row, 6)?),
                    None => None,
                };
                Ok(AuditEntry {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    user_id: row.get(2)?,
                    intent: row.get(3)?,
                    params: json_col(row, 4)?,
                    status: enum_col(row, 5)?,
                    api_response,
                    error_message: row.get(7)?,
                    created_at: ts_col(row, 8)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
