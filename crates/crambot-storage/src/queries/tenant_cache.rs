// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable tier of the tenant snapshot cache.

use chrono::Utc;
use crambot_core::CrambotError;
use crambot_core::types::TenantSnapshot;
use rusqlite::{OptionalExtension, params};

use super::{fmt_ts, json_col, to_json};
use crate::database::{Database, map_tr_err};

pub async fn get(db: &Database, tenant_id: &str) -> Result<Option<TenantSnapshot>, CrambotError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT snapshot FROM tenant_cache WHERE tenant_id = ?1",
                params![tenant_id],
                |row| json_col(row, 0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn put(
    db: &Database,
    tenant_id: &str,
    snapshot: &TenantSnapshot,
) -> Result<(), CrambotError> {
    let tenant_id = tenant_id.to_string();
    let body = to_json(snapshot)?;
    let synced = fmt_ts(snapshot.last_synced_at);
    let now = fmt_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenant_cache (tenant_id, snapshot, last_synced_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(tenant_id) DO UPDATE SET snapshot = excluded.snapshot, \
                 last_synced_at = excluded.last_synced_at, updated_at = excluded.updated_at",
                params![tenant_id, body, synced, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete(db: &Database, tenant_id: &str) -> Result<(), CrambotError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM tenant_cache WHERE tenant_id = ?1",
                params![tenant_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
