// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-bot request rows.

use chrono::{DateTime, Utc};
use crambot_core::CrambotError;
use crambot_core::types::{CrossBotRequest, RequestStatus};
use rusqlite::{OptionalExtension, params};

use super::{enum_col, fmt_ts, json_col, to_json, ts_col};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, kind, from_persona, to_persona, tenant_id, student_id, student_name, \
                       requester_user_id, requester_chat_id, responder_chat_id, data, status, \
                       created_at, updated_at, expires_at";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CrossBotRequest> {
    Ok(CrossBotRequest {
        id: row.get(0)?,
        kind: enum_col(row, 1)?,
        from: enum_col(row, 2)?,
        to: enum_col(row, 3)?,
        tenant_id: row.get(4)?,
        student_id: row.get(5)?,
        student_name: row.get(6)?,
        requester_user_id: row.get(7)?,
        requester_chat_id: row.get(8)?,
        responder_chat_id: row.get(9)?,
        data: json_col(row, 10)?,
        status: enum_col(row, 11)?,
        created_at: ts_col(row, 12)?,
        updated_at: ts_col(row, 13)?,
        expires_at: ts_col(row, 14)?,
    })
}

pub async fn create(db: &Database, request: &CrossBotRequest) -> Result<(), CrambotError> {
    let data = to_json(&request.data)?;
    let r = request.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO cross_bot_requests ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    r.id,
                    r.kind.to_string(),
                    r.from.to_string(),
                    r.to.to_string(),
                    r.tenant_id,
                    r.student_id,
                    r.student_name,
                    r.requester_user_id,
                    r.requester_chat_id,
                    r.responder_chat_id,
                    data,
                    r.status.to_string(),
                    fmt_ts(r.created_at),
                    fmt_ts(r.updated_at),
                    fmt_ts(r.expires_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<CrossBotRequest>, CrambotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM cross_bot_requests WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Writes the decision iff the request is still pending.
pub async fn decide(db: &Database, id: &str, to: RequestStatus) -> Result<bool, CrambotError> {
    let id = id.to_string();
    let now = fmt_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE cross_bot_requests SET status = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND status = 'pending'",
                params![to.to_string(), now, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_responder_chat_id(
    db: &Database,
    id: &str,
    chat_id: &str,
) -> Result<(), CrambotError> {
    let id = id.to_string();
    let chat_id = chat_id.to_string();
    let now = fmt_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE cross_bot_requests SET responder_chat_id = ?1, updated_at = ?2 \
                 WHERE id = ?3",
                params![chat_id, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_pending(
    db: &Database,
    tenant_id: &str,
    now: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<CrossBotRequest>, CrambotError> {
    let tenant_id = tenant_id.to_string();
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM cross_bot_requests \
                 WHERE tenant_id = ?1 AND status = 'pending' AND expires_at > ?2 \
                 ORDER BY created_at DESC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![tenant_id, now, limit], from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::testing::setup_db;
    use chrono::Duration;
    use crambot_core::types::{CrossBotKind, Persona};
    use serde_json::json;

    fn request(id: &str, tenant: &str, age_hours: i64, ttl_hours: i64) -> CrossBotRequest {
        let created = Utc::now() - Duration::hours(age_hours);
        CrossBotRequest {
            id: id.into(),
            kind: CrossBotKind::LeaveRequest,
            from: Persona::Parent,
            to: Persona::Admin,
            tenant_id: tenant.into(),
            student_id: "s1".into(),
            student_name: "陳小明".into(),
            requester_user_id: "p1".into(),
            requester_chat_id: "pc1".into(),
            responder_chat_id: None,
            data: json!({"date": "2026-03-01", "reason": "腸胃炎"}),
            status: RequestStatus::Pending,
            created_at: created,
            updated_at: created,
            expires_at: created + Duration::hours(ttl_hours),
        }
    }

    #[tokio::test]
    async fn round_trip_preserves_personas_and_data() {
        let (db, _dir) = setup_db().await;
        create(&db, &request("r1", "t1", 0, 72)).await.unwrap();
        let loaded = get(&db, "r1").await.unwrap().unwrap();
        assert_eq!(loaded.from, Persona::Parent);
        assert_eq!(loaded.to, Persona::Admin);
        assert_eq!(loaded.kind, CrossBotKind::LeaveRequest);
        assert_eq!(loaded.data_str("reason"), Some("腸胃炎"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn first_decision_wins() {
        let (db, _dir) = setup_db().await;
        create(&db, &request("r1", "t1", 0, 72)).await.unwrap();
        assert!(decide(&db, "r1", RequestStatus::Approved).await.unwrap());
        assert!(!decide(&db, "r1", RequestStatus::Rejected).await.unwrap());
        let loaded = get(&db, "r1").await.unwrap().unwrap();
        assert_eq!(loaded.status, RequestStatus::Approved);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn responder_chat_is_stored() {
        let (db, _dir) = setup_db().await;
        create(&db, &request("r1", "t1", 0, 72)).await.unwrap();
        set_responder_chat_id(&db, "r1", "admin-chat").await.unwrap();
        let loaded = get(&db, "r1").await.unwrap().unwrap();
        assert_eq!(loaded.responder_chat_id.as_deref(), Some("admin-chat"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_pending_filters_tenant_status_and_expiry() {
        let (db, _dir) = setup_db().await;
        create(&db, &request("fresh", "t1", 1, 72)).await.unwrap();
        create(&db, &request("newest", "t1", 0, 72)).await.unwrap();
        create(&db, &request("expired", "t1", 80, 72)).await.unwrap();
        create(&db, &request("decided", "t1", 0, 72)).await.unwrap();
        create(&db, &request("elsewhere", "t2", 0, 72)).await.unwrap();
        decide(&db, "decided", RequestStatus::Rejected).await.unwrap();

        let pending = list_pending(&db, "t1", Utc::now(), 20).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "fresh"]);

        let limited = list_pending(&db, "t1", Utc::now(), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        db.close().await.unwrap();
    }
}
