// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin and parent bindings, and the bind codes that create them.

use chrono::Utc;
use crambot_core::CrambotError;
use crambot_core::types::{BindCode, ParentBinding, TenantBinding, UserBinding};
use rusqlite::{OptionalExtension, params};

use super::{enum_col, fmt_ts, json_col, to_json, ts_col};
use crate::database::{Database, map_tr_err};

// --- Admin bindings ---

pub async fn get_user(db: &Database, user_id: &str) -> Result<Option<UserBinding>, CrambotError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let head = conn
                .query_row(
                    "SELECT active_tenant_id, active_tenant_name, created_at, last_active_at \
                     FROM user_bindings WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            ts_col(row, 2)?,
                            ts_col(row, 3)?,
                        ))
                    },
                )
                .optional()?;
            let Some((active_tenant_id, active_tenant_name, created_at, last_active_at)) = head
            else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT tenant_id, tenant_name, role FROM user_tenant_bindings \
                 WHERE user_id = ?1 ORDER BY bound_at ASC, tenant_id ASC",
            )?;
            let bindings = stmt
                .query_map(params![user_id], |row| {
                    Ok(TenantBinding {
                        tenant_id: row.get(0)?,
                        tenant_name: row.get(1)?,
                        role: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Some(UserBinding {
                user_id,
                bindings,
                active_tenant_id,
                active_tenant_name,
                created_at,
                last_active_at,
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Adds or refreshes a tenant binding and makes it active.
pub async fn add_user(
    db: &Database,
    user_id: &str,
    binding: &TenantBinding,
) -> Result<(), CrambotError> {
    let user_id = user_id.to_string();
    let b = binding.clone();
    let now = fmt_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO user_tenant_bindings (user_id, tenant_id, tenant_name, role, bound_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(user_id, tenant_id) DO UPDATE SET \
                 tenant_name = excluded.tenant_name, role = excluded.role",
                params![user_id, b.tenant_id, b.tenant_name, b.role, now],
            )?;
            tx.execute(
                "INSERT INTO user_bindings (user_id, active_tenant_id, active_tenant_name, \
                 created_at, last_active_at) VALUES (?1, ?2, ?3, ?4, ?4) \
                 ON CONFLICT(user_id) DO UPDATE SET active_tenant_id = excluded.active_tenant_id, \
                 active_tenant_name = excluded.active_tenant_name, \
                 last_active_at = excluded.last_active_at",
                params![user_id, b.tenant_id, b.tenant_name, now],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Switches the active tenant to one the user is already bound to.
pub async fn switch_active(
    db: &Database,
    user_id: &str,
    tenant_id: &str,
) -> Result<bool, CrambotError> {
    let user_id = user_id.to_string();
    let tenant_id = tenant_id.to_string();
    let now = fmt_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE user_bindings SET active_tenant_id = b.tenant_id, \
                 active_tenant_name = b.tenant_name, last_active_at = ?3 \
                 FROM (SELECT tenant_id, tenant_name FROM user_tenant_bindings \
                       WHERE user_id = ?1 AND tenant_id = ?2) AS b \
                 WHERE user_bindings.user_id = ?1",
                params![user_id, tenant_id, now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Users currently operating on `tenant_id`, most recently active first.
pub async fn admin_chat_ids_for_tenant(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<String>, CrambotError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM user_bindings WHERE active_tenant_id = ?1 \
                 ORDER BY last_active_at DESC",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

// --- Parent bindings ---

pub async fn get_parent(
    db: &Database,
    user_id: &str,
) -> Result<Option<ParentBinding>, CrambotError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id, tenant_id, parent_name, children, created_at, last_active_at \
                 FROM parent_bindings WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(ParentBinding {
                        user_id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        parent_name: row.get(2)?,
                        children: json_col(row, 3)?,
                        created_at: ts_col(row, 4)?,
                        last_active_at: ts_col(row, 5)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn put_parent(db: &Database, binding: &ParentBinding) -> Result<(), CrambotError> {
    let children = to_json(&binding.children)?;
    let b = binding.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO parent_bindings (user_id, tenant_id, parent_name, children, \
                 created_at, last_active_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(user_id) DO UPDATE SET tenant_id = excluded.tenant_id, \
                 parent_name = excluded.parent_name, children = excluded.children, \
                 last_active_at = excluded.last_active_at",
                params![
                    b.user_id,
                    b.tenant_id,
                    b.parent_name,
                    children,
                    fmt_ts(b.created_at),
                    fmt_ts(b.last_active_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

// --- Bind codes ---

pub async fn put_code(db: &Database, code: &BindCode) -> Result<(), CrambotError> {
    let c = code.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bind_codes (code, kind, tenant_id, tenant_name, student_id, \
                 student_name, used_by, created_at, expires_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    c.code,
                    c.kind.to_string(),
                    c.tenant_id,
                    c.tenant_name,
                    c.student_id,
                    c.student_name,
                    c.used_by,
                    fmt_ts(c.created_at),
                    fmt_ts(c.expires_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_code(db: &Database, code: &str) -> Result<Option<BindCode>, CrambotError> {
    let code = code.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT code, kind, tenant_id, tenant_name, student_id, student_name, used_by, \
                 created_at, expires_at FROM bind_codes WHERE code = ?1",
                params![code],
                |row| {
                    Ok(BindCode {
                        code: row.get(0)?,
                        kind: enum_col(row, 1)?,
                        tenant_id: row.get(2)?,
                        tenant_name: row.get(3)?,
                        student_id: row.get(4)?,
                        student_name: row.get(5)?,
                        used_by: row.get(6)?,
                        created_at: ts_col(row, 7)?,
                        expires_at: ts_col(row, 8)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Claims an unused code for `user_id`.
pub async fn consume_code(db: &Database, code: &str, user_id: &str) -> Result<bool, CrambotError> {
    let code = code.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE bind_codes SET used_by = ?1 WHERE code = ?2 AND used_by IS NULL",
                params![user_id, code],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::testing::setup_db;
    use chrono::Duration;
    use crambot_core::types::{BindKind, ParentChild};

    fn tenant(id: &str, name: &str) -> TenantBinding {
        TenantBinding {
            tenant_id: id.into(),
            tenant_name: name.into(),
            role: "admin".into(),
        }
    }

    #[tokio::test]
    async fn adding_bindings_moves_active_tenant() {
        let (db, _dir) = setup_db().await;
        add_user(&db, "u1", &tenant("t1", "大安補習班")).await.unwrap();
        add_user(&db, "u1", &tenant("t2", "信義補習班")).await.unwrap();

        let binding = get_user(&db, "u1").await.unwrap().unwrap();
        assert_eq!(binding.bindings.len(), 2);
        assert_eq!(binding.active_tenant_id, "t2");
        assert_eq!(binding.active_tenant_name, "信義補習班");
        assert!(get_user(&db, "nobody").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn switch_requires_existing_binding() {
        let (db, _dir) = setup_db().await;
        add_user(&db, "u1", &tenant("t1", "大安補習班")).await.unwrap();
        add_user(&db, "u1", &tenant("t2", "信義補習班")).await.unwrap();

        assert!(switch_active(&db, "u1", "t1").await.unwrap());
        assert_eq!(
            get_user(&db, "u1").await.unwrap().unwrap().active_tenant_name,
            "大安補習班"
        );
        assert!(!switch_active(&db, "u1", "t9").await.unwrap());
        assert!(!switch_active(&db, "nobody", "t1").await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn admin_lookup_follows_active_tenant() {
        let (db, _dir) = setup_db().await;
        add_user(&db, "u1", &tenant("t1", "A")).await.unwrap();
        add_user(&db, "u2", &tenant("t1", "A")).await.unwrap();
        add_user(&db, "u3", &tenant("t2", "B")).await.unwrap();

        let ids = admin_chat_ids_for_tenant(&db, "t1").await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"u1".to_string()));
        assert!(ids.contains(&"u2".to_string()));
        assert!(admin_chat_ids_for_tenant(&db, "t3").await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn parent_binding_round_trip() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let mut binding = ParentBinding {
            user_id: "p1".into(),
            tenant_id: "t1".into(),
            parent_name: "陳媽媽".into(),
            children: vec![ParentChild {
                student_id: "s1".into(),
                student_name: "陳小明".into(),
                relation: "parent".into(),
            }],
            created_at: now,
            last_active_at: now,
        };
        put_parent(&db, &binding).await.unwrap();
        binding.children.push(ParentChild {
            student_id: "s2".into(),
            student_name: "陳小華".into(),
            relation: "parent".into(),
        });
        put_parent(&db, &binding).await.unwrap();

        let loaded = get_parent(&db, "p1").await.unwrap().unwrap();
        assert_eq!(loaded.children.len(), 2);
        assert_eq!(loaded.children[1].student_name, "陳小華");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn bind_code_is_single_use() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        put_code(
            &db,
            &BindCode {
                code: "123456".into(),
                kind: BindKind::Parent,
                tenant_id: "t1".into(),
                tenant_name: "大安補習班".into(),
                student_id: Some("s1".into()),
                student_name: Some("陳小明".into()),
                used_by: None,
                created_at: now,
                expires_at: now + Duration::hours(24),
            },
        )
        .await
        .unwrap();

        assert!(consume_code(&db, "123456", "p1").await.unwrap());
        assert!(!consume_code(&db, "123456", "p2").await.unwrap());
        let code = get_code(&db, "123456").await.unwrap().unwrap();
        assert_eq!(code.used_by.as_deref(), Some("p1"));
        assert_eq!(code.kind, BindKind::Parent);
        db.close().await.unwrap();
    }
}
