// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcast job rows.

use crambot_core::CrambotError;
use crambot_core::types::{BroadcastJob, BroadcastProgress};
use rusqlite::{OptionalExtension, params};

use super::{enum_col, fmt_ts, json_col, to_json, ts_col};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, chat_ids, message, options, status, total, succeeded, failed, \
                       created_at, updated_at, expires_at";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BroadcastJob> {
    Ok(BroadcastJob {
        id: row.get(0)?,
        chat_ids: json_col(row, 1)?,
        message: row.get(2)?,
        options: json_col(row, 3)?,
        status: enum_col(row, 4)?,
        progress: BroadcastProgress {
            total: row.get(5)?,
            succeeded: row.get(6)?,
            failed: row.get(7)?,
        },
        created_at: ts_col(row, 8)?,
        updated_at: ts_col(row, 9)?,
        expires_at: ts_col(row, 10)?,
    })
}

/// Inserts the job or replaces every mutable column of an existing one.
pub async fn put(db: &Database, job: &BroadcastJob) -> Result<(), CrambotError> {
    let chat_ids = to_json(&job.chat_ids)?;
    let options = to_json(&job.options)?;
    let j = job.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO broadcast_jobs ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
                     ON CONFLICT(id) DO UPDATE SET status = excluded.status, \
                     total = excluded.total, succeeded = excluded.succeeded, \
                     failed = excluded.failed, updated_at = excluded.updated_at"
                ),
                params![
                    j.id,
                    chat_ids,
                    j.message,
                    options,
                    j.status.to_string(),
                    j.progress.total,
                    j.progress.succeeded,
                    j.progress.failed,
                    fmt_ts(j.created_at),
                    fmt_ts(j.updated_at),
                    fmt_ts(j.expires_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<BroadcastJob>, CrambotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM broadcast_jobs WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list(db: &Database, limit: u32) -> Result<Vec<BroadcastJob>, CrambotError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM broadcast_jobs ORDER BY created_at DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::testing::setup_db;
    use chrono::{Duration, Utc};
    use crambot_core::types::{InlineButton, JobStatus, SendOptions};

    fn job(id: &str, age_secs: i64) -> BroadcastJob {
        let created = Utc::now() - Duration::seconds(age_secs);
        BroadcastJob {
            id: id.into(),
            chat_ids: vec!["1".into(), "2".into(), "3".into()],
            message: "明天停課".into(),
            options: SendOptions::with_keyboard(vec![vec![InlineButton::callback("知道了", "ack")]]),
            status: JobStatus::Pending,
            progress: BroadcastProgress {
                total: 3,
                ..Default::default()
            },
            created_at: created,
            updated_at: created,
            expires_at: created + Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn upsert_updates_progress_only() {
        let (db, _dir) = setup_db().await;
        let mut j = job("b1", 0);
        put(&db, &j).await.unwrap();

        j.status = JobStatus::Completed;
        j.progress.succeeded = 2;
        j.progress.failed = 1;
        j.message = "ignored".into();
        put(&db, &j).await.unwrap();

        let loaded = get(&db, "b1").await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.progress.succeeded, 2);
        assert_eq!(loaded.progress.failed, 1);
        assert_eq!(loaded.message, "明天停課");
        assert!(loaded.options.keyboard.is_some());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (db, _dir) = setup_db().await;
        put(&db, &job("old", 60)).await.unwrap();
        put(&db, &job("new", 0)).await.unwrap();
        let jobs = list(&db, 10).await.unwrap();
        assert_eq!(jobs[0].id, "new");
        assert_eq!(jobs[1].id, "old");
        db.close().await.unwrap();
    }
}
