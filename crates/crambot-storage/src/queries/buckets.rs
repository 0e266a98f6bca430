// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted token-bucket state.

use crambot_core::CrambotError;
use crambot_core::types::BucketState;
use rusqlite::{OptionalExtension, params};

use super::{fmt_ts, ts_col};
use crate::database::{Database, map_tr_err};

pub async fn get(db: &Database, subject: &str) -> Result<Option<BucketState>, CrambotError> {
    let subject = subject.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT tokens, updated_at FROM rate_buckets WHERE subject = ?1",
                params![subject],
                |row| {
                    Ok(BucketState {
                        tokens: row.get(0)?,
                        updated_at: ts_col(row, 1)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn put(db: &Database, subject: &str, state: &BucketState) -> Result<(), CrambotError> {
    let subject = subject.to_string();
    let tokens = state.tokens;
    let updated_at = fmt_ts(state.updated_at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO rate_buckets (subject, tokens, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(subject) DO UPDATE SET tokens = excluded.tokens, \
                 updated_at = excluded.updated_at",
                params![subject, tokens, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::testing::setup_db;
    use chrono::Utc;

    #[tokio::test]
    async fn bucket_state_upserts() {
        let (db, _dir) = setup_db().await;
        assert!(get(&db, "user:1").await.unwrap().is_none());

        let now = Utc::now();
        put(&db, "user:1", &BucketState { tokens: 4.5, updated_at: now }).await.unwrap();
        put(&db, "user:1", &BucketState { tokens: 2.0, updated_at: now }).await.unwrap();

        let loaded = get(&db, "user:1").await.unwrap().unwrap();
        assert!((loaded.tokens - 2.0).abs() < f64::EPSILON);
        db.close().await.unwrap();
    }
}
