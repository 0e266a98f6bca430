// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant daily usage counters.

use crambot_core::CrambotError;
use crambot_core::types::{DailyUsage, UsageKind, UsageSummary};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

pub async fn increment(
    db: &Database,
    tenant_id: &str,
    kind: UsageKind,
    day: &str,
) -> Result<(), CrambotError> {
    let tenant_id = tenant_id.to_string();
    let day = day.to_string();
    let sql = match kind {
        UsageKind::AiCalls => {
            "INSERT INTO usage_daily (tenant_id, day, ai_calls) VALUES (?1, ?2, 1) \
             ON CONFLICT(tenant_id, day) DO UPDATE SET ai_calls = ai_calls + 1"
        }
        UsageKind::ApiCalls => {
            "INSERT INTO usage_daily (tenant_id, day, api_calls) VALUES (?1, ?2, 1) \
             ON CONFLICT(tenant_id, day) DO UPDATE SET api_calls = api_calls + 1"
        }
    };
    db.connection()
        .call(move |conn| {
            conn.execute(sql, params![tenant_id, day])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Sums the days of a `YYYY-MM` month.
pub async fn summary(
    db: &Database,
    tenant_id: &str,
    month: &str,
) -> Result<UsageSummary, CrambotError> {
    let tenant_id = tenant_id.to_string();
    let month = month.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT day, ai_calls, api_calls FROM usage_daily \
                 WHERE tenant_id = ?1 AND day LIKE ?2 ORDER BY day ASC",
            )?;
            let daily = stmt
                .query_map(params![tenant_id, format!("{month}-%")], |row| {
                    Ok(DailyUsage {
                        day: row.get(0)?,
                        ai_calls: row.get::<_, i64>(1)?.max(0) as u64,
                        api_calls: row.get::<_, i64>(2)?.max(0) as u64,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(UsageSummary {
                ai_calls: daily.iter().map(|d| d.ai_calls).sum(),
                api_calls: daily.iter().map(|d| d.api_calls).sum(),
                tenant_id,
                month,
                daily,
            })
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::testing::setup_db;

    #[tokio::test]
    async fn counters_accumulate_and_summarize_by_month() {
        let (db, _dir) = setup_db().await;
        increment(&db, "t1", UsageKind::AiCalls, "2026-03-01").await.unwrap();
        increment(&db, "t1", UsageKind::AiCalls, "2026-03-01").await.unwrap();
        increment(&db, "t1", UsageKind::ApiCalls, "2026-03-02").await.unwrap();
        increment(&db, "t1", UsageKind::AiCalls, "2026-04-01").await.unwrap();
        increment(&db, "t2", UsageKind::AiCalls, "2026-03-01").await.unwrap();

        let march = summary(&db, "t1", "2026-03").await.unwrap();
        assert_eq!(march.ai_calls, 2);
        assert_eq!(march.api_calls, 1);
        assert_eq!(march.daily.len(), 2);
        assert_eq!(march.daily[0].day, "2026-03-01");

        let empty = summary(&db, "t3", "2026-03").await.unwrap();
        assert_eq!(empty.ai_calls, 0);
        assert!(empty.daily.is_empty());
        db.close().await.unwrap();
    }
}
