// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per stored entity, plus column conversion helpers.

pub mod actions;
pub mod audit;
pub mod bindings;
pub mod broadcast;
pub mod buckets;
pub mod conversations;
pub mod requests;
pub mod tenant_cache;
pub mod usage;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use crambot_core::CrambotError;
use rusqlite::types::Type;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Formats a timestamp so that lexical order equals chronological order.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Reads an RFC 3339 timestamp column.
pub(crate) fn ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Reads a JSON text column.
pub(crate) fn json_col<T: DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Reads a text column holding a strum-encoded enum.
pub(crate) fn enum_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Serializes a value for a JSON column before entering the connection thread.
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CrambotError> {
    serde_json::to_string(value).map_err(CrambotError::storage)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::database::Database;

    pub async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }
}
