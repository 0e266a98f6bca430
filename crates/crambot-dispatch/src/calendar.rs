// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dates as seen by the schools (UTC+8).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

const SCHOOL_OFFSET_SECS: i32 = 8 * 3600;

/// `ts` on the schools' wall clock.
pub fn local_time(ts: DateTime<Utc>) -> NaiveDateTime {
    match FixedOffset::east_opt(SCHOOL_OFFSET_SECS) {
        Some(tz) => ts.with_timezone(&tz).naive_local(),
        None => ts.naive_utc(),
    }
}

/// Today's date in the schools' timezone.
pub fn today() -> NaiveDate {
    local_time(Utc::now()).date()
}

/// `YYYY-MM-DD`.
pub fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn late_utc_evening_is_the_next_school_day() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 18, 17, 30, 0).unwrap();
        let local = local_time(ts);
        assert_eq!(local.format("%-m/%-d %H:%M").to_string(), "10/19 01:30");
    }
}
