// [libs/infra/store/src/time.rs]
//! Timestamp helpers. Rows written by this crate always carry RFC3339; rows
//! touched by a bare `CURRENT_TIMESTAMP` SQL default come back as SQLite's
//! `YYYY-MM-DD HH:MM:SS` instead, so reads accept both.

use chrono::{DateTime, NaiveDateTime, Utc};

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

pub fn parse_timestamp_or_now(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(Utc::now)
}
