use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use rusqlite::Connection;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = NORMAL;\n\
         PRAGMA foreign_keys = ON;\n\
         PRAGMA temp_store = MEMORY;\n\
         PRAGMA busy_timeout = 5000;\n",
    )
}

/// Truncates to the precision that survives a round trip through the database.
pub fn stored_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(3)
}

/// Earliest stored-precision instant at or after `value`.
pub fn stored_precision_ceil(value: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = stored_precision(value);
    if truncated == value {
        return value;
    }
    truncated
        .checked_add_signed(chrono::Duration::milliseconds(1))
        .unwrap_or(truncated)
}

/// Fixed-width UTC encoding, so lexical order in SQL matches time order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    let raw = value?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // CURRENT_TIMESTAMP defaults come back as "YYYY-MM-DD HH:MM:SS".
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
