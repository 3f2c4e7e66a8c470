//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDateTime};

/// Text format used for every timestamp column in the database
pub const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get current local timestamp
///
/// The control table is maintained by plant-local ETL jobs, so its
/// timestamps are local wall-clock time.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Format a timestamp for storage in a TEXT column
pub fn to_db_text(timestamp: &DateTime<Local>) -> String {
    timestamp.format(DB_TIMESTAMP_FORMAT).to_string()
}

/// Current timestamp formatted for storage
pub fn now_db_text() -> String {
    to_db_text(&now())
}

/// Parse a stored timestamp back into a naive local time
pub fn parse_db_text(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DB_TIMESTAMP_FORMAT).ok()
}
