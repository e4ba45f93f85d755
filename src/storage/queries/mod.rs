//! Database query modules for CRUD operations.
//!
//! Each module provides async functions that operate on the database.

pub mod accounts;
pub mod categories;
pub mod emails;
pub mod templates;
pub mod threads;

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a timestamp for storage.
pub(crate) fn to_sql_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time formatted for storage.
pub(crate) fn now() -> String {
    to_sql_time(&Utc::now())
}

/// Parses a stored timestamp, mapping failures to a column conversion error.
pub(crate) fn parse_sql_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parses an optional stored timestamp.
pub(crate) fn parse_opt_sql_time(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_sql_time(idx, &s)).transpose()
}
