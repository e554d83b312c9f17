pub mod schema;
pub mod connection;
pub mod repositories;

pub use connection::{Database, DbConnection, DbPool};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

/// Fixed-width RFC 3339 so that string comparison in SQL is chronological
pub fn db_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Outcome of inserting into a table guarded by a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

pub(crate) fn parse_uuid(value: String, idx: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_uuid(value: Option<String>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    value.map(|v| parse_uuid(v, idx)).transpose()
}

pub(crate) fn parse_time(value: String, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_time(
    value: Option<String>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_time(v, idx)).transpose()
}

/// True when the error is a PRIMARY KEY or UNIQUE violation
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_db_time_sorts_chronologically() {
        let whole = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let later = whole + chrono::Duration::milliseconds(1);
        assert!(db_time(whole) < db_time(later));
        assert_eq!(db_time(whole), "2025-03-01T10:00:00.000000Z");
    }

    #[test]
    fn test_parse_time_round_trip() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_time(db_time(at), 0).unwrap(), at);
    }
}
