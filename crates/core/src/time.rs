//! Timestamp text format shared with SQLite.
//!
//! Rows are stamped in the same shape SQLite's `CURRENT_TIMESTAMP` produces
//! (`YYYY-MM-DD HH:MM:SS`, UTC) so that values written by this crate and
//! values filled in by column defaults compare lexicographically.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::DomainError;

const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp for storage.
pub fn to_storage(ts: DateTime<Utc>) -> String {
    ts.format(SQLITE_FORMAT).to_string()
}

/// Current time in storage format.
pub fn now_storage() -> String {
    to_storage(Utc::now())
}

/// Parse a stored timestamp.
///
/// Accepts the SQLite form (with or without fractional seconds) and RFC 3339.
pub fn from_storage(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in [SQLITE_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(DomainError::invalid_timestamp(raw.to_string()))
}

/// Day-first date used by the exchange sheets (`dd/mm/yyyy`).
pub fn to_display_date(ts: DateTime<Utc>) -> String {
    ts.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn storage_format_matches_sqlite_current_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(to_storage(ts), "2024-03-09 14:05:00");
        assert_eq!(from_storage("2024-03-09 14:05:00").unwrap(), ts);
    }

    #[test]
    fn accepts_rfc3339_and_fractional_seconds() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(from_storage("2024-03-09T14:05:00+00:00").unwrap(), ts);
        assert_eq!(from_storage("2024-03-09 14:05:00.000").unwrap(), ts);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            from_storage("yesterday"),
            Err(DomainError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn display_date_is_day_first() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(to_display_date(ts), "09/03/2024");
    }
}
