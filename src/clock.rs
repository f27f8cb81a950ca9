//! Wall-clock helpers
//!
//! Points are stamped with epoch milliseconds; the query side speaks
//! RFC 3339. These helpers convert between the two.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current wall-clock time as epoch milliseconds.
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format epoch milliseconds as an RFC 3339 UTC timestamp with millisecond
/// precision, e.g. `1970-01-01T00:00:00.000Z`.
///
/// Values outside chrono's representable range clamp to its bounds.
pub fn to_rfc3339_millis(millis: i64) -> String {
    let dt = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(if millis < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    });
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp (as returned in the `_time` column) into
/// epoch milliseconds.
pub fn parse_rfc3339_millis(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}
