//! Timestamp encodings used on the wire.

use chrono::{DateTime, SecondsFormat, Utc};

/// ISO-8601 string with millisecond precision and a `Z` suffix,
/// e.g. `2015-05-23T22:52:05.000Z`.
pub fn timestamp_string(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis(date: &DateTime<Utc>) -> i64 {
    date.timestamp_millis()
}
