// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to microseconds (Firestore timestamp precision).
pub fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// Timestamp for a write that follows `previous`.
///
/// Returns the current time, bumped to one microsecond past `previous` when the
/// clock has not advanced (or went backwards) since the last write.
pub fn next_write_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_micros();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
