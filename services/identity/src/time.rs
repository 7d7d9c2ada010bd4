//! Timestamp helpers.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time truncated to millisecond precision, the resolution records
/// are persisted with.
#[must_use]
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// RFC 3339 rendering with millisecond precision.
#[must_use]
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
