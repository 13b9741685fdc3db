//! Time zone parsing and conversion helpers.
//!
//! What this module provides:
//! - [`parse_ts_to_utc`]: Parse RFC-3339 timestamps with an explicit offset and convert to UTC.
//! - [`localize`]: Resolve a naive local timestamp in a zone, DST edges included.
//! - [`to_rfc3339_millis`]: The canonical storage format for timestamps.
//!
//! Notes:
//! - Ambiguous local times happen during “fall back” when a wall time occurs twice.
//!   They map to the first occurrence.
//! - Nonexistent local times happen during “spring forward” when a wall time is skipped.
//!   They are pushed forward to the first valid minute, so calendar offsets land on
//!   the intended wall-clock time even across transitions.
//! - All database writes are RFC-3339 UTC strings with millisecond precision, so
//!   lexicographic order on the column equals chronological order.
//!
//! Examples
//! - RFC-3339 with offset to UTC:
//!   "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
//! - New York “fall back” ambiguity (2024-11-03 01:30 occurs twice): 05:30Z.
//! - New York “spring forward” gap (2024-03-10 02:30 is skipped): 07:00Z.

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc, offset::LocalResult};
use chrono_tz::Tz;

/// Longest DST gap searched past a nonexistent wall time, in minutes.
const MAX_GAP_MINUTES: usize = 120;

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Local wall time with no instant within [`MAX_GAP_MINUTES`] after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("nonexistent local time {0}")]
pub struct NonexistentLocalTime(pub NaiveDateTime);

/// Resolve a naive local timestamp in `tz`.
///
/// Behavior:
/// - A local time that maps to a single instant is returned as is.
/// - Ambiguous (fall-back): the earlier instant.
/// - Nonexistent (spring-forward): step forward minute by minute (max 2 hours)
///   to the first valid instant.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>, NonexistentLocalTime> {
    let mut t = naive;
    for _ in 0..=MAX_GAP_MINUTES {
        match tz.from_local_datetime(&t) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => return Ok(dt),
            LocalResult::None => t += Duration::minutes(1),
        }
    }
    Err(NonexistentLocalTime(naive))
}
