//! Elapsed-time arithmetic.
//!
//! Every derived duration in the engine goes through [`elapsed`]. Invalid
//! input (unparseable timestamps, `now` before `start`) yields `None`, which
//! callers treat as "don't render this value".

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_HOUR: i64 = 60;
pub const MINUTES_PER_DAY: i64 = 1440;

/// A non-negative duration decomposed into days, hours and minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elapsed {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl Elapsed {
    /// Decompose a whole-minute count.
    pub fn from_minutes(total_minutes: i64) -> Self {
        Self {
            days: total_minutes / MINUTES_PER_DAY,
            hours: (total_minutes / MINUTES_PER_HOUR) % 24,
            minutes: total_minutes % MINUTES_PER_HOUR,
        }
    }

    pub fn total_minutes(&self) -> i64 {
        self.days * MINUTES_PER_DAY + self.hours * MINUTES_PER_HOUR + self.minutes
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_elapsed(self.days, self.hours, self.minutes))
    }
}

/// Whole minutes between `start` and `now`, decomposed.
///
/// Returns `None` when `now` precedes `start`.
pub fn elapsed(start: DateTime<Utc>, now: DateTime<Utc>) -> Option<Elapsed> {
    if now < start {
        return None;
    }
    // num_minutes truncates toward zero, which is floor for a non-negative span.
    Some(Elapsed::from_minutes((now - start).num_minutes()))
}

/// [`elapsed`] over textual timestamps.
///
/// Returns `None` if either side fails to parse.
pub fn elapsed_iso(start_iso: &str, now_iso: &str) -> Option<Elapsed> {
    let start = parse_instant(start_iso)?;
    let now = parse_instant(now_iso)?;
    elapsed(start, now)
}

/// Render a decomposed duration, dropping leading zero units.
///
/// `2d 3h 15m`, `3h 15m`, `15m`.
pub fn format_elapsed(days: i64, hours: i64, minutes: i64) -> String {
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Whole days between two instants, `None` when `now < start`.
pub fn whole_days(start: DateTime<Utc>, now: DateTime<Utc>) -> Option<i64> {
    elapsed(start, now).map(|e| e.days)
}

/// Calendar date of `instant` in the user's local offset.
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Build a fixed offset from minutes east of UTC, falling back to UTC when
/// the value is out of range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(utc_offset)
}

pub fn utc_offset() -> FixedOffset {
    Utc.fix()
}
