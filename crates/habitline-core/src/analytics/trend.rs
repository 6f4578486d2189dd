//! Daily completion counts for trend charts.

use std::collections::HashMap;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::habit::CompletionEvent;
use crate::time::local_date;

/// A (date, count) pair in a completion time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u32,
}

/// Completions per local day over the trailing `window_days`, ending today.
///
/// The series is dense: days without completions appear with a zero count.
/// Events outside the window (including future-dated ones) are dropped.
pub fn completion_trend(
    events: &[CompletionEvent],
    window_days: u32,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<DailyCount> {
    if window_days == 0 {
        return Vec::new();
    }
    let today = local_date(now, offset);
    let Some(start) = today.checked_sub_days(Days::new(u64::from(window_days) - 1)) else {
        return Vec::new();
    };

    let mut counts: HashMap<NaiveDate, u32> = HashMap::new();
    for e in events {
        let day = local_date(e.completed_at, offset);
        if day >= start && day <= today {
            *counts.entry(day).or_default() += 1;
        }
    }

    start
        .iter_days()
        .take_while(|d| *d <= today)
        .map(|date| DailyCount {
            date,
            count: counts.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{offset_from_minutes, utc_offset};
    use chrono::TimeZone;

    fn ev(day: u32, hour: u32) -> CompletionEvent {
        CompletionEvent {
            habit_id: "h".into(),
            completed_at: Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap(),
            value: None,
        }
    }

    #[test]
    fn trend_is_dense_and_ordered() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let events = vec![ev(10, 8), ev(10, 9), ev(8, 7), ev(1, 7), ev(11, 7)];
        let trend = completion_trend(&events, 3, now, utc_offset());

        let counts: Vec<u32> = trend.iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![1, 0, 2]);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2025, 3, 8).unwrap());
        assert_eq!(trend[2].date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    }

    #[test]
    fn local_offset_moves_late_events_to_next_day() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        // 23:00 UTC on the 9th is the 10th at UTC+2.
        let events = vec![ev(9, 23)];
        let trend = completion_trend(&events, 2, now, offset_from_minutes(120));
        assert_eq!(trend[0].count, 0);
        assert_eq!(trend[1].count, 1);
    }

    #[test]
    fn zero_window_is_empty() {
        assert!(completion_trend(&[ev(1, 1)], 0, Utc::now(), utc_offset()).is_empty());
    }
}
