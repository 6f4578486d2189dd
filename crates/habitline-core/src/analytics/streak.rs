//! Per-habit streak, completion-rate and trend helpers.
//!
//! All of these work on local calendar days: a habit is "completed" on a
//! day when at least one event falls inside it.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::habit::{CompletionEvent, Habit};
use crate::time::local_date;

/// Length of each half of the trend comparison.
pub const TREND_PERIOD_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

/// Distinct local days with at least one completion.
pub fn completion_days<'a, I>(events: I, offset: FixedOffset) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = &'a CompletionEvent>,
{
    events
        .into_iter()
        .map(|e| local_date(e.completed_at, offset))
        .collect()
}

pub fn completed_on(days: &BTreeSet<NaiveDate>, day: NaiveDate) -> bool {
    days.contains(&day)
}

/// Consecutive completed days ending today.
///
/// Today not being completed yet does not break the streak; it is counted
/// from yesterday until the day is over.
pub fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(d) => d,
            None => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        match cursor.pred_opt() {
            Some(d) => cursor = d,
            None => break,
        }
    }
    streak
}

/// Longest run of consecutive completed days.
pub fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for &day in days {
        run = match prev {
            Some(p) if p.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(day);
    }
    best
}

/// Share of eligible days in the trailing window that were completed.
///
/// The window never reaches back before the habit existed. Today only
/// counts as eligible once it is completed, so an unfinished today does not
/// drag the rate down. With no eligible day yet, nothing has been missed and
/// the rate is 100.
pub fn completion_rate(
    days: &BTreeSet<NaiveDate>,
    window_days: u32,
    created_on: NaiveDate,
    today: NaiveDate,
) -> f64 {
    if window_days == 0 {
        return 100.0;
    }
    let window_start = today
        .checked_sub_days(Days::new(u64::from(window_days) - 1))
        .unwrap_or(NaiveDate::MIN);
    let start = window_start.max(created_on);
    if start > today {
        return 100.0;
    }

    let completed_today = days.contains(&today);
    let span = (today - start).num_days() + 1;
    let eligible = if completed_today { span } else { span - 1 };
    if eligible <= 0 {
        return 100.0;
    }
    let completed = days.range(start..=today).count() as i64;
    completed as f64 / eligible as f64 * 100.0
}

/// Compare the last [`TREND_PERIOD_DAYS`] with the period before it.
pub fn trend(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> Trend {
    let count_between = |from: NaiveDate, to: NaiveDate| days.range(from..=to).count();

    let recent_start = today
        .checked_sub_days(Days::new(TREND_PERIOD_DAYS - 1))
        .unwrap_or(NaiveDate::MIN);
    let Some(previous_end) = recent_start.pred_opt() else {
        return Trend::Stable;
    };
    let previous_start = previous_end
        .checked_sub_days(Days::new(TREND_PERIOD_DAYS - 1))
        .unwrap_or(NaiveDate::MIN);

    let recent = count_between(recent_start, today);
    let previous = count_between(previous_start, previous_end);
    match recent.cmp(&previous) {
        std::cmp::Ordering::Greater => Trend::Up,
        std::cmp::Ordering::Less => Trend::Down,
        std::cmp::Ordering::Equal => Trend::Stable,
    }
}

/// Days on which every daily habit that existed was completed.
///
/// Only days with at least one completion, up to and including today, are
/// considered. Duration counters are excluded since they never check in.
pub fn perfect_days(
    habits: &[Habit],
    events: &[CompletionEvent],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> u32 {
    let today = local_date(now, offset);
    let daily: Vec<(&Habit, BTreeSet<NaiveDate>)> = habits
        .iter()
        .filter(|h| h.kind.expects_daily_checkin())
        .map(|h| {
            let days = completion_days(events.iter().filter(|e| e.habit_id == h.id), offset);
            (h, days)
        })
        .collect();
    if daily.is_empty() {
        return 0;
    }

    let candidates: BTreeSet<NaiveDate> = daily
        .iter()
        .flat_map(|(_, days)| days.iter().copied())
        .filter(|d| *d <= today)
        .collect();

    candidates
        .into_iter()
        .filter(|day| {
            daily
                .iter()
                .filter(|(h, _)| local_date(h.created_at, offset) <= *day)
                .all(|(_, days)| days.contains(day))
        })
        .count() as u32
}
