//! Per-habit derived snapshots and the aggregate statistics built from them.
//!
//! A snapshot is never stored. It is rebuilt from the raw records every
//! time a view needs it, picking the subsystem that matches the habit kind.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements::{stat_keys, AggregateStats};
use crate::analytics::{self, Trend};
use crate::attempt::{Attempt, AttemptStatus, AttemptTracker, MilestoneLadder};
use crate::config::EngineConfig;
use crate::error::{ConfigError, IntegrityError};
use crate::fasting::{FastingHistory, FastingMachine, FastingStatus, FastingWindow};
use crate::habit::{target_progress, CompletionEvent, Habit, HabitKind, TimeOfDay};
use crate::progression::LevelProgress;
use crate::time::local_date;

/// Kind-specific part of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SnapshotMode {
    Check,
    Fasting {
        status: FastingStatus,
        history: FastingHistory,
    },
    Counter {
        status: AttemptStatus,
    },
    Numeric {
        /// Sum of today's values for counters, latest value for measurements.
        today_value: f64,
        target: Option<f64>,
        unit: Option<String>,
        /// `None` when there is no positive target.
        progress_percent: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitSnapshot {
    pub habit_id: String,
    pub name: String,
    pub kind: String,
    pub category: String,
    pub time_of_day: TimeOfDay,
    pub mode: SnapshotMode,
    /// Attempt days for counters, minutes in the current phase for fasting.
    pub elapsed_minutes_or_days: Option<i64>,
    pub streak: i64,
    pub longest_streak: i64,
    pub completion_rate: f64,
    pub trend: Trend,
    pub xp_reward: u32,
    pub total_completions: u32,
    pub completed_today: bool,
}

impl HabitSnapshot {
    pub fn is_duration_counter(&self) -> bool {
        matches!(self.mode, SnapshotMode::Counter { .. })
    }
}

/// Raw records of one habit.
#[derive(Debug, Clone, Copy, Default)]
pub struct HabitRecords<'a> {
    pub completions: &'a [CompletionEvent],
    pub attempts: &'a [Attempt],
    pub fasting_windows: &'a [FastingWindow],
}

/// The configuration a snapshot depends on, resolved once per read.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub offset: FixedOffset,
    pub completion_rate_window_days: u32,
    pub ladder: MilestoneLadder,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            offset: crate::time::utc_offset(),
            completion_rate_window_days: 30,
            ladder: MilestoneLadder::default(),
        }
    }
}

impl SnapshotConfig {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            offset: config.offset(),
            completion_rate_window_days: config.analytics.completion_rate_window_days,
            ladder: config.milestone_ladder()?,
        })
    }
}

/// Derive the snapshot of `habit` at `now`.
///
/// Fails only when a duration counter has no open attempt.
pub fn build_snapshot(
    habit: &Habit,
    records: &HabitRecords<'_>,
    now: DateTime<Utc>,
    config: &SnapshotConfig,
) -> Result<HabitSnapshot, IntegrityError> {
    let offset = config.offset;
    let today = local_date(now, offset);
    let created_on = local_date(habit.created_at, offset);
    let completions: Vec<&CompletionEvent> = records
        .completions
        .iter()
        .filter(|e| e.habit_id == habit.id)
        .collect();
    let mut days = analytics::completion_days(completions.iter().copied(), offset);
    let mut total_completions = completions.len() as u32;

    let (mode, elapsed, streak, longest_streak, completion_rate) = match &habit.kind {
        HabitKind::DurationCounter { cost_per_day } => {
            let tracker = AttemptTracker::new(&habit.id, records.attempts);
            let status = tracker.status(now, &config.ladder, *cost_per_day)?;
            let rate = abstinence_rate(
                records.attempts,
                config.completion_rate_window_days,
                created_on,
                today,
                offset,
            );
            let attempt_days = status.days;
            let longest = status.longest_streak.max(attempt_days);
            (
                SnapshotMode::Counter { status },
                Some(attempt_days),
                attempt_days,
                longest,
                rate,
            )
        }
        HabitKind::FastingTracker { target_minutes } => {
            let machine = FastingMachine::new(records.fasting_windows);
            let status = machine.status(now, *target_minutes);
            let history = FastingHistory::from_windows(records.fasting_windows);
            // A fast that reached its target counts as a completion on the
            // day it ended.
            let met: Vec<_> = machine
                .closed_windows()
                .filter(|w| w.met_target())
                .filter_map(|w| w.eating_transition_time)
                .collect();
            total_completions += met.len() as u32;
            days.extend(met.into_iter().map(|at| local_date(at, offset)));
            let elapsed = status.duration_minutes;
            (
                SnapshotMode::Fasting { status, history },
                elapsed,
                i64::from(analytics::current_streak(&days, today)),
                i64::from(analytics::longest_streak(&days)),
                analytics::completion_rate(
                    &days,
                    config.completion_rate_window_days,
                    created_on,
                    today,
                ),
            )
        }
        kind => {
            let mode = match kind {
                HabitKind::NumericCounter { target, unit } => {
                    let today_value = todays_events(&completions, today, offset)
                        .filter_map(|e| e.value)
                        .sum::<f64>();
                    numeric_mode(today_value, *target, unit.clone())
                }
                HabitKind::DailyMeasurement { target, unit } => {
                    let today_value = todays_events(&completions, today, offset)
                        .max_by_key(|e| e.completed_at)
                        .and_then(|e| e.value)
                        .unwrap_or(0.0);
                    numeric_mode(today_value, *target, unit.clone())
                }
                _ => SnapshotMode::Check,
            };
            (
                mode,
                None,
                i64::from(analytics::current_streak(&days, today)),
                i64::from(analytics::longest_streak(&days)),
                analytics::completion_rate(
                    &days,
                    config.completion_rate_window_days,
                    created_on,
                    today,
                ),
            )
        }
    };

    Ok(HabitSnapshot {
        habit_id: habit.id.clone(),
        name: habit.name.clone(),
        kind: habit.kind.name().to_string(),
        category: habit.category.clone(),
        time_of_day: habit.time_of_day,
        mode,
        elapsed_minutes_or_days: elapsed,
        streak,
        longest_streak,
        completion_rate,
        trend: analytics::trend(&days, today),
        xp_reward: habit.xp_reward,
        total_completions,
        completed_today: analytics::completed_on(&days, today),
    })
}

fn todays_events<'e>(
    completions: &'e [&'e CompletionEvent],
    today: NaiveDate,
    offset: FixedOffset,
) -> impl Iterator<Item = &'e CompletionEvent> + 'e {
    completions
        .iter()
        .copied()
        .filter(move |e| local_date(e.completed_at, offset) == today)
}

fn numeric_mode(today_value: f64, target: Option<f64>, unit: Option<String>) -> SnapshotMode {
    SnapshotMode::Numeric {
        today_value,
        target,
        unit,
        progress_percent: target_progress(today_value, target),
    }
}

/// Share of days in the window that did not end in a reset.
///
/// Duration counters never check in, so a day counts as kept unless an
/// attempt was closed on it.
fn abstinence_rate(
    attempts: &[Attempt],
    window_days: u32,
    created_on: NaiveDate,
    today: NaiveDate,
    offset: FixedOffset,
) -> f64 {
    let window_start = today
        .checked_sub_days(chrono::Days::new(u64::from(window_days.max(1)) - 1))
        .unwrap_or(NaiveDate::MIN);
    let start = window_start.max(created_on);
    if start > today {
        return 100.0;
    }
    let span = (today - start).num_days() + 1;
    let reset_days: BTreeSet<NaiveDate> = attempts
        .iter()
        .filter_map(|a| a.end_date)
        .map(|at| local_date(at, offset))
        .filter(|d| *d >= start && *d <= today)
        .collect();
    (span - reset_days.len() as i64).max(0) as f64 / span as f64 * 100.0
}

impl AggregateStats {
    /// Derive the statistics achievements are evaluated against.
    pub fn collect(
        snapshots: &[HabitSnapshot],
        fasting: &[FastingHistory],
        progress: &LevelProgress,
        perfect_days: u32,
    ) -> Self {
        let (counters, daily): (Vec<&HabitSnapshot>, Vec<&HabitSnapshot>) =
            snapshots.iter().partition(|s| s.is_duration_counter());
        let longest_fast_minutes = fasting.iter().filter_map(|h| h.best_minutes).max().unwrap_or(0);

        AggregateStats::new()
            .with(stat_keys::CURRENT_STREAK, max_of(&daily, |s| s.streak))
            .with(stat_keys::LONGEST_STREAK, max_of(&daily, |s| s.longest_streak))
            .with(
                stat_keys::TOTAL_COMPLETIONS,
                snapshots.iter().map(|s| f64::from(s.total_completions)).sum(),
            )
            .with(stat_keys::TOTAL_XP, progress.total_xp as f64)
            .with(stat_keys::LEVEL, progress.level as f64)
            .with(stat_keys::ACTIVE_HABITS, snapshots.len() as f64)
            .with(stat_keys::PERFECT_DAYS, f64::from(perfect_days))
            .with(
                stat_keys::FASTS_COMPLETED,
                fasting.iter().map(|h| f64::from(h.completed)).sum(),
            )
            .with(
                stat_keys::FASTING_GOALS_MET,
                fasting.iter().map(|h| f64::from(h.goals_met)).sum(),
            )
            .with(stat_keys::LONGEST_FAST_HOURS, longest_fast_minutes as f64 / 60.0)
            .with(stat_keys::CURRENT_ATTEMPT_DAYS, max_of(&counters, |s| s.streak))
            .with(
                stat_keys::LONGEST_ATTEMPT_DAYS,
                max_of(&counters, |s| s.longest_streak),
            )
    }
}

fn max_of(list: &[&HabitSnapshot], f: impl Fn(&HabitSnapshot) -> i64) -> f64 {
    list.iter().map(|s| f(s)).max().unwrap_or(0) as f64
}
