//! Attempt lifecycle for duration-counter habits.
//!
//! A duration counter always has exactly one open attempt. Resetting closes
//! it and opens the next one at the same instant; the store is responsible
//! for doing both writes atomically.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::milestone::{money_saved, MilestoneLadder, MilestoneProgress};
use crate::error::{IntegrityError, Result, ValidationError};
use crate::time::{self, Elapsed};

/// One continuous streak interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub habit_id: String,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub days_lasted: Option<i64>,
    #[serde(default)]
    pub reset_reason: Option<String>,
}

impl Attempt {
    pub fn is_open(&self) -> bool {
        self.end_date.is_none()
    }
}

/// The attempt created when a duration counter is created or repaired.
pub fn seed_attempt(habit_id: &str, now: DateTime<Utc>) -> Attempt {
    Attempt {
        id: Uuid::new_v4().to_string(),
        habit_id: habit_id.to_string(),
        start_date: now,
        end_date: None,
        days_lasted: None,
        reset_reason: None,
    }
}

/// Writes produced by a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetPlan {
    /// The previously open attempt, with its closing fields filled in.
    pub closed: Attempt,
    /// The attempt that starts at the reset instant.
    pub opened: Attempt,
    /// Longest closed streak, counting the one just closed.
    pub longest_streak: i64,
}

/// Display state for the open attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptStatus {
    pub attempt_id: String,
    pub started_at: DateTime<Utc>,
    /// `None` when the clock reads earlier than the attempt start.
    pub elapsed: Option<Elapsed>,
    pub days: i64,
    pub longest_streak: i64,
    /// The running attempt has outlasted every closed one.
    pub is_personal_best: bool,
    pub milestone: MilestoneProgress,
    pub money_saved: Option<u64>,
    pub resets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Stateless view over one habit's attempts.
#[derive(Debug, Clone, Copy)]
pub struct AttemptTracker<'a> {
    habit_id: &'a str,
    attempts: &'a [Attempt],
}

impl<'a> AttemptTracker<'a> {
    pub fn new(habit_id: &'a str, attempts: &'a [Attempt]) -> Self {
        Self { habit_id, attempts }
    }

    /// The open attempt.
    ///
    /// A missing open attempt is a data-integrity gap and is surfaced rather
    /// than papered over with a fabricated one.
    pub fn current(&self) -> Result<&'a Attempt, IntegrityError> {
        let mut open = self.attempts.iter().filter(|a| a.is_open());
        let Some(first) = open.next() else {
            tracing::warn!(habit_id = %self.habit_id, "duration counter has no open attempt");
            return Err(IntegrityError::MissingOpenAttempt {
                habit_id: self.habit_id.to_string(),
            });
        };

        let mut latest = first;
        let mut count = 1;
        for a in open {
            count += 1;
            if a.start_date > latest.start_date {
                latest = a;
            }
        }
        if count > 1 {
            tracing::warn!(
                habit_id = %self.habit_id,
                open_attempts = count,
                "multiple open attempts; using the most recent"
            );
        }
        Ok(latest)
    }

    /// Longest `days_lasted` over closed attempts, 0 when none are closed.
    pub fn longest_streak(&self) -> i64 {
        self.attempts
            .iter()
            .filter_map(|a| a.days_lasted)
            .max()
            .unwrap_or(0)
    }

    /// Number of closed attempts.
    pub fn reset_count(&self) -> usize {
        self.attempts.iter().filter(|a| !a.is_open()).count()
    }

    /// Close the open attempt at `now` and open its successor.
    pub fn plan_reset(&self, reason: Option<&str>, now: DateTime<Utc>) -> Result<ResetPlan> {
        let current = self.current()?;
        let lasted = time::elapsed(current.start_date, now).ok_or(
            ValidationError::InvalidTimeRange {
                start: current.start_date,
                end: now,
            },
        )?;

        let closed = Attempt {
            end_date: Some(now),
            days_lasted: Some(lasted.days),
            reset_reason: reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            ..current.clone()
        };
        let opened = seed_attempt(self.habit_id, now);
        let longest_streak = self.longest_streak().max(lasted.days);

        Ok(ResetPlan {
            closed,
            opened,
            longest_streak,
        })
    }

    pub fn status(
        &self,
        now: DateTime<Utc>,
        ladder: &MilestoneLadder,
        cost_per_day: Option<f64>,
    ) -> Result<AttemptStatus, IntegrityError> {
        let current = self.current()?;
        let elapsed = time::elapsed(current.start_date, now);
        let days = elapsed.map(|e| e.days).unwrap_or(0);
        let longest_streak = self.longest_streak();

        Ok(AttemptStatus {
            attempt_id: current.id.clone(),
            started_at: current.start_date,
            elapsed,
            days,
            longest_streak,
            is_personal_best: days > longest_streak,
            milestone: ladder.progress(days),
            money_saved: money_saved(days, cost_per_day),
            resets: self.reset_count(),
        })
    }

    /// Reset reasons by frequency, most common first; ties alphabetical.
    pub fn reset_reasons(&self) -> Vec<ReasonCount> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for reason in self.attempts.iter().filter_map(|a| a.reset_reason.as_deref()) {
            *counts.entry(reason).or_default() += 1;
        }
        let mut out: Vec<ReasonCount> = counts
            .into_iter()
            .map(|(reason, count)| ReasonCount {
                reason: reason.to_string(),
                count,
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
        out
    }
}

/// Apply a reset plan to an in-memory attempt list.
pub fn apply_reset(attempts: &mut Vec<Attempt>, plan: &ResetPlan) {
    if let Some(a) = attempts.iter_mut().find(|a| a.id == plan.closed.id) {
        *a = plan.closed.clone();
    }
    attempts.push(plan.opened.clone());
}
