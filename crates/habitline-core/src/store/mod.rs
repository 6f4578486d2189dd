//! Persistence of the raw event log.
//!
//! The engine only ever talks to an [`EventStore`]. Two implementations ship
//! with the crate: [`MemoryStore`] for tests and embedding, and
//! [`SqliteStore`] for on-disk use.

mod memory;
pub mod migrations;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::achievements::AchievementUnlock;
use crate::attempt::{Attempt, ResetPlan};
use crate::error::StoreError;
use crate::fasting::FastingWindow;
use crate::habit::{CompletionEvent, Habit};

/// Raw event storage.
///
/// Writes that close or transition a record only apply while the record is
/// still open; otherwise they fail with [`StoreError::Conflict`].
pub trait EventStore {
    // === Reads ===

    fn habits(&self) -> Result<Vec<Habit>, StoreError>;

    fn habit(&self, id: &str) -> Result<Option<Habit>, StoreError>;

    /// Windows of one habit, oldest first.
    fn fasting_windows(&self, habit_id: &str) -> Result<Vec<FastingWindow>, StoreError>;

    /// Attempts of one habit, oldest first.
    fn attempts(&self, habit_id: &str) -> Result<Vec<Attempt>, StoreError>;

    fn completions(&self, habit_id: &str) -> Result<Vec<CompletionEvent>, StoreError>;

    fn all_completions(&self) -> Result<Vec<CompletionEvent>, StoreError>;

    fn achievement_unlocks(&self, user_id: &str) -> Result<Vec<AchievementUnlock>, StoreError>;

    // === Writes ===

    /// Insert or replace a habit.
    fn save_habit(&mut self, habit: &Habit) -> Result<(), StoreError>;

    /// Persist a new habit together with its seed attempt, if any.
    ///
    /// The default implementation performs two writes; stores that can
    /// should do both atomically.
    fn create_habit(&mut self, habit: &Habit, seed: Option<&Attempt>) -> Result<(), StoreError> {
        self.save_habit(habit)?;
        if let Some(seed) = seed {
            self.create_attempt(&seed.habit_id, seed.start_date)?;
        }
        Ok(())
    }

    fn create_fasting_window(
        &mut self,
        habit_id: &str,
        start_time: DateTime<Utc>,
        target_minutes: u32,
    ) -> Result<FastingWindow, StoreError>;

    /// Record the eating transition of an open window.
    fn transition_fasting_window(
        &mut self,
        window_id: &str,
        eating_transition_time: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn close_fasting_window(
        &mut self,
        window_id: &str,
        end_time: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// End a window that never reached its eating phase.
    ///
    /// Sets the eating transition and the end to `at` in a single write.
    fn abandon_fasting_window(
        &mut self,
        window_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn close_attempt(
        &mut self,
        attempt_id: &str,
        end_date: DateTime<Utc>,
        days_lasted: i64,
        reason: Option<&str>,
    ) -> Result<(), StoreError>;

    fn create_attempt(
        &mut self,
        habit_id: &str,
        start_date: DateTime<Utc>,
    ) -> Result<Attempt, StoreError>;

    /// Close the current attempt and open its successor.
    ///
    /// Returns the attempt that was opened. The default implementation
    /// performs two writes; stores that can should do both atomically.
    fn reset_attempt(&mut self, plan: &ResetPlan) -> Result<Attempt, StoreError> {
        let closed = &plan.closed;
        self.close_attempt(
            &closed.id,
            closed.end_date.unwrap_or(plan.opened.start_date),
            closed.days_lasted.unwrap_or(0),
            closed.reset_reason.as_deref(),
        )?;
        self.create_attempt(&plan.opened.habit_id, plan.opened.start_date)
    }

    fn record_completion(
        &mut self,
        habit_id: &str,
        completed_at: DateTime<Utc>,
        value: Option<f64>,
    ) -> Result<CompletionEvent, StoreError>;

    /// Record an unlock. Returns `false` when it was already recorded.
    fn record_achievement_unlock(
        &mut self,
        user_id: &str,
        achievement_id: &str,
        unlocked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
