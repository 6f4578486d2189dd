//! In-memory event store.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::EventStore;
use crate::achievements::AchievementUnlock;
use crate::attempt::Attempt;
use crate::error::StoreError;
use crate::fasting::FastingWindow;
use crate::habit::{CompletionEvent, Habit};

/// Vec-backed store. Cloning it snapshots the whole log.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    habits: Vec<Habit>,
    windows: Vec<FastingWindow>,
    attempts: Vec<Attempt>,
    completions: Vec<CompletionEvent>,
    unlocks: Vec<(String, AchievementUnlock)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw attempt, bypassing engine guards.
    ///
    /// Used to load history and to reproduce damaged logs in tests.
    pub fn insert_attempt(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }

    /// Append a raw fasting window, bypassing engine guards.
    pub fn insert_fasting_window(&mut self, window: FastingWindow) {
        self.windows.push(window);
    }

    fn window_mut(&mut self, window_id: &str) -> Result<&mut FastingWindow, StoreError> {
        self.windows
            .iter_mut()
            .find(|w| w.id == window_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "fasting window",
                id: window_id.to_string(),
            })
    }
}

impl EventStore for MemoryStore {
    fn habits(&self) -> Result<Vec<Habit>, StoreError> {
        let mut habits = self.habits.clone();
        habits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(habits)
    }

    fn habit(&self, id: &str) -> Result<Option<Habit>, StoreError> {
        Ok(self.habits.iter().find(|h| h.id == id).cloned())
    }

    fn fasting_windows(&self, habit_id: &str) -> Result<Vec<FastingWindow>, StoreError> {
        let mut windows: Vec<FastingWindow> = self
            .windows
            .iter()
            .filter(|w| w.habit_id == habit_id)
            .cloned()
            .collect();
        windows.sort_by_key(|w| w.start_time);
        Ok(windows)
    }

    fn attempts(&self, habit_id: &str) -> Result<Vec<Attempt>, StoreError> {
        let mut attempts: Vec<Attempt> = self
            .attempts
            .iter()
            .filter(|a| a.habit_id == habit_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.start_date);
        Ok(attempts)
    }

    fn completions(&self, habit_id: &str) -> Result<Vec<CompletionEvent>, StoreError> {
        Ok(self
            .completions
            .iter()
            .filter(|e| e.habit_id == habit_id)
            .cloned()
            .collect())
    }

    fn all_completions(&self) -> Result<Vec<CompletionEvent>, StoreError> {
        Ok(self.completions.clone())
    }

    fn achievement_unlocks(&self, user_id: &str) -> Result<Vec<AchievementUnlock>, StoreError> {
        Ok(self
            .unlocks
            .iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, unlock)| unlock.clone())
            .collect())
    }

    fn save_habit(&mut self, habit: &Habit) -> Result<(), StoreError> {
        match self.habits.iter_mut().find(|h| h.id == habit.id) {
            Some(existing) => *existing = habit.clone(),
            None => self.habits.push(habit.clone()),
        }
        Ok(())
    }

    fn create_habit(&mut self, habit: &Habit, seed: Option<&Attempt>) -> Result<(), StoreError> {
        self.save_habit(habit)?;
        self.attempts.extend(seed.cloned());
        Ok(())
    }

    fn create_fasting_window(
        &mut self,
        habit_id: &str,
        start_time: DateTime<Utc>,
        target_minutes: u32,
    ) -> Result<FastingWindow, StoreError> {
        let window = FastingWindow {
            id: Uuid::new_v4().to_string(),
            habit_id: habit_id.to_string(),
            start_time,
            eating_transition_time: None,
            end_time: None,
            target_minutes,
        };
        self.windows.push(window.clone());
        Ok(window)
    }

    fn transition_fasting_window(
        &mut self,
        window_id: &str,
        eating_transition_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let window = self.window_mut(window_id)?;
        if window.end_time.is_some() || window.eating_transition_time.is_some() {
            return Err(StoreError::Conflict(format!(
                "fasting window '{window_id}' already left its fasting phase"
            )));
        }
        window.eating_transition_time = Some(eating_transition_time);
        Ok(())
    }

    fn close_fasting_window(
        &mut self,
        window_id: &str,
        end_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let window = self.window_mut(window_id)?;
        if window.end_time.is_some() {
            return Err(StoreError::Conflict(format!(
                "fasting window '{window_id}' is already closed"
            )));
        }
        window.end_time = Some(end_time);
        Ok(())
    }

    fn abandon_fasting_window(
        &mut self,
        window_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let window = self.window_mut(window_id)?;
        if window.end_time.is_some() || window.eating_transition_time.is_some() {
            return Err(StoreError::Conflict(format!(
                "fasting window '{window_id}' already left its fasting phase"
            )));
        }
        window.eating_transition_time = Some(at);
        window.end_time = Some(at);
        Ok(())
    }

    fn close_attempt(
        &mut self,
        attempt_id: &str,
        end_date: DateTime<Utc>,
        days_lasted: i64,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        let attempt = self
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "attempt",
                id: attempt_id.to_string(),
            })?;
        if attempt.end_date.is_some() {
            return Err(StoreError::Conflict(format!(
                "attempt '{attempt_id}' is already closed"
            )));
        }
        attempt.end_date = Some(end_date);
        attempt.days_lasted = Some(days_lasted);
        attempt.reset_reason = reason.map(str::to_string);
        Ok(())
    }

    fn create_attempt(
        &mut self,
        habit_id: &str,
        start_date: DateTime<Utc>,
    ) -> Result<Attempt, StoreError> {
        let attempt = crate::attempt::seed_attempt(habit_id, start_date);
        self.attempts.push(attempt.clone());
        Ok(attempt)
    }

    fn record_completion(
        &mut self,
        habit_id: &str,
        completed_at: DateTime<Utc>,
        value: Option<f64>,
    ) -> Result<CompletionEvent, StoreError> {
        let event = CompletionEvent {
            habit_id: habit_id.to_string(),
            completed_at,
            value,
        };
        self.completions.push(event.clone());
        Ok(event)
    }

    fn record_achievement_unlock(
        &mut self,
        user_id: &str,
        achievement_id: &str,
        unlocked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let exists = self
            .unlocks
            .iter()
            .any(|(user, u)| user == user_id && u.achievement_id == achievement_id);
        if exists {
            return Ok(false);
        }
        self.unlocks.push((
            user_id.to_string(),
            AchievementUnlock {
                achievement_id: achievement_id.to_string(),
                unlocked_at,
            },
        ));
        Ok(true)
    }
}
