//! Habit engine implementation.
//!
//! The engine holds no derived state. Every query re-reads the event log
//! through its [`EventStore`] and recomputes; every command reads, runs the
//! relevant guard, and issues the resulting writes.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = HabitEngine::new(SqliteStore::open()?, EngineConfig::load_or_default())?;
//! engine.create_habit(habit, Utc::now())?;
//! engine.start_fasting(&habit_id, Utc::now())?; // Some(Event) when applied
//! let dashboard = engine.dashboard(Utc::now())?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements::{
    default_catalog, AchievementDefinition, AchievementEvaluator, AchievementReport,
    AchievementUnlock, AggregateStats,
};
use crate::analytics::{self, CategoryShare, DailyCount, HabitRanking, TimeOfDayCount};
use crate::attempt::{seed_attempt, AttemptStatus, AttemptTracker, ReasonCount};
use crate::classifier::{HabitClassifier, HabitGrouping};
use crate::config::EngineConfig;
use crate::error::{IntegrityError, Result, StoreError, ValidationError};
use crate::events::Event;
use crate::fasting::{FastingCommand, FastingHistory, FastingMachine, FastingPlan, FastingStatus};
use crate::habit::{CompletionEvent, Habit, HabitKind};
use crate::progression::{level_up, LevelProgress, XpLedger};
use crate::snapshot::{build_snapshot, HabitRecords, HabitSnapshot, SnapshotConfig};
use crate::store::EventStore;
use crate::time;

/// A habit whose records need a repair before it can be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairNeeded {
    pub habit_id: String,
    pub message: String,
}

impl From<&IntegrityError> for RepairNeeded {
    fn from(err: &IntegrityError) -> Self {
        Self {
            habit_id: err.habit_id().to_string(),
            message: err.to_string(),
        }
    }
}

/// Everything the main screen shows, derived in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub snapshots: Vec<HabitSnapshot>,
    pub grouping: HabitGrouping,
    pub level: LevelProgress,
    pub achievements: AchievementReport,
    pub stats: AggregateStats,
    pub completion_trend: Vec<DailyCount>,
    pub time_of_day: Vec<TimeOfDayCount>,
    pub categories: Vec<CategoryShare>,
    pub top_habits: Vec<HabitRanking>,
    /// Habits left out of `snapshots` because of an integrity gap.
    pub repairs: Vec<RepairNeeded>,
}

/// State recomputed from the log for one read.
struct Derived {
    habits: Vec<Habit>,
    completions: Vec<CompletionEvent>,
    unlocks: Vec<AchievementUnlock>,
    snapshots: Vec<HabitSnapshot>,
    repairs: Vec<RepairNeeded>,
    progress: LevelProgress,
    stats: AggregateStats,
}

/// Habit engine over an event store.
pub struct HabitEngine<S: EventStore> {
    store: S,
    config: EngineConfig,
    evaluator: AchievementEvaluator,
}

impl<S: EventStore> HabitEngine<S> {
    /// Create an engine with the built-in achievement catalog.
    ///
    /// # Errors
    /// Returns an error if the configuration fails validation.
    pub fn new(store: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            evaluator: AchievementEvaluator::new(default_catalog()),
        })
    }

    pub fn with_catalog(mut self, catalog: Vec<AchievementDefinition>) -> Self {
        self.evaluator = AchievementEvaluator::new(catalog);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &AchievementEvaluator {
        &self.evaluator
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self, habit_id: &str, now: DateTime<Utc>) -> Result<HabitSnapshot> {
        let habit = self.require_habit(habit_id)?;
        let completions = self.store.completions(habit_id)?;
        let attempts = self.store.attempts(habit_id)?;
        let windows = self.store.fasting_windows(habit_id)?;
        let records = HabitRecords {
            completions: &completions,
            attempts: &attempts,
            fasting_windows: &windows,
        };
        let config = SnapshotConfig::from_config(&self.config)?;
        Ok(build_snapshot(&habit, &records, now, &config)?)
    }

    pub fn fasting_status(&self, habit_id: &str, now: DateTime<Utc>) -> Result<FastingStatus> {
        let habit = self.require_habit(habit_id)?;
        let target_minutes = fasting_target(&habit)?;
        let windows = self.store.fasting_windows(habit_id)?;
        Ok(FastingMachine::new(&windows).status(now, target_minutes))
    }

    pub fn fasting_history(&self, habit_id: &str) -> Result<FastingHistory> {
        let habit = self.require_habit(habit_id)?;
        fasting_target(&habit)?;
        let windows = self.store.fasting_windows(habit_id)?;
        Ok(FastingHistory::from_windows(&windows))
    }

    pub fn attempt_status(&self, habit_id: &str, now: DateTime<Utc>) -> Result<AttemptStatus> {
        let habit = self.require_habit(habit_id)?;
        let cost_per_day = counter_cost(&habit)?;
        let attempts = self.store.attempts(habit_id)?;
        let ladder = self.config.milestone_ladder()?;
        Ok(AttemptTracker::new(habit_id, &attempts).status(now, &ladder, cost_per_day)?)
    }

    /// Reset reasons of a duration counter, most frequent first.
    pub fn reset_reasons(&self, habit_id: &str) -> Result<Vec<ReasonCount>> {
        let habit = self.require_habit(habit_id)?;
        counter_cost(&habit)?;
        let attempts = self.store.attempts(habit_id)?;
        Ok(AttemptTracker::new(habit_id, &attempts).reset_reasons())
    }

    /// Current level from completions plus recorded achievement XP.
    pub fn level(&self) -> Result<LevelProgress> {
        let curve = self.config.level_curve()?;
        Ok(curve.progress(self.current_xp()?))
    }

    pub fn dashboard(&self, now: DateTime<Utc>) -> Result<Dashboard> {
        let derived = self.derive(now)?;
        let offset = self.config.offset();
        let achievements = self.evaluator.evaluate(&derived.stats, &derived.unlocks, now);
        let grouping =
            HabitClassifier::new(self.config.risk.min_completion_rate).classify(&derived.snapshots);

        tracing::debug!(
            habits = derived.habits.len(),
            snapshots = derived.snapshots.len(),
            repairs = derived.repairs.len(),
            "dashboard recomputed"
        );

        Ok(Dashboard {
            generated_at: now,
            completion_trend: analytics::completion_trend(
                &derived.completions,
                self.config.analytics.trend_window_days,
                now,
                offset,
            ),
            time_of_day: analytics::time_of_day_stats(&derived.habits, &derived.completions),
            categories: analytics::category_stats(&derived.habits),
            top_habits: analytics::top_habits(
                &derived.habits,
                &derived.completions,
                self.config.analytics.top_habits,
            ),
            snapshots: derived.snapshots,
            grouping,
            level: derived.progress,
            achievements,
            stats: derived.stats,
            repairs: derived.repairs,
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Register a habit. Duration counters get their first attempt.
    ///
    /// A fasting tracker with a zero target takes the configured default
    /// protocol. Saving a habit id that already exists is a no-op, except
    /// that a duration counter left without an open attempt gets one.
    pub fn create_habit(&mut self, mut habit: Habit, now: DateTime<Utc>) -> Result<Option<Event>> {
        if habit.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "habit name must not be empty".into(),
            }
            .into());
        }
        if let Some(existing) = self.store.habit(&habit.id)? {
            tracing::debug!(habit_id = %habit.id, "habit already exists");
            if existing.is_duration_counter() {
                return self.repair_missing_attempt(&existing.id, now);
            }
            return Ok(None);
        }
        if let HabitKind::FastingTracker { target_minutes } = &mut habit.kind {
            if *target_minutes == 0 {
                *target_minutes = self.config.default_protocol()?.target_minutes();
            }
        }

        let seed = habit
            .is_duration_counter()
            .then(|| seed_attempt(&habit.id, now));
        self.store.create_habit(&habit, seed.as_ref())?;
        tracing::info!(habit_id = %habit.id, kind = habit.kind.name(), "habit created");

        Ok(Some(Event::HabitCreated {
            habit_id: habit.id,
            kind: habit.kind.name().to_string(),
            at: now,
        }))
    }

    pub fn start_fasting(&mut self, habit_id: &str, now: DateTime<Utc>) -> Result<Option<Event>> {
        self.fasting_command(habit_id, FastingCommand::StartFasting, now)
    }

    pub fn start_eating(&mut self, habit_id: &str, now: DateTime<Utc>) -> Result<Option<Event>> {
        self.fasting_command(habit_id, FastingCommand::StartEating, now)
    }

    pub fn end_eating(&mut self, habit_id: &str, now: DateTime<Utc>) -> Result<Option<Event>> {
        self.fasting_command(habit_id, FastingCommand::EndEating, now)
    }

    /// End the fast without an eating phase.
    pub fn end_fast(&mut self, habit_id: &str, now: DateTime<Utc>) -> Result<Option<Event>> {
        self.fasting_command(habit_id, FastingCommand::EndFast, now)
    }

    fn fasting_command(
        &mut self,
        habit_id: &str,
        command: FastingCommand,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        let habit = self.require_habit(habit_id)?;
        let target_minutes = fasting_target(&habit)?;
        let windows = self.store.fasting_windows(habit_id)?;
        let machine = FastingMachine::new(&windows);
        let current = machine.current_window();

        let event = match machine.plan(command, target_minutes, now) {
            FastingPlan::Ignored { .. } => return Ok(None),
            FastingPlan::Open {
                start_time,
                target_minutes,
            } => {
                let window =
                    self.store
                        .create_fasting_window(habit_id, start_time, target_minutes)?;
                Event::FastingStarted {
                    habit_id: habit_id.to_string(),
                    window_id: window.id,
                    target_minutes,
                    at: start_time,
                }
            }
            FastingPlan::MarkEating { window_id, at } => {
                self.store.transition_fasting_window(&window_id, at)?;
                let fasting_minutes = current
                    .and_then(|w| time::elapsed(w.start_time, at))
                    .map(|e| e.total_minutes())
                    .unwrap_or(0);
                Event::EatingStarted {
                    habit_id: habit_id.to_string(),
                    window_id,
                    fasting_minutes,
                    at,
                }
            }
            FastingPlan::Close { window_id, at } => {
                self.store.close_fasting_window(&window_id, at)?;
                Event::FastingWindowClosed {
                    habit_id: habit_id.to_string(),
                    window_id,
                    fasting_minutes: current
                        .and_then(|w| w.fasting_duration_minutes())
                        .unwrap_or(0),
                    goal_met: current.is_some_and(|w| w.met_target()),
                    at,
                }
            }
            FastingPlan::Abandon { window_id, at } => {
                self.store.abandon_fasting_window(&window_id, at)?;
                Event::FastAbandoned {
                    habit_id: habit_id.to_string(),
                    window_id,
                    fasting_minutes: current
                        .and_then(|w| time::elapsed(w.start_time, at))
                        .map(|e| e.total_minutes())
                        .unwrap_or(0),
                    at,
                }
            }
        };

        tracing::info!(habit_id, ?command, "fasting transition applied");
        Ok(Some(event))
    }

    /// Close the current attempt and start a new one at `now`.
    pub fn reset_attempt(
        &mut self,
        habit_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        let habit = self.require_habit(habit_id)?;
        counter_cost(&habit)?;
        let attempts = self.store.attempts(habit_id)?;
        let plan = AttemptTracker::new(habit_id, &attempts).plan_reset(reason, now)?;
        let opened = self.store.reset_attempt(&plan)?;

        let days_lasted = plan.closed.days_lasted.unwrap_or(0);
        tracing::info!(habit_id, days_lasted, "attempt reset");

        Ok(Some(Event::AttemptReset {
            habit_id: habit_id.to_string(),
            closed_attempt_id: plan.closed.id,
            new_attempt_id: opened.id,
            days_lasted,
            longest_streak: plan.longest_streak,
            reason: plan.closed.reset_reason,
            at: now,
        }))
    }

    /// Seed a new attempt for a counter that has none open.
    ///
    /// No-op when an open attempt already exists.
    pub fn repair_missing_attempt(
        &mut self,
        habit_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        let habit = self.require_habit(habit_id)?;
        counter_cost(&habit)?;
        let attempts = self.store.attempts(habit_id)?;
        if attempts.iter().any(|a| a.is_open()) {
            return Ok(None);
        }

        let attempt = self.store.create_attempt(habit_id, now)?;
        tracing::info!(habit_id, attempt_id = %attempt.id, "missing attempt repaired");
        Ok(Some(Event::AttemptRepaired {
            habit_id: habit_id.to_string(),
            attempt_id: attempt.id,
            at: now,
        }))
    }

    /// Log a completion.
    ///
    /// Returns the completion event followed by any achievements it
    /// unlocked and, if the XP gain crossed a level boundary, a level-up.
    pub fn record_completion(
        &mut self,
        habit_id: &str,
        at: DateTime<Utc>,
        value: Option<f64>,
    ) -> Result<Vec<Event>> {
        let habit = self.require_habit(habit_id)?;
        if value.is_some_and(|v| !v.is_finite()) {
            return Err(ValidationError::InvalidValue {
                field: "value".into(),
                message: "completion value must be finite".into(),
            }
            .into());
        }
        let curve = self.config.level_curve()?;
        let xp_before = self.current_xp()?;

        self.store.record_completion(habit_id, at, value)?;
        let mut events = vec![Event::CompletionRecorded {
            habit_id: habit_id.to_string(),
            value,
            xp_awarded: habit.xp_reward,
            at,
        }];
        events.extend(self.sync_achievements(at)?);

        let xp_after = self.current_xp()?;
        if let Some(up) = level_up(&curve, xp_before, xp_after) {
            tracing::info!(from = up.from, to = up.to, "level up");
            events.push(Event::LevelUp {
                from: up.from,
                to: up.to,
                total_xp: xp_after,
                at,
            });
        }
        Ok(events)
    }

    /// Persist achievements whose requirements are now met.
    ///
    /// Already-recorded unlocks are never re-recorded or revoked. Unlock
    /// rewards feed the level, so evaluation repeats until a pass records
    /// nothing new.
    pub fn sync_achievements(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        loop {
            let derived = self.derive(now)?;
            let report = self.evaluator.evaluate(&derived.stats, &derived.unlocks, now);

            let mut recorded_any = false;
            for unlock in report.newly_unlocked {
                let recorded = self.store.record_achievement_unlock(
                    &self.config.user_id,
                    &unlock.achievement_id,
                    unlock.unlocked_at,
                )?;
                if !recorded {
                    continue;
                }
                recorded_any = true;
                if let Some(def) = self.evaluator.definition(&unlock.achievement_id) {
                    tracing::info!(achievement_id = %def.id, "achievement unlocked");
                    events.push(Event::AchievementUnlocked {
                        achievement_id: def.id.clone(),
                        name: def.name.clone(),
                        rarity: def.rarity,
                        xp_reward: def.xp_reward,
                        at: unlock.unlocked_at,
                    });
                }
            }
            // The catalog is finite and every pass records at least one unlock.
            if !recorded_any {
                return Ok(events);
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn require_habit(&self, habit_id: &str) -> Result<Habit> {
        self.store.habit(habit_id)?.ok_or_else(|| {
            StoreError::NotFound {
                kind: "habit",
                id: habit_id.to_string(),
            }
            .into()
        })
    }

    fn current_xp(&self) -> Result<u64> {
        let habits = self.store.habits()?;
        let completions = self.store.all_completions()?;
        let unlocks = self.store.achievement_unlocks(&self.config.user_id)?;
        Ok(self.total_xp(&habits, &completions, &unlocks))
    }

    fn total_xp(
        &self,
        habits: &[Habit],
        completions: &[CompletionEvent],
        unlocks: &[AchievementUnlock],
    ) -> u64 {
        XpLedger::new(habits, self.config.progression.default_xp_reward).total(completions)
            + self.evaluator.xp_from_unlocks(unlocks)
    }

    fn derive(&self, now: DateTime<Utc>) -> Result<Derived> {
        let snapshot_config = SnapshotConfig::from_config(&self.config)?;
        let curve = self.config.level_curve()?;
        let habits = self.store.habits()?;
        let completions = self.store.all_completions()?;
        let unlocks = self.store.achievement_unlocks(&self.config.user_id)?;

        let mut snapshots = Vec::with_capacity(habits.len());
        let mut histories = Vec::new();
        let mut repairs = Vec::new();
        for habit in &habits {
            let attempts = if habit.is_duration_counter() {
                self.store.attempts(&habit.id)?
            } else {
                Vec::new()
            };
            let windows = if habit.is_fasting_tracker() {
                self.store.fasting_windows(&habit.id)?
            } else {
                Vec::new()
            };
            if habit.is_fasting_tracker() {
                histories.push(FastingHistory::from_windows(&windows));
            }

            let records = HabitRecords {
                completions: &completions,
                attempts: &attempts,
                fasting_windows: &windows,
            };
            match build_snapshot(habit, &records, now, &snapshot_config) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(gap) => {
                    tracing::warn!(habit_id = %habit.id, error = %gap, "habit needs repair");
                    repairs.push(RepairNeeded::from(&gap));
                }
            }
        }

        let progress = curve.progress(self.total_xp(&habits, &completions, &unlocks));
        let perfect_days =
            analytics::perfect_days(&habits, &completions, now, snapshot_config.offset);
        let stats = AggregateStats::collect(&snapshots, &histories, &progress, perfect_days);

        Ok(Derived {
            habits,
            completions,
            unlocks,
            snapshots,
            repairs,
            progress,
            stats,
        })
    }
}

fn fasting_target(habit: &Habit) -> Result<u32> {
    match habit.kind {
        HabitKind::FastingTracker { target_minutes } => Ok(target_minutes),
        _ => Err(wrong_kind(habit, "fasting_tracker")),
    }
}

fn counter_cost(habit: &Habit) -> Result<Option<f64>> {
    match habit.kind {
        HabitKind::DurationCounter { cost_per_day } => Ok(cost_per_day),
        _ => Err(wrong_kind(habit, "duration_counter")),
    }
}

fn wrong_kind(habit: &Habit, expected: &'static str) -> crate::error::CoreError {
    ValidationError::WrongHabitKind {
        habit_id: habit.id.clone(),
        kind: habit.kind.name(),
        expected,
    }
    .into()
}
