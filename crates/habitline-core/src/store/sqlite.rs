//! SQLite-backed event store.
//!
//! Timestamps are stored as RFC 3339 text. Rows that fail to decode are
//! reported as [`StoreError::Corrupt`] instead of being skipped.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{migrations, EventStore};
use crate::achievements::AchievementUnlock;
use crate::attempt::{Attempt, ResetPlan};
use crate::config::data_dir;
use crate::error::StoreError;
use crate::fasting::FastingWindow;
use crate::habit::{CompletionEvent, Habit, HabitKind, TimeOfDay};

const DB_FILE: &str = "habitline.db";

fn parse_ts(table: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table,
            message: format!("bad timestamp '{value}': {e}"),
        })
}

fn parse_opt_ts(
    table: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.map(|v| parse_ts(table, &v)).transpose()
}

type HabitRow = (String, String, String, String, i64, String, String);
type WindowRow = (String, String, String, Option<String>, Option<String>, i64);
type AttemptRow = (String, String, String, Option<String>, Option<i64>, Option<String>);

fn habit_from_row(row: HabitRow) -> Result<Habit, StoreError> {
    let (id, name, category, time_of_day, xp_reward, created_at, kind) = row;
    let kind: HabitKind = serde_json::from_str(&kind).map_err(|e| StoreError::Corrupt {
        table: "habits",
        message: format!("habit '{id}' has an unreadable kind: {e}"),
    })?;
    Ok(Habit {
        created_at: parse_ts("habits", &created_at)?,
        xp_reward: u32::try_from(xp_reward).map_err(|_| StoreError::Corrupt {
            table: "habits",
            message: format!("habit '{id}' has xp_reward {xp_reward}"),
        })?,
        time_of_day: TimeOfDay::parse(&time_of_day),
        id,
        name,
        category,
        kind,
    })
}

fn window_from_row(row: WindowRow) -> Result<FastingWindow, StoreError> {
    let (id, habit_id, start_time, eating, end, target) = row;
    Ok(FastingWindow {
        start_time: parse_ts("fasting_windows", &start_time)?,
        eating_transition_time: parse_opt_ts("fasting_windows", eating)?,
        end_time: parse_opt_ts("fasting_windows", end)?,
        target_minutes: u32::try_from(target).map_err(|_| StoreError::Corrupt {
            table: "fasting_windows",
            message: format!("window '{id}' has target {target}"),
        })?,
        id,
        habit_id,
    })
}

fn attempt_from_row(row: AttemptRow) -> Result<Attempt, StoreError> {
    let (id, habit_id, start_date, end_date, days_lasted, reset_reason) = row;
    Ok(Attempt {
        start_date: parse_ts("attempts", &start_date)?,
        end_date: parse_opt_ts("attempts", end_date)?,
        id,
        habit_id,
        days_lasted,
        reset_reason,
    })
}

/// SQLite database holding the event log.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/habitline/habitline.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open() -> crate::error::Result<Self> {
        let path = data_dir()?.join(DB_FILE);
        Ok(Self::open_path(&path)?)
    }

    pub fn open_path(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Run `f` inside `BEGIN IMMEDIATE`, committing on success.
    fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        match f(&self.conn) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT;")?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    /// Distinguish "no such row" from "row exists but is not open".
    fn missing_or_conflict(
        conn: &Connection,
        table: &'static str,
        kind: &'static str,
        id: &str,
        conflict: String,
    ) -> StoreError {
        let sql = format!("SELECT 1 FROM {table} WHERE id = ?1");
        match conn.query_row(&sql, params![id], |_| Ok(())).optional() {
            Ok(Some(())) => StoreError::Conflict(conflict),
            Ok(None) => StoreError::NotFound {
                kind,
                id: id.to_string(),
            },
            Err(e) => e.into(),
        }
    }

    fn save_habit_on(conn: &Connection, habit: &Habit) -> Result<(), StoreError> {
        let kind = serde_json::to_string(&habit.kind).map_err(|e| StoreError::Corrupt {
            table: "habits",
            message: e.to_string(),
        })?;
        conn.execute(
            "INSERT OR REPLACE INTO habits (id, name, category, time_of_day, xp_reward, created_at, kind)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                habit.id,
                habit.name,
                habit.category,
                habit.time_of_day.as_str(),
                habit.xp_reward,
                habit.created_at.to_rfc3339(),
                kind,
            ],
        )?;
        Ok(())
    }

    fn close_attempt_on(
        conn: &Connection,
        attempt_id: &str,
        end_date: DateTime<Utc>,
        days_lasted: i64,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        let changed = conn.execute(
            "UPDATE attempts SET end_date = ?2, days_lasted = ?3, reset_reason = ?4
             WHERE id = ?1 AND end_date IS NULL",
            params![attempt_id, end_date.to_rfc3339(), days_lasted, reason],
        )?;
        if changed == 0 {
            return Err(Self::missing_or_conflict(
                conn,
                "attempts",
                "attempt",
                attempt_id,
                format!("attempt '{attempt_id}' is already closed"),
            ));
        }
        Ok(())
    }

    fn insert_attempt_on(conn: &Connection, attempt: &Attempt) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO attempts (id, habit_id, start_date, end_date, days_lasted, reset_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                attempt.id,
                attempt.habit_id,
                attempt.start_date.to_rfc3339(),
                attempt.end_date.map(|d| d.to_rfc3339()),
                attempt.days_lasted,
                attempt.reset_reason,
            ],
        )?;
        Ok(())
    }

    /// Append a raw attempt, bypassing engine guards.
    pub fn insert_attempt(&self, attempt: &Attempt) -> Result<(), StoreError> {
        Self::insert_attempt_on(&self.conn, attempt)
    }
}

impl EventStore for SqliteStore {
    fn habits(&self) -> Result<Vec<Habit>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category, time_of_day, xp_reward, created_at, kind
             FROM habits ORDER BY created_at, name",
        )?;
        let rows = stmt.query_map([], |row| -> rusqlite::Result<HabitRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?;
        rows.map(|r| habit_from_row(r?)).collect()
    }

    fn habit(&self, id: &str) -> Result<Option<Habit>, StoreError> {
        let row: Option<HabitRow> = self
            .conn
            .query_row(
                "SELECT id, name, category, time_of_day, xp_reward, created_at, kind
                 FROM habits WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;
        row.map(habit_from_row).transpose()
    }

    fn fasting_windows(&self, habit_id: &str) -> Result<Vec<FastingWindow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, habit_id, start_time, eating_transition_time, end_time, target_minutes
             FROM fasting_windows WHERE habit_id = ?1 ORDER BY start_time",
        )?;
        let rows = stmt.query_map(params![habit_id], |row| -> rusqlite::Result<WindowRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?;
        rows.map(|r| window_from_row(r?)).collect()
    }

    fn attempts(&self, habit_id: &str) -> Result<Vec<Attempt>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, habit_id, start_date, end_date, days_lasted, reset_reason
             FROM attempts WHERE habit_id = ?1 ORDER BY start_date",
        )?;
        let rows = stmt.query_map(params![habit_id], |row| -> rusqlite::Result<AttemptRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?;
        rows.map(|r| attempt_from_row(r?)).collect()
    }

    fn completions(&self, habit_id: &str) -> Result<Vec<CompletionEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT habit_id, completed_at, value FROM completions
             WHERE habit_id = ?1 ORDER BY completed_at, id",
        )?;
        let rows = stmt.query_map(params![habit_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;
        rows.map(|r| {
            let (habit_id, completed_at, value) = r?;
            Ok(CompletionEvent {
                habit_id,
                completed_at: parse_ts("completions", &completed_at)?,
                value,
            })
        })
        .collect()
    }

    fn all_completions(&self) -> Result<Vec<CompletionEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT habit_id, completed_at, value FROM completions ORDER BY completed_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;
        rows.map(|r| {
            let (habit_id, completed_at, value) = r?;
            Ok(CompletionEvent {
                habit_id,
                completed_at: parse_ts("completions", &completed_at)?,
                value,
            })
        })
        .collect()
    }

    fn achievement_unlocks(&self, user_id: &str) -> Result<Vec<AchievementUnlock>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT achievement_id, unlocked_at FROM achievement_unlocks
             WHERE user_id = ?1 ORDER BY unlocked_at",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.map(|r| {
            let (achievement_id, unlocked_at) = r?;
            Ok(AchievementUnlock {
                achievement_id,
                unlocked_at: parse_ts("achievement_unlocks", &unlocked_at)?,
            })
        })
        .collect()
    }

    fn save_habit(&mut self, habit: &Habit) -> Result<(), StoreError> {
        Self::save_habit_on(&self.conn, habit)
    }

    /// Habit and seed attempt in one `BEGIN IMMEDIATE` transaction.
    fn create_habit(&mut self, habit: &Habit, seed: Option<&Attempt>) -> Result<(), StoreError> {
        self.in_transaction(|conn| {
            Self::save_habit_on(conn, habit)?;
            if let Some(seed) = seed {
                Self::insert_attempt_on(conn, seed)?;
            }
            Ok(())
        })
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
        self.conn.execute(
            "INSERT INTO fasting_windows (id, habit_id, start_time, target_minutes)
             VALUES (?1, ?2, ?3, ?4)",
            params![window.id, window.habit_id, start_time.to_rfc3339(), target_minutes],
        )?;
        Ok(window)
    }

    fn transition_fasting_window(
        &mut self,
        window_id: &str,
        eating_transition_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE fasting_windows SET eating_transition_time = ?2
             WHERE id = ?1 AND end_time IS NULL AND eating_transition_time IS NULL",
            params![window_id, eating_transition_time.to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(Self::missing_or_conflict(
                &self.conn,
                "fasting_windows",
                "fasting window",
                window_id,
                format!("fasting window '{window_id}' already left its fasting phase"),
            ));
        }
        Ok(())
    }

    fn close_fasting_window(
        &mut self,
        window_id: &str,
        end_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE fasting_windows SET end_time = ?2 WHERE id = ?1 AND end_time IS NULL",
            params![window_id, end_time.to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(Self::missing_or_conflict(
                &self.conn,
                "fasting_windows",
                "fasting window",
                window_id,
                format!("fasting window '{window_id}' is already closed"),
            ));
        }
        Ok(())
    }

    fn abandon_fasting_window(
        &mut self,
        window_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let at = at.to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE fasting_windows SET eating_transition_time = ?2, end_time = ?2
             WHERE id = ?1 AND end_time IS NULL AND eating_transition_time IS NULL",
            params![window_id, at],
        )?;
        if changed == 0 {
            return Err(Self::missing_or_conflict(
                &self.conn,
                "fasting_windows",
                "fasting window",
                window_id,
                format!("fasting window '{window_id}' already left its fasting phase"),
            ));
        }
        Ok(())
    }

    fn close_attempt(
        &mut self,
        attempt_id: &str,
        end_date: DateTime<Utc>,
        days_lasted: i64,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        Self::close_attempt_on(&self.conn, attempt_id, end_date, days_lasted, reason)
    }

    fn create_attempt(
        &mut self,
        habit_id: &str,
        start_date: DateTime<Utc>,
    ) -> Result<Attempt, StoreError> {
        let attempt = crate::attempt::seed_attempt(habit_id, start_date);
        Self::insert_attempt_on(&self.conn, &attempt)?;
        Ok(attempt)
    }

    /// Close and open in one `BEGIN IMMEDIATE` transaction.
    ///
    /// The close only matches while the attempt is still open, so of two
    /// racing resets exactly one commits and the other gets a conflict.
    fn reset_attempt(&mut self, plan: &ResetPlan) -> Result<Attempt, StoreError> {
        let closed = &plan.closed;
        let end_date = closed.end_date.unwrap_or(plan.opened.start_date);
        self.in_transaction(|conn| {
            Self::close_attempt_on(
                conn,
                &closed.id,
                end_date,
                closed.days_lasted.unwrap_or(0),
                closed.reset_reason.as_deref(),
            )?;
            Self::insert_attempt_on(conn, &plan.opened)?;
            Ok(plan.opened.clone())
        })
    }

    fn record_completion(
        &mut self,
        habit_id: &str,
        completed_at: DateTime<Utc>,
        value: Option<f64>,
    ) -> Result<CompletionEvent, StoreError> {
        self.conn.execute(
            "INSERT INTO completions (habit_id, completed_at, value) VALUES (?1, ?2, ?3)",
            params![habit_id, completed_at.to_rfc3339(), value],
        )?;
        Ok(CompletionEvent {
            habit_id: habit_id.to_string(),
            completed_at,
            value,
        })
    }

    fn record_achievement_unlock(
        &mut self,
        user_id: &str,
        achievement_id: &str,
        unlocked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO achievement_unlocks (user_id, achievement_id, unlocked_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, achievement_id, unlocked_at.to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::AttemptTracker;
    use chrono::{Duration, TimeZone};

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap()
    }

    #[test]
    fn habit_round_trips_with_kind() {
        let mut store = SqliteStore::open_memory().unwrap();
        let habit = Habit::new(
            "Water",
            HabitKind::NumericCounter {
                target: Some(8.0),
                unit: Some("glasses".into()),
            },
            jan(1),
        )
        .with_time_of_day(TimeOfDay::Morning)
        .with_xp_reward(15);
        store.save_habit(&habit).unwrap();

        assert_eq!(store.habit(&habit.id).unwrap(), Some(habit.clone()));
        assert_eq!(store.habits().unwrap(), vec![habit]);
        assert_eq!(store.habit("missing").unwrap(), None);
    }

    #[test]
    fn fasting_window_lifecycle() {
        let mut store = SqliteStore::open_memory().unwrap();
        let w = store.create_fasting_window("h1", jan(1), 960).unwrap();
        store
            .transition_fasting_window(&w.id, jan(1) + Duration::hours(17))
            .unwrap();
        assert!(matches!(
            store
                .transition_fasting_window(&w.id, jan(1) + Duration::hours(18))
                .unwrap_err(),
            StoreError::Conflict(_)
        ));
        store
            .close_fasting_window(&w.id, jan(2))
            .unwrap();

        let windows = store.fasting_windows("h1").unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].fasting_duration_minutes(), Some(17 * 60));
        assert!(!windows[0].is_open());
    }

    #[test]
    fn abandon_is_a_single_update() {
        let mut store = SqliteStore::open_memory().unwrap();
        let w = store.create_fasting_window("h1", jan(1), 960).unwrap();
        let at = jan(1) + Duration::hours(2);
        store.abandon_fasting_window(&w.id, at).unwrap();

        let windows = store.fasting_windows("h1").unwrap();
        assert_eq!(windows[0].eating_transition_time, Some(at));
        assert_eq!(windows[0].end_time, Some(at));
        assert!(matches!(
            store.abandon_fasting_window(&w.id, at).unwrap_err(),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            store.abandon_fasting_window("nope", at).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn create_habit_rolls_back_without_seed() {
        let mut store = SqliteStore::open_memory().unwrap();
        let habit = Habit::new(
            "Soda",
            HabitKind::DurationCounter { cost_per_day: None },
            jan(1),
        );
        let seed = crate::attempt::seed_attempt(&habit.id, jan(1));
        // Occupy the seed's id so its insert fails inside the transaction.
        store.insert_attempt(&seed).unwrap();

        assert!(store.create_habit(&habit, Some(&seed)).is_err());
        assert_eq!(store.habit(&habit.id).unwrap(), None);

        let fresh = crate::attempt::seed_attempt(&habit.id, jan(1));
        store.create_habit(&habit, Some(&fresh)).unwrap();
        assert!(store.habit(&habit.id).unwrap().is_some());
        assert_eq!(store.attempts(&habit.id).unwrap().len(), 2);
    }

    #[test]
    fn missing_window_is_not_found() {
        let mut store = SqliteStore::open_memory().unwrap();
        let err = store.close_fasting_window("nope", jan(1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn reset_is_atomic_and_single_winner() {
        let mut store = SqliteStore::open_memory().unwrap();
        store.create_attempt("h1", jan(1)).unwrap();
        let attempts = store.attempts("h1").unwrap();
        let plan = AttemptTracker::new("h1", &attempts)
            .plan_reset(Some("relapse"), jan(11))
            .unwrap();

        let opened = store.reset_attempt(&plan).unwrap();
        assert_eq!(opened.id, plan.opened.id);

        // A second reset computed from the same stale read must not commit.
        let stale = AttemptTracker::new("h1", &attempts)
            .plan_reset(None, jan(12))
            .unwrap();
        assert!(matches!(
            store.reset_attempt(&stale).unwrap_err(),
            StoreError::Conflict(_)
        ));

        let attempts = store.attempts("h1").unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts.iter().filter(|a| a.is_open()).count(), 1);
        assert_eq!(attempts[0].days_lasted, Some(10));
        assert_eq!(attempts[0].reset_reason.as_deref(), Some("relapse"));
    }

    #[test]
    fn completions_and_unlocks_persist() {
        let mut store = SqliteStore::open_memory().unwrap();
        store.record_completion("h1", jan(2), Some(3.0)).unwrap();
        store.record_completion("h1", jan(1), None).unwrap();
        store.record_completion("h2", jan(3), None).unwrap();

        let h1 = store.completions("h1").unwrap();
        assert_eq!(h1.len(), 2);
        assert_eq!(h1[0].completed_at, jan(1));
        assert_eq!(h1[1].value, Some(3.0));
        assert_eq!(store.all_completions().unwrap().len(), 3);

        assert!(store.record_achievement_unlock("u", "first_step", jan(2)).unwrap());
        assert!(!store.record_achievement_unlock("u", "first_step", jan(3)).unwrap());
        let unlocks = store.achievement_unlocks("u").unwrap();
        assert_eq!(unlocks.len(), 1);
        assert_eq!(unlocks[0].unlocked_at, jan(2));
    }

    #[test]
    fn corrupt_timestamp_is_reported() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO completions (habit_id, completed_at) VALUES ('h1', 'yesterday')",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.completions("h1").unwrap_err(),
            StoreError::Corrupt { table: "completions", .. }
        ));
    }
}
