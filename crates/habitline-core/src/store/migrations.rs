//! Database schema migrations for habitline.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(from = current_version, to = SCHEMA_VERSION, "migrated habitline schema");
    }
    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: the event log tables.
///
/// Habit kinds are stored as their tagged JSON form so new kinds do not
/// need a schema change.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS habits (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            category    TEXT NOT NULL DEFAULT 'general',
            time_of_day TEXT NOT NULL DEFAULT 'anytime',
            xp_reward   INTEGER NOT NULL DEFAULT 10,
            created_at  TEXT NOT NULL,
            kind        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS fasting_windows (
            id                     TEXT PRIMARY KEY,
            habit_id               TEXT NOT NULL,
            start_time             TEXT NOT NULL,
            eating_transition_time TEXT,
            end_time               TEXT,
            target_minutes         INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS attempts (
            id           TEXT PRIMARY KEY,
            habit_id     TEXT NOT NULL,
            start_date   TEXT NOT NULL,
            end_date     TEXT,
            days_lasted  INTEGER,
            reset_reason TEXT
        );

        CREATE TABLE IF NOT EXISTS completions (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            habit_id     TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            value        REAL
        );

        CREATE TABLE IF NOT EXISTS achievement_unlocks (
            user_id        TEXT NOT NULL,
            achievement_id TEXT NOT NULL,
            unlocked_at    TEXT NOT NULL,
            PRIMARY KEY (user_id, achievement_id)
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: indexes for per-habit reads.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_fasting_windows_habit ON fasting_windows(habit_id, start_time);
         CREATE INDEX IF NOT EXISTS idx_attempts_habit ON attempts(habit_id, start_date);
         CREATE INDEX IF NOT EXISTS idx_completions_habit ON completions(habit_id, completed_at);
         CREATE INDEX IF NOT EXISTS idx_completions_completed_at ON completions(completed_at);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'attempts'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }
}
