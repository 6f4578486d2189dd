//! # Habitline Core Library
//!
//! Temporal state and progression engine for a habit tracker. Every view the
//! app shows is recomputed from a raw event log: fasting windows, abstinence
//! attempts, completion check-ins and achievement unlocks. Nothing derived is
//! ever persisted.
//!
//! ## Architecture
//!
//! - **Fasting**: a guarded state machine over fasting windows
//!   (inactive, fasting, eating)
//! - **Attempts**: "days without X" counters with resets, longest streak and
//!   milestones
//! - **Progression**: XP and levels from completion events
//! - **Achievements**: static catalog evaluated against aggregate statistics
//! - **Analytics**: streaks, completion rates, trends and distributions
//! - **Storage**: SQLite event log and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`HabitEngine`]: Commands and derived views over an [`EventStore`]
//! - [`FastingMachine`]: Fasting window state machine
//! - [`AttemptTracker`]: Attempt bookkeeping for duration counters
//! - [`EngineConfig`]: Engine configuration management

pub mod achievements;
pub mod analytics;
pub mod attempt;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fasting;
pub mod habit;
pub mod progression;
pub mod snapshot;
pub mod store;
pub mod time;

pub use achievements::{
    AchievementDefinition, AchievementEvaluator, AchievementReport, AggregateStats, Rarity,
};
pub use attempt::{Attempt, AttemptStatus, AttemptTracker, MilestoneLadder};
pub use classifier::{HabitClassifier, HabitGrouping};
pub use config::EngineConfig;
pub use engine::{Dashboard, HabitEngine, RepairNeeded};
pub use error::{ConfigError, CoreError, IntegrityError, StoreError, ValidationError};
pub use events::Event;
pub use fasting::{
    FastingCommand, FastingHistory, FastingMachine, FastingMode, FastingStatus, FastingWindow,
};
pub use habit::{CompletionEvent, Habit, HabitKind, TimeOfDay};
pub use progression::{LevelCurve, LevelProgress};
pub use snapshot::{HabitSnapshot, SnapshotMode};
pub use store::{EventStore, MemoryStore, SqliteStore};
pub use time::Elapsed;
