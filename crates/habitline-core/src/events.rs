use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements::Rarity;

/// Every state change in the engine produces an Event.
/// The UI refreshes its derived views when it sees one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    HabitCreated {
        habit_id: String,
        kind: String,
        at: DateTime<Utc>,
    },
    /// A fasting window was opened.
    FastingStarted {
        habit_id: String,
        window_id: String,
        target_minutes: u32,
        at: DateTime<Utc>,
    },
    /// The open window moved into its eating phase.
    EatingStarted {
        habit_id: String,
        window_id: String,
        fasting_minutes: i64,
        at: DateTime<Utc>,
    },
    /// A full fast/eat cycle finished.
    FastingWindowClosed {
        habit_id: String,
        window_id: String,
        fasting_minutes: i64,
        goal_met: bool,
        at: DateTime<Utc>,
    },
    /// The fast was ended without an eating phase.
    FastAbandoned {
        habit_id: String,
        window_id: String,
        fasting_minutes: i64,
        at: DateTime<Utc>,
    },
    AttemptReset {
        habit_id: String,
        closed_attempt_id: String,
        new_attempt_id: String,
        days_lasted: i64,
        longest_streak: i64,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
    /// A seed attempt was created for a counter that had none open.
    AttemptRepaired {
        habit_id: String,
        attempt_id: String,
        at: DateTime<Utc>,
    },
    CompletionRecorded {
        habit_id: String,
        value: Option<f64>,
        xp_awarded: u32,
        at: DateTime<Utc>,
    },
    LevelUp {
        from: u64,
        to: u64,
        total_xp: u64,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        achievement_id: String,
        name: String,
        rarity: Rarity,
        xp_reward: u32,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Habit the event concerns, if it concerns one.
    pub fn habit_id(&self) -> Option<&str> {
        match self {
            Event::HabitCreated { habit_id, .. }
            | Event::FastingStarted { habit_id, .. }
            | Event::EatingStarted { habit_id, .. }
            | Event::FastingWindowClosed { habit_id, .. }
            | Event::FastAbandoned { habit_id, .. }
            | Event::AttemptReset { habit_id, .. }
            | Event::AttemptRepaired { habit_id, .. }
            | Event::CompletionRecorded { habit_id, .. } => Some(habit_id),
            Event::LevelUp { .. } | Event::AchievementUnlocked { .. } => None,
        }
    }
}
