//! Habit domain types.
//!
//! A habit's kind decides which subsystem derives its state: duration
//! counters own [`Attempt`](crate::attempt::Attempt)s, fasting trackers own
//! [`FastingWindow`](crate::fasting::FastingWindow)s, and every kind may log
//! [`CompletionEvent`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-of-day bucket a habit is scheduled in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
    #[default]
    Anytime,
}

impl TimeOfDay {
    /// Every bucket in display order.
    pub const ALL: [TimeOfDay; 5] = [
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::Evening,
        TimeOfDay::Night,
        TimeOfDay::Anytime,
    ];

    /// Position in [`TimeOfDay::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
            TimeOfDay::Anytime => "anytime",
        }
    }

    /// Unknown tags fall into `Anytime`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => TimeOfDay::Morning,
            "afternoon" => TimeOfDay::Afternoon,
            "evening" => TimeOfDay::Evening,
            "night" => TimeOfDay::Night,
            _ => TimeOfDay::Anytime,
        }
    }
}

/// Kind-specific configuration of a habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HabitKind {
    /// Plain yes/no check-in once a day.
    DailyCheck,
    /// "Days without X", tracked through attempts.
    DurationCounter {
        /// Money saved per day abstained, if the user tracks it.
        #[serde(default)]
        cost_per_day: Option<f64>,
    },
    /// Intermittent fasting, tracked through fasting windows.
    FastingTracker { target_minutes: u32 },
    /// Counts accumulated over a day (glasses of water, pages read).
    NumericCounter {
        #[serde(default)]
        target: Option<f64>,
        #[serde(default)]
        unit: Option<String>,
    },
    /// A single measurement per day (weight, sleep hours).
    DailyMeasurement {
        #[serde(default)]
        target: Option<f64>,
        #[serde(default)]
        unit: Option<String>,
    },
}

impl HabitKind {
    pub fn name(&self) -> &'static str {
        match self {
            HabitKind::DailyCheck => "daily_check",
            HabitKind::DurationCounter { .. } => "duration_counter",
            HabitKind::FastingTracker { .. } => "fasting_tracker",
            HabitKind::NumericCounter { .. } => "numeric_counter",
            HabitKind::DailyMeasurement { .. } => "daily_measurement",
        }
    }

    /// Whether the habit is expected to be checked in every day.
    ///
    /// Duration counters track abstinence through attempts instead.
    pub fn expects_daily_checkin(&self) -> bool {
        !matches!(self, HabitKind::DurationCounter { .. })
    }
}

/// A tracked habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    /// XP granted per completion event.
    #[serde(default = "default_xp_reward")]
    pub xp_reward: u32,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: HabitKind,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_xp_reward() -> u32 {
    10
}

impl Habit {
    /// Create a habit with a fresh id and default category/reward.
    pub fn new(name: impl Into<String>, kind: HabitKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            category: default_category(),
            time_of_day: TimeOfDay::Anytime,
            xp_reward: default_xp_reward(),
            created_at,
            kind,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_time_of_day(mut self, time_of_day: TimeOfDay) -> Self {
        self.time_of_day = time_of_day;
        self
    }

    pub fn with_xp_reward(mut self, xp_reward: u32) -> Self {
        self.xp_reward = xp_reward;
        self
    }

    pub fn is_duration_counter(&self) -> bool {
        matches!(self.kind, HabitKind::DurationCounter { .. })
    }

    pub fn is_fasting_tracker(&self) -> bool {
        matches!(self.kind, HabitKind::FastingTracker { .. })
    }
}

/// One check-in. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub habit_id: String,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Percentage of `target` reached by `value`, clamped to 100.
///
/// A missing, zero, or negative target has no meaningful progress and
/// returns `None` so the bar is suppressed.
pub fn target_progress(value: f64, target: Option<f64>) -> Option<f64> {
    let target = target.filter(|t| t.is_finite() && *t > 0.0)?;
    Some((value.max(0.0) / target * 100.0).min(100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn habit_kind_serializes_as_tagged_union() {
        let habit = Habit::new(
            "Quit soda",
            HabitKind::DurationCounter {
                cost_per_day: Some(2.5),
            },
            Utc::now(),
        )
        .with_category("health");

        let json = serde_json::to_value(&habit).unwrap();
        assert_eq!(json["kind"], "duration_counter");
        assert_eq!(json["cost_per_day"], 2.5);

        let decoded: Habit = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, habit);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = serde_json::json!({
            "id": "h1",
            "name": "Stretch",
            "created_at": "2025-01-01T00:00:00Z",
            "kind": "daily_check"
        });
        let habit: Habit = serde_json::from_value(json).unwrap();
        assert_eq!(habit.category, "general");
        assert_eq!(habit.time_of_day, TimeOfDay::Anytime);
        assert_eq!(habit.xp_reward, 10);
    }

    #[test]
    fn time_of_day_index_matches_display_order() {
        for (i, t) in TimeOfDay::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn time_of_day_parse_falls_back_to_anytime() {
        assert_eq!(TimeOfDay::parse("Morning"), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::parse(" night "), TimeOfDay::Night);
        assert_eq!(TimeOfDay::parse("brunch"), TimeOfDay::Anytime);
    }

    #[test]
    fn target_progress_is_suppressed_without_target() {
        assert_eq!(target_progress(5.0, None), None);
        assert_eq!(target_progress(5.0, Some(0.0)), None);
        assert_eq!(target_progress(5.0, Some(10.0)), Some(50.0));
        assert_eq!(target_progress(25.0, Some(10.0)), Some(100.0));
    }
}
