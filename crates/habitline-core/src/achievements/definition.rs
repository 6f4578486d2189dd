//! Achievement definitions and the statistics they are tested against.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known aggregate statistic keys.
pub mod stat_keys {
    pub const CURRENT_STREAK: &str = "current_streak";
    pub const LONGEST_STREAK: &str = "longest_streak";
    pub const TOTAL_COMPLETIONS: &str = "total_completions";
    pub const TOTAL_XP: &str = "total_xp";
    pub const LEVEL: &str = "level";
    pub const ACTIVE_HABITS: &str = "active_habits";
    pub const PERFECT_DAYS: &str = "perfect_days";
    pub const FASTS_COMPLETED: &str = "fasts_completed";
    pub const FASTING_GOALS_MET: &str = "fasting_goals_met";
    pub const LONGEST_FAST_HOURS: &str = "longest_fast_hours";
    pub const CURRENT_ATTEMPT_DAYS: &str = "current_attempt_days";
    pub const LONGEST_ATTEMPT_DAYS: &str = "longest_attempt_days";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// `stats[stat_key] >= value` unlocks the achievement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub stat_key: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rarity: Rarity,
    pub requirement: Requirement,
    pub xp_reward: u32,
}

/// Record of the first time an achievement was earned. Never revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementUnlock {
    pub achievement_id: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Aggregate user statistics keyed by stat name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateStats(BTreeMap<String, f64>);

impl AggregateStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for AggregateStats {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
