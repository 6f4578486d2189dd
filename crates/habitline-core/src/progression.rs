//! XP totals and the linear level curve.
//!
//! Stateless: the same XP total always yields the same level. Level-up is
//! an edge the caller detects by comparing two totals, see [`level_up`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::habit::{CompletionEvent, Habit};

pub const DEFAULT_LEVEL_SIZE: u64 = 1000;

/// Where a total XP value sits on the level curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub total_xp: u64,
    pub level: u64,
    pub xp_into_level: u64,
    pub xp_to_next: u64,
    /// 0..100.
    pub progress_percent: f64,
}

/// Level reached after an XP gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub from: u64,
    pub to: u64,
}

/// `level = floor(xp / level_size) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelCurve {
    level_size: u64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            level_size: DEFAULT_LEVEL_SIZE,
        }
    }
}

impl LevelCurve {
    pub fn new(level_size: u64) -> Result<Self, ValidationError> {
        if level_size == 0 {
            return Err(ValidationError::InvalidValue {
                field: "level_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Self { level_size })
    }

    pub fn level_size(&self) -> u64 {
        self.level_size
    }

    pub fn level(&self, total_xp: u64) -> u64 {
        total_xp / self.level_size + 1
    }

    pub fn progress(&self, total_xp: u64) -> LevelProgress {
        let xp_into_level = total_xp % self.level_size;
        LevelProgress {
            total_xp,
            level: self.level(total_xp),
            xp_into_level,
            xp_to_next: self.level_size - xp_into_level,
            progress_percent: xp_into_level as f64 / self.level_size as f64 * 100.0,
        }
    }

    /// Minimum XP required to be at `level`.
    pub fn xp_for_level(&self, level: u64) -> u64 {
        level.saturating_sub(1).saturating_mul(self.level_size)
    }
}

/// `Some` when going from `previous_xp` to `new_xp` crosses a level boundary.
pub fn level_up(curve: &LevelCurve, previous_xp: u64, new_xp: u64) -> Option<LevelUp> {
    let from = curve.level(previous_xp);
    let to = curve.level(new_xp);
    (to > from).then_some(LevelUp { from, to })
}

/// Sums XP over completion events.
///
/// Each event earns its habit's `xp_reward`; events for habits that are no
/// longer known earn `default_reward`.
#[derive(Debug, Clone)]
pub struct XpLedger<'a> {
    rewards: HashMap<&'a str, u32>,
    default_reward: u32,
}

impl<'a> XpLedger<'a> {
    pub fn new(habits: &'a [Habit], default_reward: u32) -> Self {
        Self {
            rewards: habits.iter().map(|h| (h.id.as_str(), h.xp_reward)).collect(),
            default_reward,
        }
    }

    pub fn reward_for(&self, habit_id: &str) -> u32 {
        self.rewards
            .get(habit_id)
            .copied()
            .unwrap_or(self.default_reward)
    }

    pub fn total(&self, events: &[CompletionEvent]) -> u64 {
        events
            .iter()
            .map(|e| u64::from(self.reward_for(&e.habit_id)))
            .sum()
    }

    /// XP earned per habit id.
    pub fn by_habit(&self, events: &[CompletionEvent]) -> HashMap<String, u64> {
        let mut out: HashMap<String, u64> = HashMap::new();
        for e in events {
            *out.entry(e.habit_id.clone()).or_default() += u64::from(self.reward_for(&e.habit_id));
        }
        out
    }
}
