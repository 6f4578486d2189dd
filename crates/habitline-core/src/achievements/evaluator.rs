//! Achievement unlock checks.
//!
//! Evaluation is a pure re-check against the current statistics. The
//! evaluator stores nothing; callers persist [`AchievementUnlock`]s and pass
//! them back in, and a recorded unlock is always reported as unlocked even
//! if the statistic has since dropped.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::definition::{AchievementDefinition, AchievementUnlock, AggregateStats, Rarity};

/// Whether `stats` satisfy the definition's requirement.
///
/// A stat missing from the map never satisfies a requirement.
pub fn is_unlocked(def: &AchievementDefinition, stats: &AggregateStats) -> bool {
    stats
        .get(&def.requirement.stat_key)
        .is_some_and(|v| v >= def.requirement.value)
}

/// Progress toward the requirement, clamped to `0..=100`.
///
/// A missing stat counts as no progress. A non-positive requirement is met
/// by any present value.
pub fn progress(def: &AchievementDefinition, stats: &AggregateStats) -> f64 {
    let Some(current) = stats.get(&def.requirement.stat_key) else {
        return 0.0;
    };
    if current.is_nan() {
        return 0.0;
    }
    let required = def.requirement.value;
    if required <= 0.0 {
        return if current >= required { 100.0 } else { 0.0 };
    }
    (current / required * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementStatus {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub progress_percent: f64,
    pub xp_reward: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AchievementReport {
    /// One entry per catalog definition, in catalog order.
    pub statuses: Vec<AchievementStatus>,
    /// Unlocks earned by this evaluation that are not yet recorded.
    pub newly_unlocked: Vec<AchievementUnlock>,
}

impl AchievementReport {
    pub fn unlocked_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.unlocked).count()
    }

    /// Share of the catalog unlocked, 0..=100.
    pub fn completion_percent(&self) -> f64 {
        if self.statuses.is_empty() {
            return 0.0;
        }
        self.unlocked_count() as f64 / self.statuses.len() as f64 * 100.0
    }
}

pub struct AchievementEvaluator {
    catalog: Vec<AchievementDefinition>,
}

impl AchievementEvaluator {
    pub fn new(catalog: Vec<AchievementDefinition>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &[AchievementDefinition] {
        &self.catalog
    }

    pub fn definition(&self, id: &str) -> Option<&AchievementDefinition> {
        self.catalog.iter().find(|d| d.id == id)
    }

    /// Re-check every definition against `stats`.
    ///
    /// `recorded` are unlocks already persisted for this user.
    pub fn evaluate(
        &self,
        stats: &AggregateStats,
        recorded: &[AchievementUnlock],
        now: DateTime<Utc>,
    ) -> AchievementReport {
        let recorded: HashMap<&str, DateTime<Utc>> = recorded
            .iter()
            .map(|u| (u.achievement_id.as_str(), u.unlocked_at))
            .collect();

        let mut report = AchievementReport::default();
        for def in &self.catalog {
            let previously = recorded.get(def.id.as_str()).copied();
            let unlocked_at = match previously {
                Some(at) => Some(at),
                None if is_unlocked(def, stats) => {
                    report.newly_unlocked.push(AchievementUnlock {
                        achievement_id: def.id.clone(),
                        unlocked_at: now,
                    });
                    Some(now)
                }
                None => None,
            };
            let unlocked = unlocked_at.is_some();

            report.statuses.push(AchievementStatus {
                id: def.id.clone(),
                name: def.name.clone(),
                rarity: def.rarity,
                unlocked,
                unlocked_at,
                progress_percent: if unlocked { 100.0 } else { progress(def, stats) },
                xp_reward: def.xp_reward,
            });
        }
        report
    }

    /// XP granted by the given unlocks. Unknown ids earn nothing.
    pub fn xp_from_unlocks(&self, unlocks: &[AchievementUnlock]) -> u64 {
        unlocks
            .iter()
            .filter_map(|u| self.definition(&u.achievement_id))
            .map(|d| u64::from(d.xp_reward))
            .sum()
    }
}
