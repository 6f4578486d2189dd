//! Built-in achievement catalog.

use super::definition::{stat_keys, AchievementDefinition, Rarity, Requirement};

fn achievement(
    id: &str,
    name: &str,
    description: &str,
    rarity: Rarity,
    stat_key: &str,
    value: f64,
    xp_reward: u32,
) -> AchievementDefinition {
    AchievementDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        rarity,
        requirement: Requirement {
            stat_key: stat_key.to_string(),
            value,
        },
        xp_reward,
    }
}

/// The static catalog shipped with the engine.
pub fn default_catalog() -> Vec<AchievementDefinition> {
    use stat_keys::*;
    use Rarity::*;

    vec![
        // Getting started
        achievement("first_step", "First Step", "Log your first completion", Common, TOTAL_COMPLETIONS, 1.0, 10),
        achievement("habit_builder", "Habit Builder", "Track three habits at once", Common, ACTIVE_HABITS, 3.0, 25),
        // Streaks
        achievement("streak_3", "Warming Up", "Reach a 3-day streak", Common, CURRENT_STREAK, 3.0, 25),
        achievement("streak_7", "One Week Strong", "Reach a 7-day streak", Uncommon, CURRENT_STREAK, 7.0, 50),
        achievement("streak_30", "Monthly Master", "Reach a 30-day streak", Rare, CURRENT_STREAK, 30.0, 200),
        achievement("streak_100", "Centurion", "Reach a 100-day streak", Epic, LONGEST_STREAK, 100.0, 500),
        achievement("streak_365", "Year of Discipline", "Keep a streak for a full year", Legendary, LONGEST_STREAK, 365.0, 2000),
        // Volume
        achievement("completions_50", "Dedicated", "Log 50 completions", Uncommon, TOTAL_COMPLETIONS, 50.0, 75),
        achievement("completions_250", "Relentless", "Log 250 completions", Rare, TOTAL_COMPLETIONS, 250.0, 250),
        achievement("completions_1000", "Unstoppable", "Log 1000 completions", Epic, TOTAL_COMPLETIONS, 1000.0, 750),
        achievement("perfect_week", "Perfect Week", "Complete every habit on 7 days", Rare, PERFECT_DAYS, 7.0, 150),
        // Levels
        achievement("level_5", "Rising Star", "Reach level 5", Uncommon, LEVEL, 5.0, 100),
        achievement("level_10", "Veteran", "Reach level 10", Rare, LEVEL, 10.0, 300),
        achievement("level_25", "Legend", "Reach level 25", Legendary, LEVEL, 25.0, 1000),
        // Fasting
        achievement("first_fast", "First Fast", "Complete a fasting window", Common, FASTS_COMPLETED, 1.0, 25),
        achievement("fasts_10", "Fasting Regular", "Complete 10 fasting windows", Uncommon, FASTS_COMPLETED, 10.0, 100),
        achievement("fast_goals_30", "Iron Will", "Hit your fasting target 30 times", Rare, FASTING_GOALS_MET, 30.0, 300),
        achievement("fast_24h", "Full Day Fast", "Fast for 24 hours", Epic, LONGEST_FAST_HOURS, 24.0, 400),
        // Abstinence
        achievement("clean_7", "Clean Week", "Go 7 days without a reset", Uncommon, CURRENT_ATTEMPT_DAYS, 7.0, 75),
        achievement("clean_30", "Clean Month", "Go 30 days without a reset", Rare, CURRENT_ATTEMPT_DAYS, 30.0, 250),
        achievement("clean_90", "New Normal", "Go 90 days without a reset", Epic, LONGEST_ATTEMPT_DAYS, 90.0, 600),
        achievement("clean_365", "Transformed", "Go a full year without a reset", Legendary, LONGEST_ATTEMPT_DAYS, 365.0, 2500),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_ids_are_unique() {
        let catalog = default_catalog();
        let ids: HashSet<&str> = catalog.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn catalog_requirements_are_positive() {
        assert!(default_catalog().iter().all(|d| d.requirement.value > 0.0));
    }
}
