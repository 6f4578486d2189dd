//! Achievement definitions, evaluation and the built-in catalog.

mod catalog;
mod definition;
mod evaluator;

pub use catalog::default_catalog;
pub use definition::{
    stat_keys, AchievementDefinition, AchievementUnlock, AggregateStats, Rarity, Requirement,
};
pub use evaluator::{is_unlocked, progress, AchievementEvaluator, AchievementReport, AchievementStatus};
