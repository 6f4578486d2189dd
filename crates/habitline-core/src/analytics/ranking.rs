//! Top-habit ranking.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::habit::{CompletionEvent, Habit};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitRanking {
    pub habit_id: String,
    pub name: String,
    pub completions: u32,
    pub xp_earned: u64,
}

/// The `n` habits with the most completions.
///
/// Ties are broken by XP earned, then by name. Habits with no completions
/// are not ranked.
pub fn top_habits(habits: &[Habit], events: &[CompletionEvent], n: usize) -> Vec<HabitRanking> {
    let mut completions: HashMap<&str, u32> = HashMap::new();
    for e in events {
        *completions.entry(e.habit_id.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<HabitRanking> = habits
        .iter()
        .filter_map(|h| {
            let count = completions.get(h.id.as_str()).copied().unwrap_or(0);
            (count > 0).then(|| HabitRanking {
                habit_id: h.id.clone(),
                name: h.name.clone(),
                completions: count,
                xp_earned: u64::from(count) * u64::from(h.xp_reward),
            })
        })
        .collect();

    ranked.sort_by(|a, b| match b.completions.cmp(&a.completions) {
        Ordering::Equal => b
            .xp_earned
            .cmp(&a.xp_earned)
            .then_with(|| a.name.cmp(&b.name)),
        other => other,
    });
    ranked.truncate(n);
    ranked
}
