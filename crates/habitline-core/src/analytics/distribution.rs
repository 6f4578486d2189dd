//! Time-of-day and category breakdowns.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::habit::{CompletionEvent, Habit, TimeOfDay};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDayCount {
    pub time_of_day: TimeOfDay,
    /// Habits configured for this bucket.
    pub habits: u32,
    /// Completions logged against those habits.
    pub completions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: u32,
    /// Whole percent; all shares sum to exactly 100.
    pub percentage: u32,
}

/// Habits and completions per time-of-day bucket.
///
/// Always returns all five buckets in [`TimeOfDay::ALL`] order. Events for
/// unknown habits are ignored.
pub fn time_of_day_stats(habits: &[Habit], events: &[CompletionEvent]) -> Vec<TimeOfDayCount> {
    let bucket_of: HashMap<&str, TimeOfDay> = habits
        .iter()
        .map(|h| (h.id.as_str(), h.time_of_day))
        .collect();

    let mut out: Vec<TimeOfDayCount> = TimeOfDay::ALL
        .iter()
        .map(|&time_of_day| TimeOfDayCount {
            time_of_day,
            habits: 0,
            completions: 0,
        })
        .collect();
    for h in habits {
        out[h.time_of_day.index()].habits += 1;
    }
    for e in events {
        if let Some(&t) = bucket_of.get(e.habit_id.as_str()) {
            out[t.index()].completions += 1;
        }
    }
    out
}

/// Habit count and share per category.
///
/// Percentages use largest-remainder allocation so they always total 100
/// for a non-empty input. Ordered by count, then category name.
pub fn category_stats(habits: &[Habit]) -> Vec<CategoryShare> {
    let total = habits.len() as u32;
    if total == 0 {
        return Vec::new();
    }

    let mut counts: HashMap<&str, u32> = HashMap::new();
    for h in habits {
        *counts.entry(h.category.as_str()).or_default() += 1;
    }

    // (category, count, floor percent, remainder)
    let mut rows: Vec<(&str, u32, u32, u32)> = counts
        .into_iter()
        .map(|(category, count)| {
            let scaled = count * 100;
            (category, count, scaled / total, scaled % total)
        })
        .collect();

    let allocated: u32 = rows.iter().map(|r| r.2).sum();
    let mut leftover = 100 - allocated;

    rows.sort_by(|a, b| {
        b.3.cmp(&a.3)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.0.cmp(b.0))
    });
    for row in rows.iter_mut() {
        if leftover == 0 {
            break;
        }
        row.2 += 1;
        leftover -= 1;
    }

    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    rows.into_iter()
        .map(|(category, count, percentage, _)| CategoryShare {
            category: category.to_string(),
            count,
            percentage,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::HabitKind;
    use chrono::Utc;

    fn habit(id: &str, category: &str, t: TimeOfDay) -> Habit {
        let mut h = Habit::new(id, HabitKind::DailyCheck, Utc::now())
            .with_category(category)
            .with_time_of_day(t);
        h.id = id.into();
        h
    }

    #[test]
    fn thirds_round_to_one_hundred() {
        let habits = vec![
            habit("a", "health", TimeOfDay::Morning),
            habit("b", "mind", TimeOfDay::Morning),
            habit("c", "work", TimeOfDay::Morning),
        ];
        let shares = category_stats(&habits);
        assert_eq!(shares.iter().map(|s| s.percentage).sum::<u32>(), 100);
        assert_eq!(shares[0].category, "health");
        assert_eq!(shares[0].percentage, 34);
        assert_eq!(shares[1].percentage, 33);
    }

    #[test]
    fn larger_category_sorts_first() {
        let habits = vec![
            habit("a", "mind", TimeOfDay::Morning),
            habit("b", "health", TimeOfDay::Morning),
            habit("c", "health", TimeOfDay::Morning),
            habit("d", "health", TimeOfDay::Morning),
            habit("e", "work", TimeOfDay::Morning),
            habit("f", "work", TimeOfDay::Morning),
        ];
        let shares = category_stats(&habits);
        assert_eq!(shares[0], CategoryShare { category: "health".into(), count: 3, percentage: 50 });
        assert_eq!(shares[1].category, "work");
        assert_eq!(shares[1].percentage, 33);
        assert_eq!(shares[2].percentage, 17);
    }

    #[test]
    fn empty_habits_have_no_categories() {
        assert!(category_stats(&[]).is_empty());
    }

    #[test]
    fn time_of_day_covers_every_bucket() {
        let habits = vec![
            habit("a", "x", TimeOfDay::Morning),
            habit("b", "x", TimeOfDay::Night),
            habit("c", "x", TimeOfDay::Night),
        ];
        let ev = |id: &str| CompletionEvent {
            habit_id: id.into(),
            completed_at: Utc::now(),
            value: None,
        };
        let events = vec![ev("a"), ev("b"), ev("c"), ev("c"), ev("unknown")];
        let stats = time_of_day_stats(&habits, &events);

        assert_eq!(stats.len(), 5);
        assert_eq!(stats[0].time_of_day, TimeOfDay::Morning);
        assert_eq!((stats[0].habits, stats[0].completions), (1, 1));
        assert_eq!((stats[3].habits, stats[3].completions), (2, 3));
        assert_eq!((stats[4].habits, stats[4].completions), (0, 0));
    }
}
