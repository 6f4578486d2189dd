//! Grouping of habit snapshots for the dashboard.

use serde::{Deserialize, Serialize};

use crate::habit::TimeOfDay;
use crate::snapshot::HabitSnapshot;

/// Default completion-rate threshold, in percent.
pub const DEFAULT_RISK_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDayGroup {
    pub time_of_day: TimeOfDay,
    pub habit_ids: Vec<String>,
}

/// Snapshots grouped by time of day, with an at-risk overlay.
///
/// A habit in the overlay still appears in its time-of-day group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitGrouping {
    /// All five buckets, in [`TimeOfDay::ALL`] order.
    pub groups: Vec<TimeOfDayGroup>,
    pub at_risk: Vec<String>,
}

impl HabitGrouping {
    pub fn group(&self, time_of_day: TimeOfDay) -> &[String] {
        self.groups
            .iter()
            .find(|g| g.time_of_day == time_of_day)
            .map(|g| g.habit_ids.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HabitClassifier {
    threshold: f64,
}

impl Default for HabitClassifier {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RISK_THRESHOLD,
        }
    }
}

impl HabitClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Low completion rate, or a lapsed streak on a habit that has been
    /// done before. A habit that was never completed is not flagged for
    /// the streak alone.
    pub fn is_at_risk(&self, snapshot: &HabitSnapshot) -> bool {
        snapshot.completion_rate < self.threshold
            || (snapshot.streak == 0 && snapshot.total_completions > 0)
    }

    pub fn classify(&self, snapshots: &[HabitSnapshot]) -> HabitGrouping {
        let groups = TimeOfDay::ALL
            .iter()
            .map(|&time_of_day| TimeOfDayGroup {
                time_of_day,
                habit_ids: snapshots
                    .iter()
                    .filter(|s| s.time_of_day == time_of_day)
                    .map(|s| s.habit_id.clone())
                    .collect(),
            })
            .collect();

        let at_risk: Vec<String> = snapshots
            .iter()
            .filter(|s| self.is_at_risk(s))
            .map(|s| s.habit_id.clone())
            .collect();
        if !at_risk.is_empty() {
            tracing::debug!(count = at_risk.len(), threshold = self.threshold, "habits at risk");
        }

        HabitGrouping { groups, at_risk }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Trend;
    use crate::snapshot::SnapshotMode;

    fn snap(id: &str, t: TimeOfDay, rate: f64, streak: i64, total: u32) -> HabitSnapshot {
        HabitSnapshot {
            habit_id: id.into(),
            name: id.into(),
            kind: "daily_check".into(),
            category: "general".into(),
            time_of_day: t,
            mode: SnapshotMode::Check,
            elapsed_minutes_or_days: None,
            streak,
            longest_streak: streak,
            completion_rate: rate,
            trend: Trend::Stable,
            xp_reward: 10,
            total_completions: total,
            completed_today: false,
        }
    }

    #[test]
    fn low_rate_is_at_risk() {
        let c = HabitClassifier::default();
        assert!(c.is_at_risk(&snap("a", TimeOfDay::Morning, 40.0, 3, 10)));
        assert!(!c.is_at_risk(&snap("a", TimeOfDay::Morning, 50.0, 3, 10)));
    }

    #[test]
    fn broken_streak_is_at_risk_only_after_a_completion() {
        let c = HabitClassifier::default();
        assert!(c.is_at_risk(&snap("a", TimeOfDay::Morning, 80.0, 0, 5)));
        assert!(!c.is_at_risk(&snap("a", TimeOfDay::Morning, 100.0, 0, 0)));
    }

    #[test]
    fn at_risk_habits_stay_in_their_bucket() {
        let snapshots = vec![
            snap("run", TimeOfDay::Morning, 90.0, 4, 20),
            snap("read", TimeOfDay::Night, 20.0, 0, 3),
            snap("stretch", TimeOfDay::Morning, 70.0, 2, 9),
        ];
        let grouping = HabitClassifier::new(60.0).classify(&snapshots);

        assert_eq!(grouping.groups.len(), 5);
        assert_eq!(grouping.group(TimeOfDay::Morning), ["run", "stretch"]);
        assert_eq!(grouping.group(TimeOfDay::Night), ["read"]);
        assert!(grouping.group(TimeOfDay::Evening).is_empty());
        assert_eq!(grouping.at_risk, vec!["read".to_string()]);
    }
}
