//! Milestone ladder for duration-counter streaks.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub days: u32,
    pub label: String,
}

/// Progress toward the next milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneProgress {
    /// Label of the next milestone, or the final one once all are passed.
    pub label: String,
    pub target_days: u32,
    /// 0..=100.
    pub progress_percent: f64,
    /// Number of milestones already reached.
    pub reached: usize,
}

/// Ascending, fixed list of day thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneLadder {
    milestones: Vec<Milestone>,
}

pub const DEFAULT_MILESTONE_DAYS: [u32; 6] = [1, 7, 30, 90, 180, 365];
pub const DEFAULT_MILESTONE_LABELS: [&str; 6] =
    ["1 Day", "1 Week", "1 Month", "3 Months", "6 Months", "1 Year"];

impl Default for MilestoneLadder {
    fn default() -> Self {
        Self {
            milestones: DEFAULT_MILESTONE_DAYS
                .iter()
                .zip(DEFAULT_MILESTONE_LABELS)
                .map(|(&days, label)| Milestone {
                    days,
                    label: label.to_string(),
                })
                .collect(),
        }
    }
}

impl MilestoneLadder {
    /// Build a ladder, rejecting empty, non-positive, or non-ascending input.
    pub fn new(milestones: Vec<Milestone>) -> Result<Self, ValidationError> {
        let invalid = |message: String| ValidationError::InvalidValue {
            field: "milestones".to_string(),
            message,
        };
        if milestones.is_empty() {
            return Err(invalid("at least one milestone is required".into()));
        }
        if milestones[0].days == 0 {
            return Err(invalid("milestones must be positive".into()));
        }
        if let Some(pair) = milestones.windows(2).find(|p| p[1].days <= p[0].days) {
            return Err(invalid(format!(
                "milestones must be strictly ascending ({} then {})",
                pair[0].days, pair[1].days
            )));
        }
        Ok(Self { milestones })
    }

    /// Pair day thresholds with labels of the same length.
    pub fn from_parts(days: &[u32], labels: &[String]) -> Result<Self, ValidationError> {
        if days.len() != labels.len() {
            return Err(ValidationError::InvalidValue {
                field: "milestones".to_string(),
                message: format!("{} days but {} labels", days.len(), labels.len()),
            });
        }
        Self::new(
            days.iter()
                .zip(labels)
                .map(|(&days, label)| Milestone {
                    days,
                    label: label.clone(),
                })
                .collect(),
        )
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    /// Progress of `days` toward the first milestone strictly above it.
    ///
    /// Past the last milestone, progress is pinned at 100 against the final
    /// label. Negative input counts as zero days.
    pub fn progress(&self, days: i64) -> MilestoneProgress {
        let days = days.max(0);
        let reached = self
            .milestones
            .iter()
            .take_while(|m| i64::from(m.days) <= days)
            .count();

        match self.milestones.get(reached) {
            Some(next) => MilestoneProgress {
                label: next.label.clone(),
                target_days: next.days,
                progress_percent: (days as f64 / f64::from(next.days) * 100.0).min(100.0),
                reached,
            },
            None => {
                let (label, target_days) = self
                    .milestones
                    .last()
                    .map(|m| (m.label.clone(), m.days))
                    .unwrap_or_default();
                MilestoneProgress {
                    label,
                    target_days,
                    progress_percent: 100.0,
                    reached,
                }
            }
        }
    }
}

/// Money not spent over `days`, floored to whole units.
///
/// Suppressed (`None`) unless the user configured a positive daily cost.
pub fn money_saved(days: i64, cost_per_day: Option<f64>) -> Option<u64> {
    let cost = cost_per_day.filter(|c| c.is_finite() && *c > 0.0)?;
    Some((days.max(0) as f64 * cost).floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_targets_next_milestone() {
        let ladder = MilestoneLadder::default();

        let p = ladder.progress(0);
        assert_eq!(p.label, "1 Day");
        assert_eq!(p.progress_percent, 0.0);
        assert_eq!(p.reached, 0);

        let p = ladder.progress(3);
        assert_eq!(p.label, "1 Week");
        assert_eq!(p.target_days, 7);
        assert!((p.progress_percent - 300.0 / 7.0).abs() < 1e-9);
        assert_eq!(p.reached, 1);

        let p = ladder.progress(7);
        assert_eq!(p.label, "1 Month");
        assert_eq!(p.reached, 2);
    }

    #[test]
    fn progress_clamps_past_final_milestone() {
        let ladder = MilestoneLadder::default();
        for days in [365, 400, 10_000] {
            let p = ladder.progress(days);
            assert_eq!(p.label, "1 Year");
            assert_eq!(p.progress_percent, 100.0);
            assert_eq!(p.reached, 6);
        }
    }

    #[test]
    fn ladder_validation() {
        assert!(MilestoneLadder::new(vec![]).is_err());
        assert!(MilestoneLadder::from_parts(&[7, 7], &["a".into(), "b".into()]).is_err());
        assert!(MilestoneLadder::from_parts(&[0, 7], &["a".into(), "b".into()]).is_err());
        assert!(MilestoneLadder::from_parts(&[1, 7], &["a".into()]).is_err());
        let ladder = MilestoneLadder::from_parts(&[3, 10], &["a".into(), "b".into()]).unwrap();
        assert_eq!(ladder.progress(5).label, "b");
    }

    #[test]
    fn money_saved_floors_and_suppresses() {
        assert_eq!(money_saved(10, Some(2.75)), Some(27));
        assert_eq!(money_saved(10, None), None);
        assert_eq!(money_saved(10, Some(0.0)), None);
        assert_eq!(money_saved(10, Some(f64::NAN)), None);
        assert_eq!(money_saved(0, Some(5.0)), Some(0));
    }
}
