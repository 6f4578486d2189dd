//! Aggregate statistics over closed fasting windows.

use serde::{Deserialize, Serialize};

use super::window::FastingWindow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FastingHistory {
    /// Closed windows with a known fasting duration.
    pub completed: u32,
    /// Completed fasts that reached their target.
    pub goals_met: u32,
    pub best_minutes: Option<i64>,
    pub average_minutes: Option<f64>,
    pub total_minutes: i64,
}

impl FastingHistory {
    /// Summarize every closed window in `windows`. Open windows are ignored.
    pub fn from_windows(windows: &[FastingWindow]) -> Self {
        let mut history = FastingHistory::default();

        for w in windows.iter().filter(|w| !w.is_open()) {
            let Some(minutes) = w.fasting_duration_minutes() else {
                continue;
            };
            history.completed += 1;
            history.total_minutes += minutes;
            if w.met_target() {
                history.goals_met += 1;
            }
            history.best_minutes = Some(history.best_minutes.map_or(minutes, |b| b.max(minutes)));
        }

        if history.completed > 0 {
            history.average_minutes =
                Some(history.total_minutes as f64 / f64::from(history.completed));
        }
        history
    }

    /// Share of completed fasts that met target, 0..=100.
    pub fn success_rate(&self) -> Option<f64> {
        (self.completed > 0)
            .then(|| f64::from(self.goals_met) / f64::from(self.completed) * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn closed(id: &str, start: DateTime<Utc>, fast_h: i64) -> FastingWindow {
        FastingWindow {
            id: id.into(),
            habit_id: "h1".into(),
            start_time: start,
            eating_transition_time: Some(start + Duration::hours(fast_h)),
            end_time: Some(start + Duration::hours(24)),
            target_minutes: 16 * 60,
        }
    }

    #[test]
    fn best_and_average_over_closed_windows() {
        let day = Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap();
        let mut windows = vec![
            closed("a", day, 14),
            closed("b", day + Duration::days(1), 18),
            closed("c", day + Duration::days(2), 16),
        ];
        windows.push(FastingWindow {
            id: "open".into(),
            habit_id: "h1".into(),
            start_time: day + Duration::days(3),
            eating_transition_time: Some(day + Duration::days(3) + Duration::hours(30)),
            end_time: None,
            target_minutes: 16 * 60,
        });

        let h = FastingHistory::from_windows(&windows);
        assert_eq!(h.completed, 3);
        assert_eq!(h.best_minutes, Some(18 * 60));
        assert_eq!(h.average_minutes, Some(16.0 * 60.0));
        assert_eq!(h.goals_met, 2);
        assert_eq!(h.total_minutes, 48 * 60);
        let rate = h.success_rate().unwrap();
        assert!((rate - 66.666).abs() < 0.01);
    }

    #[test]
    fn empty_history_has_no_best_or_average() {
        let h = FastingHistory::from_windows(&[]);
        assert_eq!(h.completed, 0);
        assert_eq!(h.best_minutes, None);
        assert_eq!(h.average_minutes, None);
        assert_eq!(h.success_rate(), None);
    }
}
