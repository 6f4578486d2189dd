//! Fasting state machine.
//!
//! The machine holds no state of its own. Mode is recomputed from the
//! window log on every call, and commands are turned into a [`FastingPlan`]
//! describing the single store write to perform (or why nothing happens).
//!
//! ## State Transitions
//!
//! ```text
//! Inactive -> Fasting -> Eating -> Inactive
//!                 \------------------^  (end_fast: abandon or finish early)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::window::{eating_window_minutes, FastingMode, FastingWindow};
use crate::time::{self, Elapsed};

/// User intent against a fasting habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FastingCommand {
    StartFasting,
    StartEating,
    EndEating,
    /// Stop fasting without an eating phase.
    EndFast,
}

impl FastingCommand {
    /// Mode the command is legal from.
    pub fn required_mode(&self) -> FastingMode {
        match self {
            FastingCommand::StartFasting => FastingMode::Inactive,
            FastingCommand::StartEating | FastingCommand::EndFast => FastingMode::Fasting,
            FastingCommand::EndEating => FastingMode::Eating,
        }
    }
}

/// The write a command resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FastingPlan {
    /// Create a new window starting now.
    Open {
        start_time: DateTime<Utc>,
        target_minutes: u32,
    },
    /// Record the eating transition on the open window.
    MarkEating {
        window_id: String,
        at: DateTime<Utc>,
    },
    /// Close the open window.
    Close {
        window_id: String,
        at: DateTime<Utc>,
    },
    /// Record the eating transition and close in one step.
    Abandon {
        window_id: String,
        at: DateTime<Utc>,
    },
    /// Illegal from the current mode, or `now` precedes the last transition.
    Ignored {
        mode: FastingMode,
        command: FastingCommand,
    },
}

impl FastingPlan {
    pub fn is_ignored(&self) -> bool {
        matches!(self, FastingPlan::Ignored { .. })
    }
}

/// Snapshot of the current fast for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastingStatus {
    pub mode: FastingMode,
    pub window_id: Option<String>,
    /// Start of the current phase (fast start, or eating transition).
    pub phase_started_at: Option<DateTime<Utc>>,
    /// Time spent in the current phase; `None` outside a window or when the
    /// clock reads earlier than the phase start.
    pub elapsed: Option<Elapsed>,
    pub duration_minutes: Option<i64>,
    pub target_minutes: u32,
    /// Progress of the current phase, capped at 100. `None` when there is
    /// no meaningful target to measure against.
    pub progress_percent: Option<f64>,
    /// Length of the fasting phase of the open window, running or final.
    pub fasting_minutes: Option<i64>,
    pub overachieved: bool,
}

impl FastingStatus {
    fn inactive(target_minutes: u32) -> Self {
        Self {
            mode: FastingMode::Inactive,
            window_id: None,
            phase_started_at: None,
            elapsed: None,
            duration_minutes: None,
            target_minutes,
            progress_percent: None,
            fasting_minutes: None,
            overachieved: false,
        }
    }
}

/// Stateless view over one habit's fasting windows.
#[derive(Debug, Clone, Copy)]
pub struct FastingMachine<'a> {
    windows: &'a [FastingWindow],
}

impl<'a> FastingMachine<'a> {
    pub fn new(windows: &'a [FastingWindow]) -> Self {
        Self { windows }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The open window, if any.
    ///
    /// Only one should ever exist. If the log holds several, the most
    /// recently started one is authoritative.
    pub fn current_window(&self) -> Option<&'a FastingWindow> {
        let mut open = self.windows.iter().filter(|w| w.is_open());
        let first = open.next()?;
        let mut latest = first;
        let mut count = 1;
        for w in open {
            count += 1;
            if w.start_time > latest.start_time {
                latest = w;
            }
        }
        if count > 1 {
            tracing::warn!(
                habit_id = %latest.habit_id,
                open_windows = count,
                "multiple open fasting windows; using the most recent"
            );
        }
        Some(latest)
    }

    pub fn mode(&self) -> FastingMode {
        self.current_window()
            .map(FastingWindow::mode)
            .unwrap_or(FastingMode::Inactive)
    }

    /// Closed windows, oldest first.
    pub fn closed_windows(&self) -> impl Iterator<Item = &'a FastingWindow> {
        self.windows.iter().filter(|w| !w.is_open())
    }

    /// Status at `now`. An open window reports its own target;
    /// `default_target_minutes` only fills in the inactive status.
    pub fn status(&self, now: DateTime<Utc>, default_target_minutes: u32) -> FastingStatus {
        let Some(window) = self.current_window() else {
            return FastingStatus::inactive(default_target_minutes);
        };
        let target_minutes = window.target_minutes;
        let mode = window.mode();

        let (phase_start, phase_target) = match mode {
            FastingMode::Eating => (
                window.eating_transition_time.unwrap_or(window.start_time),
                eating_window_minutes(target_minutes),
            ),
            _ => (window.start_time, Some(target_minutes)),
        };

        let elapsed = time::elapsed(phase_start, now);
        let duration_minutes = elapsed.map(|e| e.total_minutes());
        let progress_percent = match (duration_minutes, phase_target) {
            (Some(d), Some(t)) => progress_toward(d, t),
            _ => None,
        };

        let fasting_minutes = match mode {
            FastingMode::Eating => window.fasting_duration_minutes(),
            _ => duration_minutes,
        };
        let overachieved = target_minutes > 0
            && fasting_minutes.is_some_and(|m| m >= i64::from(target_minutes));

        FastingStatus {
            mode,
            window_id: Some(window.id.clone()),
            phase_started_at: Some(phase_start),
            elapsed,
            duration_minutes,
            target_minutes,
            progress_percent,
            fasting_minutes,
            overachieved,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Resolve a command against the current mode.
    ///
    /// Illegal commands resolve to [`FastingPlan::Ignored`]; a repeated tap
    /// never creates a second window.
    pub fn plan(
        &self,
        command: FastingCommand,
        target_minutes: u32,
        now: DateTime<Utc>,
    ) -> FastingPlan {
        let current = self.current_window();
        let mode = current.map(FastingWindow::mode).unwrap_or(FastingMode::Inactive);
        let ignored = FastingPlan::Ignored { mode, command };

        if mode != command.required_mode() {
            tracing::debug!(?mode, ?command, "ignoring fasting command in wrong mode");
            return ignored;
        }

        let Some(window) = current else {
            return FastingPlan::Open {
                start_time: now,
                target_minutes,
            };
        };

        let last_transition = window.eating_transition_time.unwrap_or(window.start_time);
        if now < last_transition {
            tracing::debug!(
                window_id = %window.id,
                %now,
                %last_transition,
                "ignoring fasting command dated before the last transition"
            );
            return ignored;
        }

        let window_id = window.id.clone();
        match command {
            FastingCommand::StartEating => FastingPlan::MarkEating { window_id, at: now },
            FastingCommand::EndEating => FastingPlan::Close { window_id, at: now },
            FastingCommand::EndFast => FastingPlan::Abandon { window_id, at: now },
            FastingCommand::StartFasting => ignored,
        }
    }
}

fn progress_toward(duration_minutes: i64, target_minutes: u32) -> Option<f64> {
    if target_minutes == 0 {
        return None;
    }
    Some((duration_minutes as f64 / f64::from(target_minutes) * 100.0).min(100.0))
}

/// Apply a plan to an in-memory window list, the same way a store would.
///
/// Returns the id of the touched window, or `None` for ignored plans.
pub fn apply_plan(
    windows: &mut Vec<FastingWindow>,
    habit_id: &str,
    plan: &FastingPlan,
    new_id: impl FnOnce() -> String,
) -> Option<String> {
    match plan {
        FastingPlan::Open {
            start_time,
            target_minutes,
        } => {
            let id = new_id();
            windows.push(FastingWindow {
                id: id.clone(),
                habit_id: habit_id.to_string(),
                start_time: *start_time,
                eating_transition_time: None,
                end_time: None,
                target_minutes: *target_minutes,
            });
            Some(id)
        }
        FastingPlan::MarkEating { window_id, at } => {
            let w = windows.iter_mut().find(|w| &w.id == window_id)?;
            w.eating_transition_time = Some(*at);
            Some(window_id.clone())
        }
        FastingPlan::Close { window_id, at } => {
            let w = windows.iter_mut().find(|w| &w.id == window_id)?;
            w.end_time = Some(*at);
            Some(window_id.clone())
        }
        FastingPlan::Abandon { window_id, at } => {
            let w = windows.iter_mut().find(|w| &w.id == window_id)?;
            w.eating_transition_time = Some(*at);
            w.end_time = Some(*at);
            Some(window_id.clone())
        }
        FastingPlan::Ignored { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const TARGET: u32 = 16 * 60;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap()
    }

    fn run(windows: &mut Vec<FastingWindow>, command: FastingCommand, at: DateTime<Utc>) -> FastingPlan {
        let plan = FastingMachine::new(windows).plan(command, TARGET, at);
        let n = windows.len();
        apply_plan(windows, "h1", &plan, || format!("w{}", n + 1));
        plan
    }

    #[test]
    fn full_cycle_produces_one_closed_window() {
        let mut windows = Vec::new();
        run(&mut windows, FastingCommand::StartFasting, t0());
        assert_eq!(FastingMachine::new(&windows).mode(), FastingMode::Fasting);

        run(&mut windows, FastingCommand::StartEating, t0() + Duration::hours(17));
        assert_eq!(FastingMachine::new(&windows).mode(), FastingMode::Eating);

        run(&mut windows, FastingCommand::EndEating, t0() + Duration::hours(30));
        assert_eq!(FastingMachine::new(&windows).mode(), FastingMode::Inactive);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].fasting_duration_minutes(), Some(17 * 60));
    }

    #[test]
    fn double_start_is_ignored() {
        let mut windows = Vec::new();
        run(&mut windows, FastingCommand::StartFasting, t0());
        let plan = run(&mut windows, FastingCommand::StartFasting, t0() + Duration::seconds(1));
        assert_eq!(
            plan,
            FastingPlan::Ignored {
                mode: FastingMode::Fasting,
                command: FastingCommand::StartFasting
            }
        );
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn end_eating_while_inactive_is_ignored() {
        let windows: Vec<FastingWindow> = Vec::new();
        let plan = FastingMachine::new(&windows).plan(FastingCommand::EndEating, TARGET, t0());
        assert!(plan.is_ignored());
    }

    #[test]
    fn double_end_eating_is_a_no_op() {
        let mut windows = Vec::new();
        run(&mut windows, FastingCommand::StartFasting, t0());
        run(&mut windows, FastingCommand::StartEating, t0() + Duration::hours(16));
        run(&mut windows, FastingCommand::EndEating, t0() + Duration::hours(20));
        let again = run(&mut windows, FastingCommand::EndEating, t0() + Duration::hours(20));
        assert!(again.is_ignored());
        assert_eq!(windows[0].end_time, Some(t0() + Duration::hours(20)));
    }

    #[test]
    fn transition_before_phase_start_is_ignored() {
        let mut windows = Vec::new();
        run(&mut windows, FastingCommand::StartFasting, t0());
        let plan = run(&mut windows, FastingCommand::StartEating, t0() - Duration::minutes(5));
        assert!(plan.is_ignored());
        assert_eq!(windows[0].eating_transition_time, None);
    }

    #[test]
    fn end_fast_closes_without_eating_phase() {
        let mut windows = Vec::new();
        run(&mut windows, FastingCommand::StartFasting, t0());
        run(&mut windows, FastingCommand::EndFast, t0() + Duration::hours(10));
        assert_eq!(FastingMachine::new(&windows).mode(), FastingMode::Inactive);
        assert_eq!(windows[0].fasting_duration_minutes(), Some(600));
        assert!(!windows[0].met_target());
    }

    #[test]
    fn status_caps_progress_and_flags_overachievement() {
        let mut windows = Vec::new();
        run(&mut windows, FastingCommand::StartFasting, t0());

        let m = FastingMachine::new(&windows);
        let halfway = m.status(t0() + Duration::hours(8), TARGET);
        assert_eq!(halfway.mode, FastingMode::Fasting);
        assert_eq!(halfway.progress_percent, Some(50.0));
        assert!(!halfway.overachieved);

        let over = m.status(t0() + Duration::hours(17), TARGET);
        assert_eq!(over.progress_percent, Some(100.0));
        assert_eq!(over.duration_minutes, Some(17 * 60));
        assert!(over.overachieved);
    }

    #[test]
    fn eating_status_measures_eating_window() {
        let mut windows = Vec::new();
        run(&mut windows, FastingCommand::StartFasting, t0());
        run(&mut windows, FastingCommand::StartEating, t0() + Duration::hours(17));

        let status = FastingMachine::new(&windows).status(t0() + Duration::hours(19), TARGET);
        assert_eq!(status.mode, FastingMode::Eating);
        assert_eq!(status.duration_minutes, Some(120));
        // 8h eating window for a 16h target.
        assert_eq!(status.progress_percent, Some(25.0));
        assert_eq!(status.fasting_minutes, Some(17 * 60));
        assert!(status.overachieved);
    }

    #[test]
    fn zero_target_suppresses_progress() {
        let mut windows = Vec::new();
        let plan = FastingMachine::new(&windows).plan(FastingCommand::StartFasting, 0, t0());
        apply_plan(&mut windows, "h1", &plan, || "w1".into());
        let status = FastingMachine::new(&windows).status(t0() + Duration::hours(3), 0);
        assert_eq!(status.progress_percent, None);
        assert!(!status.overachieved);
    }

    #[test]
    fn open_window_target_overrides_default() {
        let mut windows = Vec::new();
        assert_eq!(FastingMachine::new(&windows).status(t0(), 18 * 60).target_minutes, 18 * 60);

        run(&mut windows, FastingCommand::StartFasting, t0());
        let status = FastingMachine::new(&windows).status(t0() + Duration::hours(8), 18 * 60);
        assert_eq!(status.target_minutes, TARGET);
        assert_eq!(status.progress_percent, Some(50.0));
    }

    #[test]
    fn status_before_start_has_no_elapsed() {
        let mut windows = Vec::new();
        run(&mut windows, FastingCommand::StartFasting, t0());
        let status = FastingMachine::new(&windows).status(t0() - Duration::minutes(1), TARGET);
        assert_eq!(status.mode, FastingMode::Fasting);
        assert!(status.elapsed.is_none());
        assert!(status.progress_percent.is_none());
    }

    #[test]
    fn most_recent_open_window_wins() {
        let older = FastingWindow {
            id: "old".into(),
            habit_id: "h1".into(),
            start_time: t0(),
            eating_transition_time: None,
            end_time: None,
            target_minutes: TARGET,
        };
        let newer = FastingWindow {
            id: "new".into(),
            start_time: t0() + Duration::hours(1),
            eating_transition_time: Some(t0() + Duration::hours(2)),
            ..older.clone()
        };
        let windows = vec![newer, older];
        let m = FastingMachine::new(&windows);
        assert_eq!(m.current_window().unwrap().id, "new");
        assert_eq!(m.mode(), FastingMode::Eating);
    }
}
