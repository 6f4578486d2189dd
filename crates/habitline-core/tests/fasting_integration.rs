//! Integration tests for the fasting window lifecycle.
//!
//! Drives the state machine through full cycles against an in-memory
//! window list, then checks the aggregated history.

use chrono::{DateTime, Duration, TimeZone, Utc};
use habitline_core::fasting::{
    apply_plan, FastingCommand, FastingHistory, FastingMachine, FastingMode, FastingPlan,
    FastingWindow,
};

const HABIT: &str = "fast";
const TARGET: u32 = 960;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap()
}

fn run(windows: &mut Vec<FastingWindow>, command: FastingCommand, at: DateTime<Utc>) -> bool {
    let plan = FastingMachine::new(windows).plan(command, TARGET, at);
    let next = windows.len() + 1;
    apply_plan(windows, HABIT, &plan, || format!("w{next}")).is_some()
}

#[test]
fn test_full_cycle_reports_status_at_each_phase() {
    let mut windows = Vec::new();
    assert_eq!(FastingMachine::new(&windows).mode(), FastingMode::Inactive);

    assert!(run(&mut windows, FastingCommand::StartFasting, start()));
    let status = FastingMachine::new(&windows).status(start() + Duration::hours(8), TARGET);
    assert_eq!(status.mode, FastingMode::Fasting);
    assert_eq!(status.duration_minutes, Some(480));
    assert_eq!(status.progress_percent, Some(50.0));
    assert!(!status.overachieved);

    let eat_at = start() + Duration::hours(16) + Duration::minutes(30);
    assert!(run(&mut windows, FastingCommand::StartEating, eat_at));
    let status = FastingMachine::new(&windows).status(eat_at + Duration::hours(4), TARGET);
    assert_eq!(status.mode, FastingMode::Eating);
    assert_eq!(status.duration_minutes, Some(240));
    // 16:8 protocol leaves an 8 hour eating window.
    assert_eq!(status.progress_percent, Some(50.0));
    assert_eq!(status.fasting_minutes, Some(990));
    assert!(status.overachieved);

    assert!(run(&mut windows, FastingCommand::EndEating, eat_at + Duration::hours(8)));
    assert_eq!(FastingMachine::new(&windows).mode(), FastingMode::Inactive);

    let history = FastingHistory::from_windows(&windows);
    assert_eq!(history.completed, 1);
    assert_eq!(history.goals_met, 1);
    assert_eq!(history.best_minutes, Some(990));
}

#[test]
fn test_illegal_commands_never_touch_the_log() {
    let mut windows = Vec::new();
    assert!(!run(&mut windows, FastingCommand::StartEating, start()));
    assert!(!run(&mut windows, FastingCommand::EndEating, start()));
    assert!(!run(&mut windows, FastingCommand::EndFast, start()));
    assert!(windows.is_empty());

    assert!(run(&mut windows, FastingCommand::StartFasting, start()));
    assert!(!run(&mut windows, FastingCommand::StartFasting, start() + Duration::minutes(1)));
    assert!(!run(&mut windows, FastingCommand::EndEating, start() + Duration::minutes(2)));
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].start_time, start());
}

#[test]
fn test_ignored_plan_carries_mode_and_command() {
    let windows = Vec::new();
    let plan = FastingMachine::new(&windows).plan(FastingCommand::EndEating, TARGET, start());
    assert_eq!(
        plan,
        FastingPlan::Ignored {
            mode: FastingMode::Inactive,
            command: FastingCommand::EndEating,
        }
    );
}

#[test]
fn test_abandoned_fast_counts_toward_history_without_goal() {
    let mut windows = Vec::new();
    run(&mut windows, FastingCommand::StartFasting, start());
    run(&mut windows, FastingCommand::EndFast, start() + Duration::hours(10));
    assert_eq!(FastingMachine::new(&windows).mode(), FastingMode::Inactive);

    let history = FastingHistory::from_windows(&windows);
    assert_eq!(history.completed, 1);
    assert_eq!(history.goals_met, 0);
    assert_eq!(history.best_minutes, Some(600));
}

#[test]
fn test_several_cycles_aggregate() {
    let mut windows = Vec::new();
    for (day, hours) in [(0, 14), (1, 18), (2, 16)] {
        let begin = start() + Duration::days(day);
        run(&mut windows, FastingCommand::StartFasting, begin);
        run(&mut windows, FastingCommand::StartEating, begin + Duration::hours(hours));
        run(&mut windows, FastingCommand::EndEating, begin + Duration::hours(hours + 2));
    }

    let history = FastingHistory::from_windows(&windows);
    assert_eq!(history.completed, 3);
    assert_eq!(history.goals_met, 2);
    assert_eq!(history.best_minutes, Some(18 * 60));
    assert_eq!(history.total_minutes, 48 * 60);
}

#[test]
fn test_status_before_start_is_not_rendered() {
    let mut windows = Vec::new();
    run(&mut windows, FastingCommand::StartFasting, start());
    let status = FastingMachine::new(&windows).status(start() - Duration::minutes(5), TARGET);
    assert_eq!(status.elapsed, None);
    assert_eq!(status.progress_percent, None);
}
