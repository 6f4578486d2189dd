//! Property tests for the arithmetic the derived views rest on.

use chrono::{DateTime, Duration, TimeZone, Utc};
use habitline_core::achievements::{default_catalog, progress, AggregateStats};
use habitline_core::analytics::category_stats;
use habitline_core::attempt::{apply_reset, seed_attempt, AttemptTracker};
use habitline_core::fasting::{
    apply_plan, FastingCommand, FastingHistory, FastingMachine, FastingWindow,
};
use habitline_core::habit::{Habit, HabitKind};
use habitline_core::progression::LevelCurve;
use habitline_core::time::{elapsed, Elapsed};
use proptest::prelude::*;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn command() -> impl Strategy<Value = FastingCommand> {
    prop_oneof![
        Just(FastingCommand::StartFasting),
        Just(FastingCommand::StartEating),
        Just(FastingCommand::EndEating),
        Just(FastingCommand::EndFast),
    ]
}

proptest! {
    #[test]
    fn elapsed_decomposes_exactly(minutes in 0i64..10_000_000) {
        let e = elapsed(epoch(), epoch() + Duration::minutes(minutes)).unwrap();
        prop_assert_eq!(e.total_minutes(), minutes);
        prop_assert!((0..24).contains(&e.hours));
        prop_assert!((0..60).contains(&e.minutes));
        prop_assert_eq!(e, Elapsed::from_minutes(minutes));
    }

    #[test]
    fn elapsed_before_start_is_none(minutes in 1i64..1_000_000) {
        prop_assert!(elapsed(epoch(), epoch() - Duration::minutes(minutes)).is_none());
    }

    #[test]
    fn level_is_monotonic(size in 1u64..5_000, a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let curve = LevelCurve::new(size).unwrap();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let p_lo = curve.progress(lo);
        let p_hi = curve.progress(hi);

        prop_assert!(p_lo.level >= 1);
        prop_assert!(p_lo.level <= p_hi.level);
        prop_assert_eq!(p_hi.xp_into_level + p_hi.xp_to_next, size);
        prop_assert!(p_hi.xp_to_next > 0);
        prop_assert!((0.0..100.0).contains(&p_hi.progress_percent));
    }

    #[test]
    fn fasting_progress_is_clamped_and_monotonic(
        target in 1u32..2_000,
        a in 0i64..5_000,
        b in 0i64..5_000,
    ) {
        let window = FastingWindow {
            id: "w1".into(),
            habit_id: "fast".into(),
            start_time: epoch(),
            eating_transition_time: None,
            end_time: None,
            target_minutes: target,
        };
        let windows = [window];
        let machine = FastingMachine::new(&windows);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let p_lo = machine.status(epoch() + Duration::minutes(lo), target).progress_percent.unwrap();
        let p_hi = machine.status(epoch() + Duration::minutes(hi), target).progress_percent.unwrap();

        prop_assert!(p_lo <= p_hi);
        prop_assert!((0.0..=100.0).contains(&p_hi));
    }

    #[test]
    fn category_percentages_sum_to_100(categories in prop::collection::vec(0usize..6, 1..40)) {
        let habits: Vec<Habit> = categories
            .iter()
            .map(|c| Habit::new("h", HabitKind::DailyCheck, epoch()).with_category(format!("c{c}")))
            .collect();
        let shares = category_stats(&habits);

        let total: u32 = shares.iter().map(|s| s.percentage).sum();
        prop_assert_eq!(total, 100);
        let counted: u32 = shares.iter().map(|s| s.count).sum();
        prop_assert_eq!(counted as usize, habits.len());
    }

    #[test]
    fn resets_leave_exactly_one_open_attempt(gaps in prop::collection::vec(0i64..10_000, 1..20)) {
        let mut attempts = vec![seed_attempt("h", epoch())];
        let mut now = epoch();
        for gap in gaps {
            now += Duration::minutes(gap);
            let plan = AttemptTracker::new("h", &attempts).plan_reset(None, now).unwrap();
            apply_reset(&mut attempts, &plan);

            prop_assert_eq!(attempts.iter().filter(|a| a.is_open()).count(), 1);
            let tracker = AttemptTracker::new("h", &attempts);
            prop_assert_eq!(tracker.current().unwrap().start_date, now);
        }
        let longest = AttemptTracker::new("h", &attempts).longest_streak();
        prop_assert!(attempts.iter().filter_map(|a| a.days_lasted).all(|d| d <= longest));
    }

    #[test]
    fn fasting_never_has_two_open_windows(commands in prop::collection::vec(command(), 1..30)) {
        let mut windows: Vec<FastingWindow> = Vec::new();
        for (i, cmd) in commands.into_iter().enumerate() {
            let at = epoch() + Duration::hours(i as i64);
            let plan = FastingMachine::new(&windows).plan(cmd, 960, at);
            let next = windows.len();
            apply_plan(&mut windows, "fast", &plan, || format!("w{next}"));
            prop_assert!(windows.iter().filter(|w| w.is_open()).count() <= 1);
        }
    }

    #[test]
    fn achievement_progress_is_monotonic(index in 0usize..22, a in 0.0f64..5_000.0, b in 0.0f64..5_000.0) {
        let catalog = default_catalog();
        let def = &catalog[index % catalog.len()];
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let at = |v: f64| AggregateStats::new().with(def.requirement.stat_key.clone(), v);

        let p_lo = progress(def, &at(lo));
        let p_hi = progress(def, &at(hi));
        prop_assert!(p_lo <= p_hi);
        prop_assert!((0.0..=100.0).contains(&p_lo));
        prop_assert!((0.0..=100.0).contains(&p_hi));
    }

    #[test]
    fn fasting_duration_ignores_eating_length(fast in 1i64..3_000, eat in 0i64..3_000) {
        let mut windows: Vec<FastingWindow> = Vec::new();
        let eat_at = epoch() + Duration::minutes(fast);
        for (cmd, at) in [
            (FastingCommand::StartFasting, epoch()),
            (FastingCommand::StartEating, eat_at),
            (FastingCommand::EndEating, eat_at + Duration::minutes(eat)),
        ] {
            let plan = FastingMachine::new(&windows).plan(cmd, 960, at);
            apply_plan(&mut windows, "fast", &plan, || "w1".to_string());
        }

        prop_assert_eq!(windows.len(), 1);
        prop_assert!(!windows[0].is_open());
        prop_assert_eq!(windows[0].fasting_duration_minutes(), Some(fast));
        prop_assert_eq!(FastingHistory::from_windows(&windows).best_minutes, Some(fast));
    }
}
