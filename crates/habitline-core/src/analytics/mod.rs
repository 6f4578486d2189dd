//! Analytics over habits and their completion history.
//!
//! Provides the dense completion trend, time-of-day and category
//! breakdowns, top-habit ranking, and the per-habit streak helpers the
//! snapshot builder relies on.

mod distribution;
mod ranking;
mod streak;
mod trend;

pub use distribution::{category_stats, time_of_day_stats, CategoryShare, TimeOfDayCount};
pub use ranking::{top_habits, HabitRanking};
pub use streak::{
    completed_on, completion_days, completion_rate, current_streak, longest_streak, perfect_days,
    trend, Trend, TREND_PERIOD_DAYS,
};
pub use trend::{completion_trend, DailyCount};
