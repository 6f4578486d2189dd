mod milestone;
mod tracker;

pub use milestone::{
    money_saved, Milestone, MilestoneLadder, MilestoneProgress, DEFAULT_MILESTONE_DAYS,
    DEFAULT_MILESTONE_LABELS,
};
pub use tracker::{
    apply_reset, seed_attempt, Attempt, AttemptStatus, AttemptTracker, ReasonCount, ResetPlan,
};
