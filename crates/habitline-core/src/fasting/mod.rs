mod history;
mod machine;
mod window;

pub use history::FastingHistory;
pub use machine::{apply_plan, FastingCommand, FastingMachine, FastingPlan, FastingStatus};
pub use window::{eating_window_minutes, FastingMode, FastingProtocol, FastingWindow};
