mod budgets;
mod logs;
mod sessions;

pub use sessions::StopSummary;
pub(crate) use budgets::{increment_habit_minutes, increment_project_hours};
