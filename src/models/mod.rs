mod logs;
mod session;

pub use logs::{Habit, HabitLog, LogSource, Project, WorkLog};
pub use session::{BreakInterval, ItemType, SessionStatus, WorkSession};
