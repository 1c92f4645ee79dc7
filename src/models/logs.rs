use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a log entry came from: the tracker's own stop(), a manual API
/// create, or the 4-hour safety auto-stop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    Tracker,
    Api,
    SafetyCheck,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Tracker => "tracker",
            LogSource::Api => "api",
            LogSource::SafetyCheck => "safety_check",
        }
    }
}

/// Immutable record of focused hours attributed to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkLog {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub task_name: String,
    pub hours: f64,
    pub total_break_seconds: i64,
    pub date: DateTime<Utc>,
    pub source: LogSource,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of focused minutes attributed to a habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitLog {
    pub id: String,
    pub habit_id: String,
    pub habit_name: String,
    pub actual_minutes: i64,
    pub date: DateTime<Utc>,
    pub source: LogSource,
    pub created_at: DateTime<Utc>,
}

/// Denormalized budget counter; `spent_hours` must always equal the sum of
/// this project's log hours, maintained by signed increments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub spent_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub total_actual_minutes: i64,
}
