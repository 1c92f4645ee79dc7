use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Interrupted => "interrupted",
        }
    }

    /// A session still holding the single open slot.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Project,
    Habit,
}

/// A completed pause interval. The currently-open pause is tracked only by
/// `WorkSession::last_pause_time` and never appears here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BreakInterval {
    pub start: DateTime<Utc>,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub id: String,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub last_pause_time: Option<DateTime<Utc>>,
    pub breaks: Vec<BreakInterval>,
    pub task_name: String,
    pub project_id: Option<String>,
    pub habit_id: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkSession {
    pub fn total_break_seconds(&self) -> i64 {
        self.breaks.iter().map(|b| b.duration_seconds).sum()
    }

    /// Wall-clock seconds since start, ignoring breaks.
    pub fn raw_elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds().max(0)
    }

    /// Focused seconds: wall clock minus completed breaks. While paused the
    /// clock is frozen at `last_pause_time`, so the open pause contributes
    /// nothing even though it is not yet in `breaks`.
    pub fn net_elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let frozen_at = match (self.status, self.last_pause_time) {
            (SessionStatus::Paused, Some(pause)) => pause,
            _ => now,
        };
        let wall = (frozen_at - self.start_time).num_seconds();
        (wall - self.total_break_seconds()).max(0)
    }

    /// Seconds the currently-open pause has been running, 0 when not paused.
    pub fn open_break_seconds(&self, now: DateTime<Utc>) -> i64 {
        match (self.status, self.last_pause_time) {
            (SessionStatus::Paused, Some(pause)) => (now - pause).num_seconds().max(0),
            _ => 0,
        }
    }
}
