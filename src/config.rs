use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One home for every tunable the dashboard used to hard-code in scattered
/// call sites (daily target, quarterly budget, the safety ceiling, alarm
/// cadences). Missing file or missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Hours of focused work targeted per day.
    pub daily_target_hours: f64,
    /// Hours budgeted per quarter.
    pub quarterly_budget_hours: f64,
    /// Hard ceiling on unattended sessions; the safety check force-stops
    /// anything older than this.
    pub max_session_secs: i64,
    /// Net focused minutes at which the focus milestone fires.
    pub focus_alert_minutes: i64,
    /// Open-break minutes at which the break check-in fires.
    pub break_alert_minutes: i64,
    /// Cadence of the session status check, in seconds.
    pub status_check_secs: u64,
    /// Cadence of the inactivity nudge, in seconds.
    pub idle_nudge_secs: u64,
    /// Local hour (inclusive) from which the idle nudge may fire.
    pub idle_window_start_hour: u32,
    /// Local hour (exclusive) until which the idle nudge may fire.
    pub idle_window_end_hour: u32,
    /// Local hour of the evening planning reminder.
    pub planning_alert_hour: u32,
    /// Local hour of the morning review reminder.
    pub morning_rule_hour: u32,
    /// Opened when the user interacts with a notification.
    pub dashboard_url: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            daily_target_hours: 8.0,
            quarterly_budget_hours: 576.0,
            max_session_secs: 4 * 60 * 60,
            focus_alert_minutes: 90,
            break_alert_minutes: 15,
            status_check_secs: 60,
            idle_nudge_secs: 30 * 60,
            idle_window_start_hour: 8,
            idle_window_end_hour: 22,
            planning_alert_hour: 21,
            morning_rule_hour: 9,
            dashboard_url: "https://north-star2026.vercel.app".into(),
        }
    }
}

impl TrackerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write config to {}", path.display()))
    }
}
