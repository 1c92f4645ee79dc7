use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{LogSource, SessionStatus};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(value: &str) -> Result<SessionStatus> {
    match value {
        "active" => Ok(SessionStatus::Active),
        "paused" => Ok(SessionStatus::Paused),
        "completed" => Ok(SessionStatus::Completed),
        "interrupted" => Ok(SessionStatus::Interrupted),
        other => Err(anyhow!("unknown session status {other}")),
    }
}

pub fn parse_source(value: &str) -> Result<LogSource> {
    match value {
        "tracker" => Ok(LogSource::Tracker),
        "api" => Ok(LogSource::Api),
        "safety_check" => Ok(LogSource::SafetyCheck),
        other => Err(anyhow!("unknown log source {other}")),
    }
}
