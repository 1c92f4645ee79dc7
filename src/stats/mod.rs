use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;

/// Daily totals against the configured target. Recomputed from the logs on
/// every request; nothing here is cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DailyStats {
    pub date: DateTime<Utc>,
    pub total_hours: f64,
    pub work_hours: f64,
    pub habit_hours: f64,
    pub daily_target: f64,
    pub progress_percent: f64,
    pub projects: HashMap<String, f64>,
}

pub fn progress_percent(total_hours: f64, target_hours: f64) -> f64 {
    if target_hours <= 0.0 {
        return 0.0;
    }
    (total_hours / target_hours * 100.0).min(100.0)
}

/// Sums work-log hours and habit-log minutes recorded since `start_of_day`.
pub async fn daily_stats(
    db: &Database,
    start_of_day: DateTime<Utc>,
    daily_target: f64,
) -> Result<DailyStats> {
    let work_logs = db.work_logs_since(start_of_day).await?;
    let habit_logs = db.habit_logs_since(start_of_day).await?;

    let mut work_hours = 0.0;
    let mut projects: HashMap<String, f64> = HashMap::new();
    for log in &work_logs {
        work_hours += log.hours;
        *projects.entry(log.project_id.clone()).or_insert(0.0) += log.hours;
    }

    let habit_hours: f64 = habit_logs
        .iter()
        .map(|log| log.actual_minutes as f64 / 60.0)
        .sum();

    let total_hours = work_hours + habit_hours;

    Ok(DailyStats {
        date: start_of_day,
        total_hours,
        work_hours,
        habit_hours,
        daily_target,
        progress_percent: progress_percent(total_hours, daily_target),
        projects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HabitLog, LogSource, WorkLog};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn progress_clamps_at_one_hundred() {
        assert_eq!(progress_percent(4.0, 8.0), 50.0);
        assert_eq!(progress_percent(12.0, 8.0), 100.0);
        assert_eq!(progress_percent(1.0, 0.0), 0.0);
    }

    #[tokio::test]
    async fn sums_work_and_habit_logs_from_start_of_day() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("tracker.sqlite3")).unwrap();

        let mk_work = |id: &str, date: DateTime<Utc>, hours: f64| WorkLog {
            id: id.into(),
            project_id: "p1".into(),
            project_name: "NorthStar".into(),
            task_name: "Deep work".into(),
            hours,
            total_break_seconds: 0,
            date,
            source: LogSource::Api,
            created_at: date,
        };

        // Yesterday's log must not count.
        db.create_work_log(&mk_work("old", at(1_000), 5.0)).await.unwrap();
        db.create_work_log(&mk_work("l1", at(90_000), 2.0)).await.unwrap();
        db.create_work_log(&mk_work("l2", at(95_000), 1.5)).await.unwrap();

        db.create_habit_log(&HabitLog {
            id: "h1".into(),
            habit_id: "habit".into(),
            habit_name: "Reading".into(),
            actual_minutes: 30,
            date: at(91_000),
            source: LogSource::Api,
            created_at: at(91_000),
        })
        .await
        .unwrap();

        let stats = daily_stats(&db, at(86_400), 8.0).await.unwrap();
        assert!((stats.work_hours - 3.5).abs() < 1e-9);
        assert!((stats.habit_hours - 0.5).abs() < 1e-9);
        assert!((stats.total_hours - 4.0).abs() < 1e-9);
        assert!((stats.progress_percent - 50.0).abs() < 1e-9);
        assert!((stats.projects["p1"] - 3.5).abs() < 1e-9);
    }
}
