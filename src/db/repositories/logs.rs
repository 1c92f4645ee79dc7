use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{parse_datetime, parse_source},
    repositories::{increment_habit_minutes, increment_project_hours},
    Database,
};
use crate::models::{HabitLog, WorkLog};

fn row_to_work_log(row: &Row) -> Result<WorkLog> {
    let date: String = row.get("date")?;
    let created_at: String = row.get("created_at")?;
    let source: String = row.get("source")?;

    Ok(WorkLog {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        project_name: row.get("project_name")?,
        task_name: row.get("task_name")?,
        hours: row.get("hours")?,
        total_break_seconds: row.get("total_break_seconds")?,
        date: parse_datetime(&date, "date")?,
        source: parse_source(&source)?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

fn row_to_habit_log(row: &Row) -> Result<HabitLog> {
    let date: String = row.get("date")?;
    let created_at: String = row.get("created_at")?;
    let source: String = row.get("source")?;

    Ok(HabitLog {
        id: row.get("id")?,
        habit_id: row.get("habit_id")?,
        habit_name: row.get("habit_name")?,
        actual_minutes: row.get("actual_minutes")?,
        date: parse_datetime(&date, "date")?,
        source: parse_source(&source)?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Inserts a manual work log and charges the project budget in the same
    /// transaction.
    pub async fn create_work_log(&self, log: &WorkLog) -> Result<()> {
        let record = log.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO work_logs (id, project_id, project_name, task_name, hours,
                                        total_break_seconds, date, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.project_id,
                    record.project_name,
                    record.task_name,
                    record.hours,
                    record.total_break_seconds,
                    record.date.to_rfc3339(),
                    record.source.as_str(),
                    record.created_at.to_rfc3339(),
                ],
            )
            .context("failed to insert work log")?;
            increment_project_hours(&tx, &record.project_id, &record.project_name, record.hours)?;
            tx.commit().context("failed to commit work log create")?;
            Ok(())
        })
        .await
    }

    pub async fn create_habit_log(&self, log: &HabitLog) -> Result<()> {
        let record = log.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO habit_logs (id, habit_id, habit_name, actual_minutes, date,
                                         source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.habit_id,
                    record.habit_name,
                    record.actual_minutes,
                    record.date.to_rfc3339(),
                    record.source.as_str(),
                    record.created_at.to_rfc3339(),
                ],
            )
            .context("failed to insert habit log")?;
            increment_habit_minutes(&tx, &record.habit_id, &record.habit_name, record.actual_minutes)?;
            tx.commit().context("failed to commit habit log create")?;
            Ok(())
        })
        .await
    }

    /// Rewrites a work log's task name and hours, reconciling the project
    /// budget with the signed difference rather than overwriting it.
    /// Returns the applied delta, or None when the log does not exist.
    pub async fn edit_work_log(
        &self,
        log_id: &str,
        new_task_name: &str,
        new_hours: f64,
    ) -> Result<Option<f64>> {
        let log_id = log_id.to_string();
        let new_task_name = new_task_name.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<(f64, String, String)> = tx
                .query_row(
                    "SELECT hours, project_id, project_name FROM work_logs WHERE id = ?1",
                    params![log_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .context("failed to load work log for edit")?;

            let (old_hours, project_id, project_name) = match existing {
                Some(found) => found,
                None => return Ok(None),
            };

            tx.execute(
                "UPDATE work_logs SET task_name = ?1, hours = ?2 WHERE id = ?3",
                params![new_task_name, new_hours, log_id],
            )
            .context("failed to update work log")?;

            let diff = new_hours - old_hours;
            if diff.abs() > f64::EPSILON {
                increment_project_hours(&tx, &project_id, &project_name, diff)?;
            }

            tx.commit().context("failed to commit work log edit")?;
            Ok(Some(diff))
        })
        .await
    }

    /// Deletes a work log and refunds its hours from the project budget.
    pub async fn delete_work_log(&self, log_id: &str) -> Result<bool> {
        let log_id = log_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<(f64, String, String)> = tx
                .query_row(
                    "SELECT hours, project_id, project_name FROM work_logs WHERE id = ?1",
                    params![log_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .context("failed to load work log for delete")?;

            let (hours, project_id, project_name) = match existing {
                Some(found) => found,
                None => return Ok(false),
            };

            tx.execute("DELETE FROM work_logs WHERE id = ?1", params![log_id])
                .context("failed to delete work log")?;
            increment_project_hours(&tx, &project_id, &project_name, -hours)?;

            tx.commit().context("failed to commit work log delete")?;
            Ok(true)
        })
        .await
    }

    pub async fn delete_habit_log(&self, log_id: &str) -> Result<bool> {
        let log_id = log_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<(i64, String, String)> = tx
                .query_row(
                    "SELECT actual_minutes, habit_id, habit_name FROM habit_logs WHERE id = ?1",
                    params![log_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .context("failed to load habit log for delete")?;

            let (minutes, habit_id, habit_name) = match existing {
                Some(found) => found,
                None => return Ok(false),
            };

            tx.execute("DELETE FROM habit_logs WHERE id = ?1", params![log_id])
                .context("failed to delete habit log")?;
            increment_habit_minutes(&tx, &habit_id, &habit_name, -minutes)?;

            tx.commit().context("failed to commit habit log delete")?;
            Ok(true)
        })
        .await
    }

    pub async fn get_work_log(&self, log_id: &str) -> Result<Option<WorkLog>> {
        let log_id = log_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, project_name, task_name, hours, total_break_seconds,
                        date, source, created_at
                 FROM work_logs
                 WHERE id = ?1",
            )?;
            stmt.query_row(params![log_id], |row| Ok(row_to_work_log(row)))
                .optional()?
                .transpose()
        })
        .await
    }

    pub async fn work_logs_since(&self, start: DateTime<Utc>) -> Result<Vec<WorkLog>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, project_name, task_name, hours, total_break_seconds,
                        date, source, created_at
                 FROM work_logs
                 WHERE date >= ?1
                 ORDER BY date",
            )?;
            let rows = stmt.query_map(params![start.to_rfc3339()], |row| Ok(row_to_work_log(row)))?;

            let mut logs = Vec::new();
            for row in rows {
                logs.push(row??);
            }
            Ok(logs)
        })
        .await
    }

    pub async fn habit_logs_since(&self, start: DateTime<Utc>) -> Result<Vec<HabitLog>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, habit_id, habit_name, actual_minutes, date, source, created_at
                 FROM habit_logs
                 WHERE date >= ?1
                 ORDER BY date",
            )?;
            let rows =
                stmt.query_map(params![start.to_rfc3339()], |row| Ok(row_to_habit_log(row)))?;

            let mut logs = Vec::new();
            for row in rows {
                logs.push(row??);
            }
            Ok(logs)
        })
        .await
    }
}
