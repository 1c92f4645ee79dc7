use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::Database;
use crate::models::{Habit, Project};

/// Applies a signed delta to a project's spent-hours counter. Upsert keeps
/// the increment atomic at the SQL level; a read-modify-write here would
/// lose updates under concurrent log edits.
pub(crate) fn increment_project_hours(
    conn: &Connection,
    project_id: &str,
    project_name: &str,
    delta_hours: f64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO projects (id, name, spent_hours)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (id) DO UPDATE SET spent_hours = spent_hours + excluded.spent_hours",
        params![project_id, project_name, delta_hours],
    )
    .with_context(|| format!("failed to update spent_hours for project {project_id}"))?;
    Ok(())
}

pub(crate) fn increment_habit_minutes(
    conn: &Connection,
    habit_id: &str,
    habit_name: &str,
    delta_minutes: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO habits (id, name, total_actual_minutes)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (id) DO UPDATE
             SET total_actual_minutes = total_actual_minutes + excluded.total_actual_minutes",
        params![habit_id, habit_name, delta_minutes],
    )
    .with_context(|| format!("failed to update total_actual_minutes for habit {habit_id}"))?;
    Ok(())
}

impl Database {
    pub async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        let project_id = project_id.to_string();
        self.execute(move |conn| {
            let project = conn
                .query_row(
                    "SELECT id, name, spent_hours FROM projects WHERE id = ?1",
                    params![project_id],
                    |row| {
                        Ok(Project {
                            id: row.get("id")?,
                            name: row.get("name")?,
                            spent_hours: row.get("spent_hours")?,
                        })
                    },
                )
                .optional()
                .context("failed to query project")?;
            Ok(project)
        })
        .await
    }

    pub async fn get_habit(&self, habit_id: &str) -> Result<Option<Habit>> {
        let habit_id = habit_id.to_string();
        self.execute(move |conn| {
            let habit = conn
                .query_row(
                    "SELECT id, name, total_actual_minutes FROM habits WHERE id = ?1",
                    params![habit_id],
                    |row| {
                        Ok(Habit {
                            id: row.get("id")?,
                            name: row.get("name")?,
                            total_actual_minutes: row.get("total_actual_minutes")?,
                        })
                    },
                )
                .optional()
                .context("failed to query habit")?;
            Ok(habit)
        })
        .await
    }
}
