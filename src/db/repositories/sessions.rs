use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime, parse_status},
    repositories::{increment_habit_minutes, increment_project_hours},
    Database,
};
use crate::models::{BreakInterval, LogSource, SessionStatus, WorkSession};

/// Result of a successful stop: the finalized session plus the log entry it
/// produced, if any.
#[derive(Debug, Clone)]
pub struct StopSummary {
    pub session: WorkSession,
    pub log_id: Option<String>,
    pub net_seconds: i64,
    pub total_break_seconds: i64,
}

fn row_to_session(row: &Row) -> Result<WorkSession> {
    let start_time: String = row.get("start_time")?;
    let last_pause_time: Option<String> = row.get("last_pause_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let status: String = row.get("status")?;

    Ok(WorkSession {
        id: row.get("id")?,
        status: parse_status(&status)?,
        start_time: parse_datetime(&start_time, "start_time")?,
        last_pause_time: parse_optional_datetime(last_pause_time, "last_pause_time")?,
        breaks: Vec::new(),
        task_name: row.get("task_name")?,
        project_id: row.get("project_id")?,
        habit_id: row.get("habit_id")?,
        end_time: parse_optional_datetime(end_time, "end_time")?,
        duration_seconds: row.get("duration_seconds")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn load_breaks(conn: &Connection, session_id: &str) -> Result<Vec<BreakInterval>> {
    let mut stmt = conn.prepare(
        "SELECT start_at, duration_seconds FROM breaks WHERE session_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        let start_at: String = row.get("start_at")?;
        let duration_seconds: i64 = row.get("duration_seconds")?;
        Ok((start_at, duration_seconds))
    })?;

    let mut breaks = Vec::new();
    for row in rows {
        let (start_at, duration_seconds) = row?;
        breaks.push(BreakInterval {
            start: parse_datetime(&start_at, "break.start_at")?,
            duration_seconds,
        });
    }
    Ok(breaks)
}

fn find_by_status(conn: &Connection, status: SessionStatus) -> Result<Option<WorkSession>> {
    let mut stmt = conn.prepare(
        "SELECT id, status, start_time, last_pause_time, task_name, project_id, habit_id,
                end_time, duration_seconds, created_at, updated_at
         FROM sessions
         WHERE status = ?1
         ORDER BY start_time DESC
         LIMIT 1",
    )?;

    let mut rows = stmt.query(params![status.as_str()])?;
    let session = match rows.next()? {
        Some(row) => Some(row_to_session(row)?),
        None => None,
    };

    match session {
        Some(mut session) => {
            session.breaks = load_breaks(conn, &session.id)?;
            Ok(Some(session))
        }
        None => Ok(None),
    }
}

fn insert_break(conn: &Connection, session_id: &str, brk: &BreakInterval) -> Result<()> {
    conn.execute(
        "INSERT INTO breaks (session_id, start_at, duration_seconds) VALUES (?1, ?2, ?3)",
        params![session_id, brk.start.to_rfc3339(), brk.duration_seconds],
    )
    .context("failed to insert break")?;
    Ok(())
}

impl Database {
    /// Interrupts whatever session currently holds the open slot and inserts
    /// the new one, in a single transaction. Returns the number of sessions
    /// that were interrupted (0 or 1 unless the invariant was already broken).
    pub async fn start_session(&self, session: &WorkSession) -> Result<usize> {
        let record = session.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let interrupted = tx
                .execute(
                    "UPDATE sessions
                     SET status = 'interrupted', end_time = ?1, updated_at = ?1
                     WHERE status IN ('active', 'paused')",
                    params![record.created_at.to_rfc3339()],
                )
                .context("failed to interrupt open sessions")?;

            tx.execute(
                "INSERT INTO sessions (id, status, start_time, last_pause_time, task_name,
                                       project_id, habit_id, end_time, duration_seconds,
                                       created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.id,
                    record.status.as_str(),
                    record.start_time.to_rfc3339(),
                    record.last_pause_time.as_ref().map(|dt| dt.to_rfc3339()),
                    record.task_name,
                    record.project_id,
                    record.habit_id,
                    record.end_time.as_ref().map(|dt| dt.to_rfc3339()),
                    record.duration_seconds,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .context("failed to insert session")?;

            tx.commit().context("failed to commit session start")?;
            Ok(interrupted)
        })
        .await
    }

    pub async fn find_active_session(&self) -> Result<Option<WorkSession>> {
        self.execute(|conn| find_by_status(conn, SessionStatus::Active))
            .await
    }

    pub async fn find_paused_session(&self) -> Result<Option<WorkSession>> {
        self.execute(|conn| find_by_status(conn, SessionStatus::Paused))
            .await
    }

    /// The session holding the open slot: active first, then paused. stop()
    /// accepts either, matching the dashboard's stop handler.
    pub async fn find_open_session(&self) -> Result<Option<WorkSession>> {
        self.execute(|conn| {
            if let Some(session) = find_by_status(conn, SessionStatus::Active)? {
                return Ok(Some(session));
            }
            find_by_status(conn, SessionStatus::Paused)
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<WorkSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, status, start_time, last_pause_time, task_name, project_id, habit_id,
                        end_time, duration_seconds, created_at, updated_at
                 FROM sessions
                 WHERE id = ?1",
            )?;

            let session = stmt
                .query_row(params![session_id], |row| Ok(row_to_session(row)))
                .optional()?
                .transpose()?;

            match session {
                Some(mut session) => {
                    session.breaks = load_breaks(conn, &session.id)?;
                    Ok(Some(session))
                }
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn mark_session_paused(
        &self,
        session_id: &str,
        pause_time: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = 'paused', last_pause_time = ?1, updated_at = ?1
                 WHERE id = ?2",
                params![pause_time.to_rfc3339(), session_id],
            )
            .context("failed to mark session paused")?;
            Ok(())
        })
        .await
    }

    /// Closes the open pause: appends the completed break and flips the
    /// session back to active with the pause marker cleared.
    pub async fn mark_session_resumed(
        &self,
        session_id: &str,
        brk: BreakInterval,
        resumed_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            insert_break(&tx, &session_id, &brk)?;
            tx.execute(
                "UPDATE sessions
                 SET status = 'active', last_pause_time = NULL, updated_at = ?1
                 WHERE id = ?2",
                params![resumed_at.to_rfc3339(), session_id],
            )
            .context("failed to mark session resumed")?;
            tx.commit().context("failed to commit resume")?;
            Ok(())
        })
        .await
    }

    /// Finalizes the open session: closes a pending break if stopped while
    /// paused, persists the net duration, appends the derived work/habit log,
    /// and applies the budget increment. One transaction, so the log and the
    /// counter cannot fall out of sync.
    pub async fn stop_open_session(
        &self,
        end_time: DateTime<Utc>,
        source: LogSource,
    ) -> Result<Option<StopSummary>> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let open = match find_by_status(&tx, SessionStatus::Active)? {
                Some(session) => Some(session),
                None => find_by_status(&tx, SessionStatus::Paused)?,
            };
            let mut session = match open {
                Some(session) => session,
                None => return Ok(None),
            };

            // Stopped mid-pause: the pending break runs up to end_time.
            if session.status == SessionStatus::Paused {
                if let Some(pause_start) = session.last_pause_time {
                    let final_break = BreakInterval {
                        start: pause_start,
                        duration_seconds: (end_time - pause_start).num_seconds().max(0),
                    };
                    insert_break(&tx, &session.id, &final_break)?;
                    session.breaks.push(final_break);
                }
            }

            let total_break_seconds = session.total_break_seconds();
            let wall_seconds = (end_time - session.start_time).num_seconds().max(0);
            let net_seconds = (wall_seconds - total_break_seconds).max(0);

            tx.execute(
                "UPDATE sessions
                 SET status = 'completed', end_time = ?1, duration_seconds = ?2,
                     last_pause_time = NULL, updated_at = ?1
                 WHERE id = ?3",
                params![end_time.to_rfc3339(), net_seconds, session.id],
            )
            .context("failed to finalize session")?;

            session.status = SessionStatus::Completed;
            session.end_time = Some(end_time);
            session.duration_seconds = Some(net_seconds);
            session.last_pause_time = None;
            session.updated_at = end_time;

            let log_id = if let Some(project_id) = session.project_id.clone() {
                let log_id = Uuid::new_v4().to_string();
                let hours = net_seconds as f64 / 3600.0;
                tx.execute(
                    "INSERT INTO work_logs (id, project_id, project_name, task_name, hours,
                                            total_break_seconds, date, source, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        log_id,
                        project_id,
                        session.task_name,
                        session.task_name,
                        hours,
                        total_break_seconds,
                        end_time.to_rfc3339(),
                        source.as_str(),
                        end_time.to_rfc3339(),
                    ],
                )
                .context("failed to insert work log")?;
                increment_project_hours(&tx, &project_id, &session.task_name, hours)?;
                Some(log_id)
            } else if let Some(habit_id) = session.habit_id.clone() {
                let log_id = Uuid::new_v4().to_string();
                let minutes = net_seconds / 60;
                tx.execute(
                    "INSERT INTO habit_logs (id, habit_id, habit_name, actual_minutes, date,
                                             source, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        log_id,
                        habit_id,
                        session.task_name,
                        minutes,
                        end_time.to_rfc3339(),
                        source.as_str(),
                        end_time.to_rfc3339(),
                    ],
                )
                .context("failed to insert habit log")?;
                increment_habit_minutes(&tx, &habit_id, &session.task_name, minutes)?;
                Some(log_id)
            } else {
                None
            };

            tx.commit().context("failed to commit session stop")?;

            Ok(Some(StopSummary {
                session,
                log_id,
                net_seconds,
                total_break_seconds,
            }))
        })
        .await
    }
}
