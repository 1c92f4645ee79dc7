use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::db::{repositories::StopSummary, Database};
use crate::error::ApiError;
use crate::models::{BreakInterval, ItemType, LogSource, SessionStatus, WorkSession};

/// Single writer for the session lifecycle. Every mutation goes through the
/// store's one worker thread, so the at-most-one-open-session invariant holds
/// even when two clients race on start().
#[derive(Clone)]
pub struct SessionController {
    db: Database,
}

impl SessionController {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Starts tracking against a project or habit. Any session still holding
    /// the open slot is interrupted first; its partial time is discarded
    /// without a log, last write wins.
    pub async fn start(
        &self,
        item_id: &str,
        item_type: ItemType,
        item_name: Option<String>,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<String, ApiError> {
        self.start_at(item_id, item_type, item_name, start_time, Utc::now())
            .await
    }

    pub async fn start_at(
        &self,
        item_id: &str,
        item_type: ItemType,
        item_name: Option<String>,
        start_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<String, ApiError> {
        if item_id.is_empty() {
            return Err(ApiError::BadRequest("Missing itemId".into()));
        }

        let session = WorkSession {
            id: Uuid::new_v4().to_string(),
            status: SessionStatus::Active,
            start_time: start_time.unwrap_or(now),
            last_pause_time: None,
            breaks: Vec::new(),
            task_name: item_name.unwrap_or_else(|| "Unknown Task".into()),
            project_id: (item_type == ItemType::Project).then(|| item_id.to_string()),
            habit_id: (item_type == ItemType::Habit).then(|| item_id.to_string()),
            end_time: None,
            duration_seconds: None,
            created_at: now,
            updated_at: now,
        };

        let interrupted = self
            .db
            .start_session(&session)
            .await
            .context("failed to start session")?;
        if interrupted > 0 {
            warn!(
                "Interrupted {interrupted} open session(s) to start {}; their partial time is discarded",
                session.id
            );
        }
        info!("Started session {} for '{}'", session.id, session.task_name);

        Ok(session.id)
    }

    pub async fn pause(&self) -> Result<(), ApiError> {
        self.pause_at(Utc::now()).await
    }

    pub async fn pause_at(&self, now: DateTime<Utc>) -> Result<(), ApiError> {
        let session = self
            .db
            .find_active_session()
            .await
            .context("failed to look up active session")?
            .ok_or_else(|| ApiError::NotFound("No active session".into()))?;

        self.db
            .mark_session_paused(&session.id, now)
            .await
            .context("failed to pause session")?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<BreakInterval, ApiError> {
        self.resume_at(Utc::now()).await
    }

    pub async fn resume_at(&self, now: DateTime<Utc>) -> Result<BreakInterval, ApiError> {
        let session = self
            .db
            .find_paused_session()
            .await
            .context("failed to look up paused session")?
            .ok_or_else(|| ApiError::NotFound("No paused session".into()))?;

        let pause_start = session.last_pause_time.unwrap_or(now);
        let brk = BreakInterval {
            start: pause_start,
            duration_seconds: (now - pause_start).num_seconds().max(0),
        };

        self.db
            .mark_session_resumed(&session.id, brk.clone(), now)
            .await
            .context("failed to resume session")?;
        Ok(brk)
    }

    pub async fn stop(&self, source: LogSource) -> Result<StopSummary, ApiError> {
        self.stop_at(Utc::now(), source).await
    }

    /// Finalizes the open session (active or paused). Calling this when no
    /// session holds the open slot returns NotFound and writes nothing, which
    /// is what makes repeated auto-stops harmless.
    pub async fn stop_at(
        &self,
        now: DateTime<Utc>,
        source: LogSource,
    ) -> Result<StopSummary, ApiError> {
        let summary = self
            .db
            .stop_open_session(now, source)
            .await
            .context("failed to stop session")?
            .ok_or_else(|| ApiError::NotFound("No session found to stop".into()))?;

        info!(
            "Stopped session {}: {}s focused, {}s on break",
            summary.session.id, summary.net_seconds, summary.total_break_seconds
        );
        Ok(summary)
    }

    /// Read-only view of the currently active session, if any.
    pub async fn get_active(&self) -> Result<Option<WorkSession>, ApiError> {
        let session = self
            .db
            .find_active_session()
            .await
            .context("failed to look up active session")?;
        Ok(session)
    }

    /// The session holding the open slot, active or paused. The scheduler's
    /// status check watches this.
    pub async fn get_open(&self) -> Result<Option<WorkSession>, ApiError> {
        let session = self
            .db
            .find_open_session()
            .await
            .context("failed to look up open session")?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogSource;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn open_db(dir: &TempDir) -> Database {
        Database::new(dir.path().join("tracker.sqlite3")).unwrap()
    }

    #[tokio::test]
    async fn start_creates_active_session_with_given_start_time() {
        let dir = TempDir::new().unwrap();
        let controller = SessionController::new(open_db(&dir));

        let id = controller
            .start_at(
                "p1",
                ItemType::Project,
                Some("Write spec".into()),
                Some(at(1)),
                at(1),
            )
            .await
            .unwrap();

        let session = controller.get_active().await.unwrap().unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.start_time, at(1));
        assert_eq!(session.project_id.as_deref(), Some("p1"));
        assert_eq!(session.habit_id, None);
    }

    #[tokio::test]
    async fn start_rejects_empty_item_id() {
        let dir = TempDir::new().unwrap();
        let controller = SessionController::new(open_db(&dir));

        let err = controller
            .start_at("", ItemType::Project, None, None, at(0))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn second_start_interrupts_first_without_logging() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let controller = SessionController::new(db.clone());

        let first = controller
            .start_at("p1", ItemType::Project, None, Some(at(0)), at(0))
            .await
            .unwrap();
        let second = controller
            .start_at("p2", ItemType::Project, None, Some(at(600)), at(600))
            .await
            .unwrap();

        let old = db.get_session(&first).await.unwrap().unwrap();
        assert_eq!(old.status, SessionStatus::Interrupted);
        assert_eq!(old.end_time, Some(at(600)));

        let active = controller.get_active().await.unwrap().unwrap();
        assert_eq!(active.id, second);

        // Interruption is silent: no work log, no budget charge.
        assert!(db.work_logs_since(at(0)).await.unwrap().is_empty());
        assert!(db.get_project("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pause_resume_records_completed_break_only() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let controller = SessionController::new(db.clone());

        let id = controller
            .start_at("p1", ItemType::Project, None, Some(at(0)), at(0))
            .await
            .unwrap();

        controller.pause_at(at(1000)).await.unwrap();
        let paused = db.get_session(&id).await.unwrap().unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        assert_eq!(paused.last_pause_time, Some(at(1000)));
        assert!(paused.breaks.is_empty());

        let brk = controller.resume_at(at(1900)).await.unwrap();
        assert_eq!(brk.start, at(1000));
        assert_eq!(brk.duration_seconds, 900);

        let resumed = db.get_session(&id).await.unwrap().unwrap();
        assert_eq!(resumed.status, SessionStatus::Active);
        assert_eq!(resumed.last_pause_time, None);
        assert_eq!(resumed.breaks.len(), 1);
    }

    #[tokio::test]
    async fn pause_without_active_session_is_not_found() {
        let dir = TempDir::new().unwrap();
        let controller = SessionController::new(open_db(&dir));
        assert_eq!(controller.pause_at(at(0)).await.unwrap_err().status_code(), 404);
        assert_eq!(controller.resume_at(at(0)).await.unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn stop_persists_net_duration_and_charges_budget() {
        // Scenario: start at 0, pause 1000..1900, stop at 2900. Wall clock is
        // 1900s but only 1000s were focused.
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let controller = SessionController::new(db.clone());

        let id = controller
            .start_at(
                "p1",
                ItemType::Project,
                Some("Write spec".into()),
                Some(at(0)),
                at(0),
            )
            .await
            .unwrap();
        controller.pause_at(at(1000)).await.unwrap();
        controller.resume_at(at(1900)).await.unwrap();

        let summary = controller.stop_at(at(2900), LogSource::Tracker).await.unwrap();
        assert_eq!(summary.net_seconds, 1000);
        assert_eq!(summary.total_break_seconds, 900);

        let session = db.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.duration_seconds, Some(1000));
        assert_eq!(session.raw_elapsed_seconds(at(2900)), 1900);

        let logs = db.work_logs_since(at(0)).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!((logs[0].hours - 1000.0 / 3600.0).abs() < 1e-9);
        assert_eq!(logs[0].source, LogSource::Tracker);

        let project = db.get_project("p1").await.unwrap().unwrap();
        assert!((project.spent_hours - 1000.0 / 3600.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stop_while_paused_finalizes_pending_break() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let controller = SessionController::new(db.clone());

        let id = controller
            .start_at("h1", ItemType::Habit, Some("Reading".into()), Some(at(0)), at(0))
            .await
            .unwrap();
        controller.pause_at(at(600)).await.unwrap();

        let summary = controller.stop_at(at(900), LogSource::Tracker).await.unwrap();
        assert_eq!(summary.total_break_seconds, 300);
        assert_eq!(summary.net_seconds, 600);

        let session = db.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.breaks.len(), 1);
        assert_eq!(session.breaks[0].duration_seconds, 300);

        let logs = db.habit_logs_since(at(0)).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].actual_minutes, 10);

        let habit = db.get_habit("h1").await.unwrap().unwrap();
        assert_eq!(habit.total_actual_minutes, 10);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let controller = SessionController::new(db.clone());

        controller
            .start_at("p1", ItemType::Project, None, Some(at(0)), at(0))
            .await
            .unwrap();
        controller.stop_at(at(100), LogSource::Tracker).await.unwrap();

        // Second stop finds nothing and must not double-log.
        let err = controller.stop_at(at(200), LogSource::Tracker).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(db.work_logs_since(at(0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn editing_log_hours_applies_signed_budget_delta() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);

        let log = crate::models::WorkLog {
            id: "l1".into(),
            project_id: "p1".into(),
            project_name: "NorthStar".into(),
            task_name: "Deep work".into(),
            hours: 2.0,
            total_break_seconds: 0,
            date: at(0),
            source: LogSource::Api,
            created_at: at(0),
        };
        db.create_work_log(&log).await.unwrap();
        assert!((db.get_project("p1").await.unwrap().unwrap().spent_hours - 2.0).abs() < 1e-9);

        let diff = db.edit_work_log("l1", "Deep work", 3.5).await.unwrap().unwrap();
        assert!((diff - 1.5).abs() < 1e-9);

        let project = db.get_project("p1").await.unwrap().unwrap();
        assert!((project.spent_hours - 3.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn deleting_log_refunds_budget() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);

        let log = crate::models::WorkLog {
            id: "l1".into(),
            project_id: "p1".into(),
            project_name: "NorthStar".into(),
            task_name: "Deep work".into(),
            hours: 2.0,
            total_break_seconds: 0,
            date: at(0),
            source: LogSource::Api,
            created_at: at(0),
        };
        db.create_work_log(&log).await.unwrap();
        assert!(db.delete_work_log("l1").await.unwrap());

        let project = db.get_project("p1").await.unwrap().unwrap();
        assert!(project.spent_hours.abs() < 1e-9);
        assert!(!db.delete_work_log("l1").await.unwrap());
    }
}
