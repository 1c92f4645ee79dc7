use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::db::Database;
use crate::error::ApiError;
use crate::models::{ItemType, LogSource, WorkSession};
use crate::session::SessionController;
use crate::stats;

/// JSON reply plus the HTTP status the host should answer with.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

fn ok(body: Value) -> HttpReply {
    HttpReply { status: 200, body }
}

fn error_reply(err: ApiError) -> HttpReply {
    HttpReply {
        status: err.status_code(),
        body: json!({ "error": err.to_string() }),
    }
}

/// Timestamps cross the wire as epoch milliseconds; everything internal is
/// `DateTime<Utc>`. This is the one place the conversion happens.
fn from_epoch_ms(ms: i64, field: &str) -> Result<DateTime<Utc>, ApiError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid {field}")))
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    Get,
    Start,
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub item_id: String,
    pub item_type: ItemType,
    pub item_name: Option<String>,
    /// Epoch milliseconds; defaults to the server clock.
    pub start_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionRequest {
    pub action: SessionAction,
    pub payload: Option<StartPayload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BreakView {
    start: i64,
    duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    id: String,
    status: String,
    start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_pause_time: Option<i64>,
    breaks: Vec<BreakView>,
    task_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    habit_id: Option<String>,
    /// Focused seconds as of `now`; what the dashboard displays.
    net_elapsed_seconds: i64,
}

impl SessionView {
    fn new(session: &WorkSession, now: DateTime<Utc>) -> Self {
        Self {
            id: session.id.clone(),
            status: session.status.as_str().into(),
            start_time: session.start_time.timestamp_millis(),
            last_pause_time: session.last_pause_time.map(|dt| dt.timestamp_millis()),
            breaks: session
                .breaks
                .iter()
                .map(|b| BreakView {
                    start: b.start.timestamp_millis(),
                    duration_seconds: b.duration_seconds,
                })
                .collect(),
            task_name: session.task_name.clone(),
            project_id: session.project_id.clone(),
            habit_id: session.habit_id.clone(),
            net_elapsed_seconds: session.net_elapsed_seconds(now),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    WorkLog,
    HabitLog,
}

/// Fields of a manual log create; which ones are required depends on `type`,
/// mirroring the dashboard's payloads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogData {
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub habit_id: Option<String>,
    pub habit_name: Option<String>,
    pub hours: Option<f64>,
    pub actual_minutes: Option<i64>,
    pub task_name: Option<String>,
    /// Epoch milliseconds.
    pub date: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLogRequest {
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub data: LogData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditLogRequest {
    pub log_id: String,
    pub new_task_name: Option<String>,
    pub new_duration: f64,
    #[serde(rename = "type")]
    pub log_type: Option<LogType>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLogRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
}

/// The serverless endpoints, minus HTTP: each handler takes the decoded
/// request and returns the reply envelope. A thin host adapter maps these to
/// actual routes.
#[derive(Clone)]
pub struct Api {
    controller: SessionController,
    db: Database,
    config: TrackerConfig,
}

impl Api {
    pub fn new(controller: SessionController, config: TrackerConfig) -> Self {
        let db = controller.database().clone();
        Self {
            controller,
            db,
            config,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// `GET ?action=get` / `POST {action, payload}` on the session endpoint.
    pub async fn handle_session(&self, request: SessionRequest) -> HttpReply {
        match self.dispatch_session(request).await {
            Ok(reply) => reply,
            Err(err) => error_reply(err),
        }
    }

    async fn dispatch_session(&self, request: SessionRequest) -> Result<HttpReply, ApiError> {
        match request.action {
            SessionAction::Get => {
                let session = self.controller.get_active().await?;
                Ok(ok(match session {
                    Some(session) => json!({
                        "active": true,
                        "session": SessionView::new(&session, Utc::now()),
                    }),
                    None => json!({ "active": false }),
                }))
            }
            SessionAction::Start => {
                let payload = request
                    .payload
                    .ok_or_else(|| ApiError::BadRequest("Missing payload".into()))?;
                let start_time = payload
                    .start_time
                    .map(|ms| from_epoch_ms(ms, "startTime"))
                    .transpose()?;
                let session_id = self
                    .controller
                    .start(
                        &payload.item_id,
                        payload.item_type,
                        payload.item_name,
                        start_time,
                    )
                    .await?;
                Ok(ok(json!({ "success": true, "sessionId": session_id })))
            }
            SessionAction::Pause => {
                self.controller.pause().await?;
                Ok(ok(json!({ "success": true, "status": "paused" })))
            }
            SessionAction::Resume => {
                let brk = self.controller.resume().await?;
                Ok(ok(json!({
                    "success": true,
                    "status": "active",
                    "breakAdded": {
                        "start": brk.start.timestamp_millis(),
                        "durationSeconds": brk.duration_seconds,
                    },
                })))
            }
            SessionAction::Stop => {
                let summary = self.controller.stop(LogSource::Tracker).await?;
                Ok(ok(json!({
                    "success": true,
                    "duration": summary.net_seconds,
                    "breaks": summary.total_break_seconds,
                })))
            }
        }
    }

    /// `POST {type, data}` on the time-log endpoint.
    pub async fn handle_create_log(&self, request: CreateLogRequest) -> HttpReply {
        match self.dispatch_create_log(request).await {
            Ok(reply) => reply,
            Err(err) => error_reply(err),
        }
    }

    async fn dispatch_create_log(&self, request: CreateLogRequest) -> Result<HttpReply, ApiError> {
        let now = Utc::now();
        let data = request.data;

        match request.log_type {
            LogType::WorkLog => {
                let (project_id, hours) = match (data.project_id, data.hours) {
                    (Some(project_id), Some(hours)) => (project_id, hours),
                    _ => {
                        return Err(ApiError::BadRequest(
                            "Missing required work_log fields".into(),
                        ))
                    }
                };
                let date = data
                    .date
                    .map(|ms| from_epoch_ms(ms, "date"))
                    .transpose()?
                    .unwrap_or(now);

                let log = crate::models::WorkLog {
                    id: Uuid::new_v4().to_string(),
                    project_id,
                    project_name: data.project_name.unwrap_or_else(|| "Unknown".into()),
                    task_name: data.task_name.unwrap_or_default(),
                    hours,
                    total_break_seconds: 0,
                    date,
                    source: LogSource::Api,
                    created_at: now,
                };
                self.db.create_work_log(&log).await?;
                Ok(ok(json!({ "success": true, "id": log.id })))
            }
            LogType::HabitLog => {
                let (habit_id, actual_minutes) = match (data.habit_id, data.actual_minutes) {
                    (Some(habit_id), Some(minutes)) => (habit_id, minutes),
                    _ => {
                        return Err(ApiError::BadRequest(
                            "Missing required habit_log fields".into(),
                        ))
                    }
                };

                let log = crate::models::HabitLog {
                    id: Uuid::new_v4().to_string(),
                    habit_id,
                    habit_name: data.habit_name.unwrap_or_else(|| "Unknown".into()),
                    actual_minutes,
                    date: now,
                    source: LogSource::Api,
                    created_at: now,
                };
                self.db.create_habit_log(&log).await?;
                Ok(ok(json!({ "success": true, "id": log.id })))
            }
        }
    }

    /// `PATCH` / `POST ?action=edit` on the time-log endpoint. Reconciles the
    /// project budget with the signed hours delta.
    pub async fn handle_edit_log(&self, request: EditLogRequest) -> HttpReply {
        match self.dispatch_edit_log(request).await {
            Ok(reply) => reply,
            Err(err) => error_reply(err),
        }
    }

    async fn dispatch_edit_log(&self, request: EditLogRequest) -> Result<HttpReply, ApiError> {
        if request.log_id.is_empty() {
            return Err(ApiError::BadRequest("Missing log ID".into()));
        }
        if request.log_type.unwrap_or(LogType::WorkLog) != LogType::WorkLog {
            return Err(ApiError::BadRequest(
                "Edit not implemented for this type".into(),
            ));
        }
        if !request.new_duration.is_finite() {
            return Err(ApiError::BadRequest("Invalid duration".into()));
        }

        let existing = self
            .db
            .get_work_log(&request.log_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Log not found".into()))?;
        let task_name = request.new_task_name.unwrap_or(existing.task_name);

        let diff = self
            .db
            .edit_work_log(&request.log_id, &task_name, request.new_duration)
            .await?
            .ok_or_else(|| ApiError::NotFound("Log not found".into()))?;

        Ok(ok(json!({
            "success": true,
            "message": "Log updated",
            "diff": diff,
        })))
    }

    /// `DELETE {id, type}` on the time-log endpoint. Refunds the budget.
    pub async fn handle_delete_log(&self, request: DeleteLogRequest) -> HttpReply {
        match self.dispatch_delete_log(request).await {
            Ok(reply) => reply,
            Err(err) => error_reply(err),
        }
    }

    async fn dispatch_delete_log(&self, request: DeleteLogRequest) -> Result<HttpReply, ApiError> {
        if request.id.is_empty() {
            return Err(ApiError::BadRequest("Missing log ID".into()));
        }

        let deleted = match request.log_type {
            LogType::WorkLog => self.db.delete_work_log(&request.id).await?,
            LogType::HabitLog => self.db.delete_habit_log(&request.id).await?,
        };
        if !deleted {
            return Err(ApiError::NotFound("Log not found".into()));
        }
        Ok(ok(json!({ "success": true })))
    }

    /// `GET ?action=daily-stats`. `date` is epoch milliseconds; defaults to
    /// the start of today, local time.
    pub async fn handle_daily_stats(&self, date: Option<i64>) -> HttpReply {
        match self.dispatch_daily_stats(date).await {
            Ok(reply) => reply,
            Err(err) => error_reply(err),
        }
    }

    async fn dispatch_daily_stats(&self, date: Option<i64>) -> Result<HttpReply, ApiError> {
        let start_of_day = match date {
            Some(ms) => from_epoch_ms(ms, "date")?,
            None => start_of_local_day(Utc::now()),
        };

        let stats = stats::daily_stats(&self.db, start_of_day, self.config.daily_target_hours)
            .await
            .map_err(ApiError::Internal)?;
        Ok(ok(serde_json::to_value(&stats).map_err(anyhow::Error::from)?))
    }
}

fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn api(dir: &TempDir) -> Api {
        let db = Database::new(dir.path().join("tracker.sqlite3")).unwrap();
        Api::new(SessionController::new(db), TrackerConfig::default())
    }

    fn session_request(raw: &str) -> SessionRequest {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn get_reports_inactive_when_no_session() {
        let dir = TempDir::new().unwrap();
        let reply = api(&dir)
            .handle_session(session_request(r#"{"action": "get"}"#))
            .await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, serde_json::json!({ "active": false }));
    }

    #[tokio::test]
    async fn start_then_get_round_trips_the_wire_format() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir);

        let reply = api
            .handle_session(session_request(
                r#"{
                    "action": "start",
                    "payload": {
                        "itemId": "p1",
                        "itemType": "project",
                        "itemName": "Write spec",
                        "startTime": 1000
                    }
                }"#,
            ))
            .await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["success"], true);
        assert!(reply.body["sessionId"].is_string());

        let reply = api
            .handle_session(session_request(r#"{"action": "get"}"#))
            .await;
        assert_eq!(reply.body["active"], true);
        assert_eq!(reply.body["session"]["startTime"], 1000);
        assert_eq!(reply.body["session"]["status"], "active");
        assert_eq!(reply.body["session"]["projectId"], "p1");
    }

    #[tokio::test]
    async fn start_without_payload_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let reply = api(&dir)
            .handle_session(session_request(r#"{"action": "start"}"#))
            .await;
        assert_eq!(reply.status, 400);
        assert!(reply.body["error"].is_string());
    }

    #[tokio::test]
    async fn pause_without_session_is_not_found() {
        let dir = TempDir::new().unwrap();
        let reply = api(&dir)
            .handle_session(session_request(r#"{"action": "pause"}"#))
            .await;
        assert_eq!(reply.status, 404);
        assert_eq!(reply.body["error"], "No active session");
    }

    #[tokio::test]
    async fn edit_rejects_habit_logs() {
        let dir = TempDir::new().unwrap();
        let request: EditLogRequest = serde_json::from_str(
            r#"{"logId": "l1", "newDuration": 2.5, "type": "habit_log"}"#,
        )
        .unwrap();
        let reply = api(&dir).handle_edit_log(request).await;
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["error"], "Edit not implemented for this type");
    }

    #[tokio::test]
    async fn create_log_validates_required_fields() {
        let dir = TempDir::new().unwrap();
        let request: CreateLogRequest =
            serde_json::from_str(r#"{"type": "work_log", "data": {"hours": 1.0}}"#).unwrap();
        let reply = api(&dir).handle_create_log(request).await;
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["error"], "Missing required work_log fields");
    }

    #[tokio::test]
    async fn daily_stats_reports_target_and_progress() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir);

        let request: CreateLogRequest = serde_json::from_str(
            r#"{"type": "work_log", "data": {"projectId": "p1", "hours": 4.0}}"#,
        )
        .unwrap();
        assert_eq!(api.handle_create_log(request).await.status, 200);

        let reply = api.handle_daily_stats(None).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["daily_target"], 8.0);
        assert_eq!(reply.body["progress_percent"], 50.0);
    }
}
