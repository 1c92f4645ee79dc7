use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, Timelike, Utc};
use log::{info, warn};
use tokio::{
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

mod checks;
mod notifier;

pub use checks::{idle_nudge_allowed, status_check, StatusAction};
pub use notifier::{Alert, AlertKind, LogNotifier, Notifier};

use crate::config::TrackerConfig;
use crate::error::ApiError;
use crate::models::LogSource;
use crate::session::SessionController;

/// Periodic alarms over the session store. Stateless between firings: every
/// wake-up refetches the session through the controller (never the store
/// directly) and recomputes its decision from scratch. Any fetch failure is
/// logged and the cycle skipped; the loops themselves never die.
pub struct Scheduler {
    controller: SessionController,
    config: TrackerConfig,
    notifier: Arc<dyn Notifier>,
}

impl Scheduler {
    pub fn new(
        controller: SessionController,
        config: TrackerConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            controller,
            config,
            notifier,
        }
    }

    /// Spawns all alarm loops. Each runs on its own timer with no mutual
    /// exclusion; overlapping firings are tolerated because every cycle
    /// re-reads state and a repeated auto-stop simply finds no open session.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        {
            let scheduler = self.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                scheduler.status_check_loop(cancel).await;
            }));
        }

        {
            let scheduler = self.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                scheduler.idle_nudge_loop(cancel).await;
            }));
        }

        {
            let scheduler = self.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let hour = scheduler.config.planning_alert_hour;
                scheduler
                    .daily_loop("planning_alert", hour, cancel, Alert::planning_alert)
                    .await;
            }));
        }

        {
            let scheduler = self;
            handles.push(tokio::spawn(async move {
                let hour = scheduler.config.morning_rule_hour;
                scheduler
                    .daily_loop("morning_rule", hour, cancel, Alert::morning_rule)
                    .await;
            }));
        }

        handles
    }

    async fn status_check_loop(&self, cancel: CancellationToken) {
        let mut ticker = interval(Duration::from_secs(self.config.status_check_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately.
        ticker.tick().await;

        info!(
            "status_check alarm armed (every {}s)",
            self.config.status_check_secs
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => self.status_check_cycle().await,
                _ = cancel.cancelled() => {
                    info!("status_check alarm shutting down");
                    break;
                }
            }
        }
    }

    async fn idle_nudge_loop(&self, cancel: CancellationToken) {
        let mut ticker = interval(Duration::from_secs(self.config.idle_nudge_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        info!(
            "idle_nudge alarm armed (every {}s)",
            self.config.idle_nudge_secs
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => self.idle_nudge_cycle().await,
                _ = cancel.cancelled() => {
                    info!("idle_nudge alarm shutting down");
                    break;
                }
            }
        }
    }

    async fn daily_loop(
        &self,
        name: &str,
        hour: u32,
        cancel: CancellationToken,
        alert: fn(&str) -> Alert,
    ) {
        info!("{name} alarm armed (daily at {hour:02}:00 local)");
        loop {
            let wait = until_next_local_hour(Local::now(), hour);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.notifier.notify(alert(&self.config.dashboard_url));
                }
                _ = cancel.cancelled() => {
                    info!("{name} alarm shutting down");
                    break;
                }
            }
        }
    }

    /// One status-check poll: enforce the safety ceiling, then the break and
    /// focus crossings.
    pub async fn status_check_cycle(&self) {
        let session = match self.controller.get_open().await {
            Ok(session) => session,
            Err(err) => {
                warn!("status_check: session fetch failed, skipping cycle: {err}");
                return;
            }
        };

        for action in status_check(session.as_ref(), Utc::now(), &self.config) {
            match action {
                StatusAction::AutoStop => self.auto_stop().await,
                StatusAction::BreakCheckIn { minutes } => self
                    .notifier
                    .notify(Alert::break_check_in(minutes, &self.config.dashboard_url)),
                StatusAction::FocusMilestone { minutes } => self
                    .notifier
                    .notify(Alert::focus_milestone(minutes, &self.config.dashboard_url)),
            }
        }
    }

    async fn auto_stop(&self) {
        match self.controller.stop(LogSource::SafetyCheck).await {
            Ok(summary) => {
                warn!(
                    "Safety check force-stopped session {} after {}s",
                    summary.session.id,
                    summary.session.raw_elapsed_seconds(Utc::now())
                );
                self.notifier.notify(Alert::session_auto_stopped(
                    &summary.session.task_name,
                    &self.config.dashboard_url,
                ));
            }
            // Raced with a user stop or an overlapping firing: nothing open.
            Err(ApiError::NotFound(_)) => {}
            Err(err) => warn!("status_check: auto-stop failed: {err}"),
        }
    }

    /// One inactivity poll: nudge when nothing is tracked during waking
    /// hours, withdraw the nudge once tracking resumes.
    pub async fn idle_nudge_cycle(&self) {
        let now = Local::now();
        if !idle_nudge_allowed(now.hour(), now.weekday(), &self.config) {
            return;
        }

        match self.controller.get_active().await {
            Ok(None) => self
                .notifier
                .notify(Alert::idle_nudge(&self.config.dashboard_url)),
            Ok(Some(_)) => self.notifier.clear(AlertKind::IdleNudge),
            Err(err) => warn!("idle_nudge: session fetch failed, skipping cycle: {err}"),
        }
    }
}

/// Time until the next local occurrence of `hour:00`. Recomputed after every
/// firing rather than assuming 24-hour periods, so DST shifts stay correct.
fn until_next_local_hour(now: DateTime<Local>, hour: u32) -> Duration {
    let mut target_day = now.date_naive();
    loop {
        if let Some(target) = target_day
            .and_hms_opt(hour, 0, 0)
            .and_then(|naive| naive.and_local_timezone(Local).earliest())
        {
            if target > now {
                let wait = (target - now).to_std().unwrap_or_default();
                return wait;
            }
        }
        target_day += ChronoDuration::days(1);
    }
}
