use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    IdleNudge,
    BreakCheckIn,
    FocusMilestone,
    SessionAutoStopped,
    PlanningAlert,
    MorningRule,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::IdleNudge => "idle_nudge",
            AlertKind::BreakCheckIn => "break_check_in",
            AlertKind::FocusMilestone => "focus_milestone",
            AlertKind::SessionAutoStopped => "session_auto_stopped",
            AlertKind::PlanningAlert => "planning_alert",
            AlertKind::MorningRule => "morning_rule",
        }
    }
}

/// A named notification. `dashboard_url` is what the host surface opens when
/// the user interacts with the alert.
#[derive(Debug, Clone)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub dashboard_url: String,
}

impl Alert {
    pub fn idle_nudge(dashboard_url: &str) -> Self {
        Self {
            kind: AlertKind::IdleNudge,
            title: "Where is your focus?".into(),
            message: "Don't let the hours slip away. Start a tracker!".into(),
            dashboard_url: dashboard_url.into(),
        }
    }

    pub fn break_check_in(minutes: i64, dashboard_url: &str) -> Self {
        Self {
            kind: AlertKind::BreakCheckIn,
            title: "Still on a break?".into(),
            message: format!("You have been paused for {minutes} minutes."),
            dashboard_url: dashboard_url.into(),
        }
    }

    pub fn focus_milestone(minutes: i64, dashboard_url: &str) -> Self {
        Self {
            kind: AlertKind::FocusMilestone,
            title: format!("{minutes} minutes of focus"),
            message: "Great run. Consider a short break.".into(),
            dashboard_url: dashboard_url.into(),
        }
    }

    pub fn session_auto_stopped(task_name: &str, dashboard_url: &str) -> Self {
        Self {
            kind: AlertKind::SessionAutoStopped,
            title: "Session auto-stopped".into(),
            message: format!("'{task_name}' ran past the 4-hour safety limit and was stopped."),
            dashboard_url: dashboard_url.into(),
        }
    }

    pub fn planning_alert(dashboard_url: &str) -> Self {
        Self {
            kind: AlertKind::PlanningAlert,
            title: "NorthStar Planning".into(),
            message: "Time to set your Daily Path for tomorrow. Stay on track!".into(),
            dashboard_url: dashboard_url.into(),
        }
    }

    pub fn morning_rule(dashboard_url: &str) -> Self {
        Self {
            kind: AlertKind::MorningRule,
            title: "Good morning".into(),
            message: "Review today's plan before you start.".into(),
            dashboard_url: dashboard_url.into(),
        }
    }
}

/// Host-platform notification surface.
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: Alert);

    /// Withdraw a pending alert of this kind, if the surface supports it.
    fn clear(&self, _kind: AlertKind) {}
}

/// Fallback surface that just writes alerts to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: Alert) {
        info!("[{}] {}: {}", alert.kind.as_str(), alert.title, alert.message);
    }
}
