use chrono::{DateTime, Utc, Weekday};

use crate::config::TrackerConfig;
use crate::models::{SessionStatus, WorkSession};

/// What a status-check poll decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// Session exceeded the safety ceiling; force-stop it.
    AutoStop,
    /// Open break just crossed the check-in mark.
    BreakCheckIn { minutes: i64 },
    /// Net focused time just crossed the milestone mark.
    FocusMilestone { minutes: i64 },
}

/// Evaluates one status-check poll. Pure: everything is recomputed from the
/// session document and `now`.
///
/// The break and focus alerts use one-minute half-open windows rather than
/// equality, so a poll landing anywhere inside the minute after the crossing
/// fires exactly once and later polls stay quiet.
pub fn status_check(
    session: Option<&WorkSession>,
    now: DateTime<Utc>,
    config: &TrackerConfig,
) -> Vec<StatusAction> {
    let session = match session {
        Some(session) if session.status.is_open() => session,
        _ => return Vec::new(),
    };

    // Safety ceiling always wins, even over an in-flight pause.
    if session.raw_elapsed_seconds(now) >= config.max_session_secs {
        return vec![StatusAction::AutoStop];
    }

    let mut actions = Vec::new();

    if session.status == SessionStatus::Paused {
        let break_secs = session.open_break_seconds(now);
        let window_start = config.break_alert_minutes * 60;
        if (window_start..window_start + 60).contains(&break_secs) {
            actions.push(StatusAction::BreakCheckIn {
                minutes: break_secs / 60,
            });
        }
    }

    if session.status == SessionStatus::Active {
        let net_secs = session.net_elapsed_seconds(now);
        let window_start = config.focus_alert_minutes * 60;
        if (window_start..window_start + 60).contains(&net_secs) {
            actions.push(StatusAction::FocusMilestone {
                minutes: net_secs / 60,
            });
        }
    }

    actions
}

/// The inactivity nudge only fires during waking hours, Monday through
/// Saturday.
pub fn idle_nudge_allowed(hour: u32, weekday: Weekday, config: &TrackerConfig) -> bool {
    weekday != Weekday::Sun
        && hour >= config.idle_window_start_hour
        && hour < config.idle_window_end_hour
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BreakInterval, ItemType};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn session(status: SessionStatus, item: ItemType) -> WorkSession {
        WorkSession {
            id: "s1".into(),
            status,
            start_time: at(0),
            last_pause_time: None,
            breaks: Vec::new(),
            task_name: "Write spec".into(),
            project_id: (item == ItemType::Project).then(|| "p1".to_string()),
            habit_id: (item == ItemType::Habit).then(|| "h1".to_string()),
            end_time: None,
            duration_seconds: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn config() -> TrackerConfig {
        TrackerConfig::default()
    }

    #[test]
    fn no_session_means_no_actions() {
        assert!(status_check(None, at(0), &config()).is_empty());
    }

    #[test]
    fn completed_session_is_ignored() {
        let s = session(SessionStatus::Completed, ItemType::Project);
        assert!(status_check(Some(&s), at(100_000), &config()).is_empty());
    }

    #[test]
    fn focus_milestone_fires_only_inside_the_window() {
        let s = session(SessionStatus::Active, ItemType::Project);

        // 89 minutes: quiet.
        assert!(status_check(Some(&s), at(89 * 60), &config()).is_empty());
        // 90 minutes exactly: fires.
        assert_eq!(
            status_check(Some(&s), at(90 * 60), &config()),
            vec![StatusAction::FocusMilestone { minutes: 90 }]
        );
        // 90:30, still the same crossing window.
        assert_eq!(
            status_check(Some(&s), at(90 * 60 + 30), &config()),
            vec![StatusAction::FocusMilestone { minutes: 90 }]
        );
        // 91 minutes: the next poll after the crossing stays quiet.
        assert!(status_check(Some(&s), at(91 * 60), &config()).is_empty());
    }

    #[test]
    fn breaks_push_the_milestone_back() {
        let mut s = session(SessionStatus::Active, ItemType::Project);
        s.breaks.push(BreakInterval {
            start: at(600),
            duration_seconds: 600,
        });
        // 100 minutes wall, 90 net.
        assert_eq!(
            status_check(Some(&s), at(100 * 60), &config()),
            vec![StatusAction::FocusMilestone { minutes: 90 }]
        );
    }

    #[test]
    fn break_check_in_fires_once_per_crossing() {
        let mut s = session(SessionStatus::Paused, ItemType::Project);
        s.last_pause_time = Some(at(1000));

        assert!(status_check(Some(&s), at(1000 + 14 * 60), &config()).is_empty());
        assert_eq!(
            status_check(Some(&s), at(1000 + 15 * 60), &config()),
            vec![StatusAction::BreakCheckIn { minutes: 15 }]
        );
        assert!(status_check(Some(&s), at(1000 + 16 * 60), &config()).is_empty());
    }

    #[test]
    fn safety_ceiling_wins_over_everything() {
        // Paused session, open break right in the check-in window, but the
        // session is past four hours of wall clock.
        let mut s = session(SessionStatus::Paused, ItemType::Project);
        s.last_pause_time = Some(at(4 * 3600 - 14 * 60));

        let actions = status_check(Some(&s), at(4 * 3600 + 1), &config());
        assert_eq!(actions, vec![StatusAction::AutoStop]);
    }

    #[test]
    fn auto_stop_at_exactly_four_hours() {
        let s = session(SessionStatus::Active, ItemType::Project);
        assert!(status_check(Some(&s), at(4 * 3600 - 1), &config())
            .iter()
            .all(|a| !matches!(a, StatusAction::AutoStop)));
        assert_eq!(
            status_check(Some(&s), at(4 * 3600), &config()),
            vec![StatusAction::AutoStop]
        );
    }

    #[test]
    fn idle_window_covers_working_hours_mon_to_sat() {
        let c = config();
        assert!(idle_nudge_allowed(8, Weekday::Mon, &c));
        assert!(idle_nudge_allowed(21, Weekday::Sat, &c));
        assert!(!idle_nudge_allowed(22, Weekday::Mon, &c));
        assert!(!idle_nudge_allowed(7, Weekday::Mon, &c));
        assert!(!idle_nudge_allowed(12, Weekday::Sun, &c));
    }
}
