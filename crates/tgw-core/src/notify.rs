use crate::diff::StatusChange;
use crate::subscription::NotificationSettings;
use chrono::NaiveTime;

/// Desktop notifications only for failures, when enabled, outside quiet hours.
pub fn should_notify(settings: &NotificationSettings, change: &StatusChange, now: NaiveTime) -> bool {
    settings.enabled
        && settings.desktop_notifications
        && change.is_failure()
        && !settings.in_quiet_hours(now)
}

/// Blocks until the notification daemon answers. Returns the failure message, if any.
#[cfg(feature = "desktop-notify")]
pub fn send_desktop(change: &StatusChange) -> Option<String> {
    use notify_rust::{Notification, Urgency};

    let summary = format!("{} is failing", change.dashboard);
    let body = match change.previous {
        Some(previous) => format!("{} went from {} to Failing", change.tab, previous.label()),
        None => format!("{} is Failing", change.tab),
    };

    match Notification::new()
        .summary(&summary)
        .body(&body)
        .icon("dialog-error")
        .urgency(Urgency::Critical)
        .show()
    {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "desktop notification failed");
            Some(format!("desktop notification failed: {e}"))
        }
    }
}

#[cfg(not(feature = "desktop-notify"))]
pub fn send_desktop(change: &StatusChange) -> Option<String> {
    tracing::debug!(tab = %change.tab, "desktop notifications disabled at build time");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OverallStatus;

    fn change(current: OverallStatus) -> StatusChange {
        StatusChange {
            dashboard: "d".into(),
            tab: "t".into(),
            previous: Some(OverallStatus::Passing),
            current,
        }
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    #[cfg(not(feature = "desktop-notify"))]
    #[test]
    fn disabled_build_reports_no_error() {
        assert_eq!(send_desktop(&change(OverallStatus::Failing)), None);
    }

    #[test]
    fn failures_notify_by_default() {
        let settings = NotificationSettings::default();
        assert!(should_notify(&settings, &change(OverallStatus::Failing), noon()));
        assert!(!should_notify(&settings, &change(OverallStatus::Passing), noon()));
    }

    #[test]
    fn disabled_or_quiet_suppresses() {
        let disabled = NotificationSettings {
            enabled: false,
            ..NotificationSettings::default()
        };
        assert!(!should_notify(&disabled, &change(OverallStatus::Failing), noon()));

        let no_desktop = NotificationSettings {
            desktop_notifications: false,
            ..NotificationSettings::default()
        };
        assert!(!should_notify(&no_desktop, &change(OverallStatus::Failing), noon()));

        let quiet = NotificationSettings {
            quiet_hours_start: Some("11:00".into()),
            quiet_hours_end: Some("13:00".into()),
            ..NotificationSettings::default()
        };
        assert!(!should_notify(&quiet, &change(OverallStatus::Failing), noon()));
    }
}
