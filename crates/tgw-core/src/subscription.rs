//! Subscriptions to dashboards, tabs and tests, plus the notification settings
//! that govern polling for them.

use crate::storage::{self, Persist, Storage};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

pub const STORAGE_VERSION: u32 = 1;
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("Import failed: not valid JSON ({0})")]
    Parse(String),
    #[error("Import failed: unexpected format ({0})")]
    Schema(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Poll interval must be between 30 and 3600 seconds, got {0}")]
    PollInterval(u64),
    #[error("Quiet hours must use HH:MM, got {0:?}")]
    QuietHours(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    Dashboard,
    Tab,
    Test,
}

impl SubscriptionKind {
    pub const ALL: [SubscriptionKind; 3] = [
        SubscriptionKind::Dashboard,
        SubscriptionKind::Tab,
        SubscriptionKind::Test,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SubscriptionKind::Dashboard => "Dashboards",
            SubscriptionKind::Tab => "Tabs",
            SubscriptionKind::Test => "Tests",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum SubscriptionTarget {
    Dashboard {
        dashboard_name: String,
    },
    Tab {
        dashboard_name: String,
        tab_name: String,
    },
    Test {
        dashboard_name: String,
        tab_name: String,
        test_name: String,
    },
}

impl SubscriptionTarget {
    pub fn dashboard(name: impl Into<String>) -> Self {
        SubscriptionTarget::Dashboard {
            dashboard_name: name.into(),
        }
    }

    pub fn tab(dashboard: impl Into<String>, tab: impl Into<String>) -> Self {
        SubscriptionTarget::Tab {
            dashboard_name: dashboard.into(),
            tab_name: tab.into(),
        }
    }

    pub fn test(dashboard: impl Into<String>, tab: impl Into<String>, test: impl Into<String>) -> Self {
        SubscriptionTarget::Test {
            dashboard_name: dashboard.into(),
            tab_name: tab.into(),
            test_name: test.into(),
        }
    }

    pub fn kind(&self) -> SubscriptionKind {
        match self {
            SubscriptionTarget::Dashboard { .. } => SubscriptionKind::Dashboard,
            SubscriptionTarget::Tab { .. } => SubscriptionKind::Tab,
            SubscriptionTarget::Test { .. } => SubscriptionKind::Test,
        }
    }

    pub fn dashboard_name(&self) -> &str {
        match self {
            SubscriptionTarget::Dashboard { dashboard_name }
            | SubscriptionTarget::Tab { dashboard_name, .. }
            | SubscriptionTarget::Test { dashboard_name, .. } => dashboard_name,
        }
    }

    pub fn tab_name(&self) -> Option<&str> {
        match self {
            SubscriptionTarget::Dashboard { .. } => None,
            SubscriptionTarget::Tab { tab_name, .. } | SubscriptionTarget::Test { tab_name, .. } => {
                Some(tab_name)
            }
        }
    }

    /// Whether a status change on `dashboard/tab` concerns this subscription.
    /// Dashboard subscriptions cover every tab. Test subscriptions cover the tab holding the test.
    pub fn covers_tab(&self, dashboard: &str, tab: &str) -> bool {
        match self {
            SubscriptionTarget::Dashboard { dashboard_name } => dashboard_name == dashboard,
            SubscriptionTarget::Tab {
                dashboard_name,
                tab_name,
            }
            | SubscriptionTarget::Test {
                dashboard_name,
                tab_name,
                ..
            } => dashboard_name == dashboard && tab_name == tab,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            SubscriptionTarget::Dashboard { dashboard_name } => dashboard_name.clone(),
            SubscriptionTarget::Tab {
                dashboard_name,
                tab_name,
            } => format!("{dashboard_name} / {tab_name}"),
            SubscriptionTarget::Test {
                dashboard_name,
                tab_name,
                test_name,
            } => format!("{dashboard_name} / {tab_name} / {test_name}"),
        }
    }
}

/// Deterministic id derived from the target fields alone.
pub fn generate_id(target: &SubscriptionTarget) -> String {
    match target {
        SubscriptionTarget::Dashboard { dashboard_name } => format!("dashboard:{dashboard_name}"),
        SubscriptionTarget::Tab {
            dashboard_name,
            tab_name,
        } => format!("tab:{dashboard_name}:{tab_name}"),
        SubscriptionTarget::Test {
            dashboard_name,
            tab_name,
            test_name,
        } => format!("test:{dashboard_name}:{tab_name}:{test_name}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub target: SubscriptionTarget,
}

impl Subscription {
    pub fn new(target: SubscriptionTarget) -> Self {
        Self {
            id: generate_id(&target),
            created_at: Utc::now(),
            target,
        }
    }
}

/// Versioned on-disk and export format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionsFile {
    pub version: u32,
    pub subscriptions: Vec<Subscription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

impl Default for SubscriptionsFile {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION,
            subscriptions: Vec::new(),
            exported_at: None,
        }
    }
}

impl Persist for SubscriptionsFile {
    const KEY: &'static str = "subscriptions";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub poll_interval_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours_end: Option<String>,
    #[serde(alias = "browserNotifications")]
    pub desktop_notifications: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
            quiet_hours_start: None,
            quiet_hours_end: None,
            desktop_notifications: true,
        }
    }
}

impl Persist for NotificationSettings {
    const KEY: &'static str = "notification-settings";
}

fn parse_hhmm(s: &str) -> Result<NaiveTime, SettingsError> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| SettingsError::QuietHours(s.to_string()))
}

impl NotificationSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&self.poll_interval_seconds) {
            return Err(SettingsError::PollInterval(self.poll_interval_seconds));
        }
        for hhmm in [&self.quiet_hours_start, &self.quiet_hours_end]
            .into_iter()
            .flatten()
        {
            parse_hhmm(hhmm)?;
        }
        Ok(())
    }

    /// Quiet hours need both ends; a window whose start is after its end wraps past
    /// midnight.
    pub fn in_quiet_hours(&self, now: NaiveTime) -> bool {
        let (Some(start), Some(end)) = (&self.quiet_hours_start, &self.quiet_hours_end) else {
            return false;
        };
        let (Ok(start), Ok(end)) = (parse_hhmm(start), parse_hhmm(end)) else {
            return false;
        };
        if start <= end {
            start <= now && now < end
        } else {
            now >= start || now < end
        }
    }
}

/// Ids are derived from the target, never trusted from a file. Drops ids already in `seen`.
fn normalize(seen: &mut HashSet<String>, incoming: Vec<Subscription>) -> Vec<Subscription> {
    let mut kept = Vec::with_capacity(incoming.len());
    for mut subscription in incoming {
        subscription.id = generate_id(&subscription.target);
        if seen.insert(subscription.id.clone()) {
            kept.push(subscription);
        }
    }
    kept
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionStore {
    subscriptions: Vec<Subscription>,
    settings: NotificationSettings,
}

impl SubscriptionStore {
    pub fn load(storage: &dyn Storage) -> Self {
        let file: SubscriptionsFile = storage::load_json(storage);
        let subscriptions = if file.version == STORAGE_VERSION {
            normalize(&mut HashSet::new(), file.subscriptions)
        } else {
            tracing::warn!(version = file.version, "ignoring subscriptions with unknown version");
            Vec::new()
        };
        let mut settings: NotificationSettings = storage::load_json(storage);
        if let Err(e) = settings.validate() {
            tracing::warn!(error = %e, "resetting invalid notification settings");
            settings = NotificationSettings::default();
        }
        Self {
            subscriptions,
            settings,
        }
    }

    pub fn save(&self, storage: &dyn Storage) {
        storage::save_json(
            storage,
            &SubscriptionsFile {
                version: STORAGE_VERSION,
                subscriptions: self.subscriptions.clone(),
                exported_at: None,
            },
        );
        storage::save_json(storage, &self.settings);
    }

    pub fn all(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns false when the target was already subscribed.
    pub fn subscribe(&mut self, target: SubscriptionTarget) -> bool {
        if self.is_subscribed(&target) {
            return false;
        }
        self.subscriptions.push(Subscription::new(target));
        true
    }

    pub fn unsubscribe(&mut self, id: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn unsubscribe_target(&mut self, target: &SubscriptionTarget) -> bool {
        self.unsubscribe(&generate_id(target))
    }

    /// Returns whether the target is subscribed afterwards.
    pub fn toggle(&mut self, target: SubscriptionTarget) -> bool {
        if self.unsubscribe_target(&target) {
            false
        } else {
            self.subscribe(target)
        }
    }

    pub fn clear_all(&mut self) {
        self.subscriptions.clear();
    }

    pub fn is_subscribed(&self, target: &SubscriptionTarget) -> bool {
        self.get(&generate_id(target)).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.id == id)
    }

    pub fn by_type(&self, kind: SubscriptionKind) -> impl Iterator<Item = &Subscription> {
        self.subscriptions
            .iter()
            .filter(move |s| s.target.kind() == kind)
    }

    pub fn by_dashboard<'a>(&'a self, dashboard: &'a str) -> impl Iterator<Item = &'a Subscription> {
        self.subscriptions
            .iter()
            .filter(move |s| s.target.dashboard_name() == dashboard)
    }

    /// Dashboards whose tab summaries the poller has to watch.
    pub fn watched_dashboards(&self) -> BTreeSet<String> {
        self.subscriptions
            .iter()
            .map(|s| s.target.dashboard_name().to_string())
            .collect()
    }

    pub fn covers_tab(&self, dashboard: &str, tab: &str) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.target.covers_tab(dashboard, tab))
    }

    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&SubscriptionsFile {
            version: STORAGE_VERSION,
            subscriptions: self.subscriptions.clone(),
            exported_at: Some(Utc::now()),
        })
    }

    /// Merge an export into the store. Nothing changes unless the whole document
    /// validates. Returns how many subscriptions were new.
    pub fn import_json(&mut self, json: &str) -> Result<usize, ImportError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ImportError::Parse(e.to_string()))?;
        let file: SubscriptionsFile =
            serde_json::from_value(value).map_err(|e| ImportError::Schema(e.to_string()))?;
        if file.version != STORAGE_VERSION {
            return Err(ImportError::Schema(format!(
                "unsupported version {}",
                file.version
            )));
        }

        let mut seen: HashSet<String> = self.subscriptions.iter().map(|s| s.id.clone()).collect();
        let added = normalize(&mut seen, file.subscriptions);
        let count = added.len();
        self.subscriptions.extend(added);
        Ok(count)
    }

    pub fn notification_settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// Apply `update` to a copy and keep it only if the result is valid.
    pub fn update_notification_settings<F>(&mut self, update: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut NotificationSettings),
    {
        let mut next = self.settings.clone();
        update(&mut next);
        next.validate()?;
        self.settings = next;
        Ok(())
    }
}
