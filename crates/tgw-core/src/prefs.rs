//! Theme and layout preferences, and the combined preference export.

use crate::filter::FilterStore;
use crate::storage::{self, Persist, Storage};
use crate::subscription::{ImportError, NotificationSettings, SubscriptionStore, SubscriptionsFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTheme {
    Light,
    Dark,
}

impl ThemePreference {
    pub fn next(self) -> Self {
        match self {
            ThemePreference::Light => ThemePreference::Dark,
            ThemePreference::Dark => ThemePreference::System,
            ThemePreference::System => ThemePreference::Light,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
            ThemePreference::System => "system",
        }
    }

    /// `System` follows `COLORFGBG` when the terminal sets it and assumes dark otherwise.
    pub fn resolve(self) -> ResolvedTheme {
        match self {
            ThemePreference::Light => ResolvedTheme::Light,
            ThemePreference::Dark => ResolvedTheme::Dark,
            ThemePreference::System => {
                resolve_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
            }
        }
    }
}

/// `COLORFGBG` is `fg;bg` (sometimes `fg;default;bg`); backgrounds 7 and 15 are light.
fn resolve_colorfgbg(value: Option<&str>) -> ResolvedTheme {
    let background = value
        .and_then(|v| v.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok());
    match background {
        Some(7 | 15) => ResolvedTheme::Light,
        _ => ResolvedTheme::Dark,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThemeStore {
    pub theme: ThemePreference,
}

impl Persist for ThemeStore {
    const KEY: &'static str = "theme";
}

impl ThemeStore {
    pub fn load(storage: &dyn Storage) -> Self {
        storage::load_json(storage)
    }

    pub fn save(&self, storage: &dyn Storage) {
        storage::save_json(storage, self);
    }

    pub fn set(&mut self, theme: ThemePreference) {
        self.theme = theme;
    }

    pub fn cycle(&mut self) -> ThemePreference {
        self.theme = self.theme.next();
        self.theme
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusTarget {
    #[default]
    Sidebar,
    Grid,
}

/// Sidebar layout. Only the collapse flag and expansion sets are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiStore {
    pub sidebar_collapsed: bool,
    pub expanded_groups: BTreeSet<String>,
    pub expanded_dashboards: BTreeSet<String>,
    #[serde(skip)]
    pub search_query: String,
    #[serde(skip)]
    pub search_open: bool,
    #[serde(skip)]
    pub focus_target: FocusTarget,
}

impl Persist for UiStore {
    const KEY: &'static str = "ui";
}

impl UiStore {
    pub fn load(storage: &dyn Storage) -> Self {
        storage::load_json(storage)
    }

    pub fn save(&self, storage: &dyn Storage) {
        storage::save_json(storage, self);
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_collapsed = !self.sidebar_collapsed;
    }

    pub fn is_group_expanded(&self, group: &str) -> bool {
        self.expanded_groups.contains(group)
    }

    pub fn is_dashboard_expanded(&self, dashboard: &str) -> bool {
        self.expanded_dashboards.contains(dashboard)
    }

    /// Returns whether the group is expanded afterwards.
    pub fn toggle_group(&mut self, group: &str) -> bool {
        toggle(&mut self.expanded_groups, group)
    }

    pub fn toggle_dashboard(&mut self, dashboard: &str) -> bool {
        toggle(&mut self.expanded_dashboards, dashboard)
    }

    pub fn expand_group(&mut self, group: &str) {
        self.expanded_groups.insert(group.to_string());
    }

    pub fn expand_dashboard(&mut self, dashboard: &str) {
        self.expanded_dashboards.insert(dashboard.to_string());
    }

    pub fn collapse_all(&mut self) {
        self.expanded_groups.clear();
        self.expanded_dashboards.clear();
    }

    pub fn open_search(&mut self) {
        self.search_open = true;
        self.search_query.clear();
    }

    pub fn close_search(&mut self) {
        self.search_open = false;
        self.search_query.clear();
    }
}

fn toggle(set: &mut BTreeSet<String>, key: &str) -> bool {
    if set.remove(key) {
        false
    } else {
        set.insert(key.to_string());
        true
    }
}

/// Everything a user can carry to another machine. Ephemeral UI flags are left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesBundle {
    pub subscriptions: SubscriptionsFile,
    pub notification_settings: NotificationSettings,
    pub filters: FilterStore,
    pub theme: ThemePreference,
    pub ui: UiStore,
}

impl PreferencesBundle {
    pub fn collect(
        subscriptions: &SubscriptionStore,
        filters: &FilterStore,
        theme: &ThemeStore,
        ui: &UiStore,
    ) -> Self {
        Self {
            subscriptions: SubscriptionsFile {
                version: crate::subscription::STORAGE_VERSION,
                subscriptions: subscriptions.all().to_vec(),
                exported_at: Some(chrono::Utc::now()),
            },
            notification_settings: subscriptions.notification_settings().clone(),
            filters: filters.clone(),
            theme: theme.theme,
            ui: ui.clone(),
        }
    }

    pub fn parse(json: &str) -> Result<Self, ImportError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ImportError::Parse(e.to_string()))?;
        let bundle: Self =
            serde_json::from_value(value).map_err(|e| ImportError::Schema(e.to_string()))?;
        bundle
            .notification_settings
            .validate()
            .map_err(|e| ImportError::Schema(e.to_string()))?;
        Ok(bundle)
    }

    /// Preferences are replaced, subscriptions merged. Returns the number of new
    /// subscriptions. On error nothing is applied.
    pub fn apply(
        &self,
        subscriptions: &mut SubscriptionStore,
        filters: &mut FilterStore,
        theme: &mut ThemeStore,
        ui: &mut UiStore,
    ) -> Result<usize, ImportError> {
        let json = serde_json::to_string(&self.subscriptions)
            .map_err(|e| ImportError::Schema(e.to_string()))?;
        let mut merged = subscriptions.clone();
        let added = merged.import_json(&json)?;
        merged
            .update_notification_settings(|s| *s = self.notification_settings.clone())
            .map_err(|e| ImportError::Schema(e.to_string()))?;

        *subscriptions = merged;
        *filters = self.filters.clone();
        theme.set(self.theme);
        ui.sidebar_collapsed = self.ui.sidebar_collapsed;
        ui.expanded_groups.clone_from(&self.ui.expanded_groups);
        ui.expanded_dashboards.clone_from(&self.ui.expanded_dashboards);
        Ok(added)
    }
}
