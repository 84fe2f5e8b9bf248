use crate::model::{OverallStatus, TabSummary};
use crate::subscription::SubscriptionStore;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub dashboard: String,
    pub tab: String,
    pub previous: Option<OverallStatus>,
    pub current: OverallStatus,
}

impl StatusChange {
    pub fn is_failure(&self) -> bool {
        self.current == OverallStatus::Failing
    }

    pub fn message(&self) -> String {
        if self.is_failure() {
            format!("{} / {} is failing", self.dashboard, self.tab)
        } else {
            format!(
                "{} / {} recovered ({})",
                self.dashboard,
                self.tab,
                self.current.label()
            )
        }
    }
}

/// Last seen tab status per dashboard, from the notification poller.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    tabs: HashMap<String, HashMap<String, OverallStatus>>,
}

impl StatusSnapshot {
    pub fn get(&self, dashboard: &str, tab: &str) -> Option<OverallStatus> {
        self.tabs.get(dashboard)?.get(tab).copied()
    }

    pub fn forget_dashboard(&mut self, dashboard: &str) {
        self.tabs.remove(dashboard);
    }
}

/// Compare a dashboard's fresh tab summaries with the snapshot and report changes on
/// subscribed tabs. A tab that is failing when first seen counts as a transition.
/// The dashboard's snapshot is replaced, so tabs that disappeared are dropped.
pub fn detect_transitions(
    snapshot: &mut StatusSnapshot,
    dashboard: &str,
    summaries: &[TabSummary],
    subscriptions: &SubscriptionStore,
) -> Vec<StatusChange> {
    let previous = snapshot.tabs.remove(dashboard).unwrap_or_default();
    let mut changes = Vec::new();
    let mut current = HashMap::with_capacity(summaries.len());

    for summary in summaries {
        let before = previous.get(&summary.tab_name).copied();
        let now = summary.overall_status;
        current.insert(summary.tab_name.clone(), now);

        if !subscriptions.covers_tab(dashboard, &summary.tab_name) {
            continue;
        }
        let became_failing = now == OverallStatus::Failing && before != Some(OverallStatus::Failing);
        let recovered = before == Some(OverallStatus::Failing) && now != OverallStatus::Failing;
        if became_failing || recovered {
            changes.push(StatusChange {
                dashboard: dashboard.to_string(),
                tab: summary.tab_name.clone(),
                previous: before,
                current: now,
            });
        }
    }

    snapshot.tabs.insert(dashboard.to_string(), current);
    changes
}
