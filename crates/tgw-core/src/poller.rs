//! Background polling of tab summaries for subscribed dashboards.
//!
//! The interval and the set of dashboards are controlled externally via `watch`
//! channels: the event loop writes a new interval when notification settings change
//! and a new dashboard list when subscriptions change, and the poller picks them up
//! on its next `tokio::select!` cycle without being restarted.
//!
//! On consecutive failures, exponential backoff (`base × 2^failures`) is applied up
//! to `MAX_BACKOFF_SECS` (5 minutes). The backoff resets on the next successful poll.

use crate::api::TestGridApi;
use crate::events::AppEvent;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time;

const MAX_BACKOFF_SECS: u64 = 300;

/// Compute backoff delay: `min(base_interval * 2^failures, MAX_BACKOFF_SECS)`.
pub fn backoff_delay(base_interval: u64, failures: u32) -> u64 {
    let multiplier = 1u64.checked_shl(failures).unwrap_or(u64::MAX);
    base_interval
        .saturating_mul(multiplier)
        .clamp(1, MAX_BACKOFF_SECS)
}

pub struct SubscriptionPoller {
    api: Arc<dyn TestGridApi>,
    tx: mpsc::UnboundedSender<AppEvent>,
    interval_rx: watch::Receiver<u64>,
    dashboards_rx: watch::Receiver<Vec<String>>,
}

impl SubscriptionPoller {
    pub fn new(
        api: Arc<dyn TestGridApi>,
        tx: mpsc::UnboundedSender<AppEvent>,
        interval_rx: watch::Receiver<u64>,
        dashboards_rx: watch::Receiver<Vec<String>>,
    ) -> Self {
        Self {
            api,
            tx,
            interval_rx,
            dashboards_rx,
        }
    }

    pub async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            match self.poll_once().await {
                PollOutcome::Success => failures = 0,
                PollOutcome::Failure => failures = failures.saturating_add(1),
                PollOutcome::ChannelClosed => return,
            }

            let base_interval = *self.interval_rx.borrow();
            let delay = if failures > 0 {
                backoff_delay(base_interval, failures)
            } else {
                base_interval
            };
            // Wake early when the interval or the subscribed dashboards change.
            tokio::select! {
                () = time::sleep(time::Duration::from_secs(delay)) => {},
                changed = self.interval_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                },
                changed = self.dashboards_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                },
            }
        }
    }

    async fn poll_once(&self) -> PollOutcome {
        let dashboards = self.dashboards_rx.borrow().clone();
        if dashboards.is_empty() {
            return PollOutcome::Success;
        }
        tracing::debug!(count = dashboards.len(), "polling subscribed dashboards");
        let mut failed = Vec::new();
        for dashboard in dashboards {
            match self.api.tab_summaries(&dashboard).await {
                Ok(response) => {
                    let event = AppEvent::SubscriptionStatus {
                        dashboard,
                        summaries: response.tab_summaries,
                    };
                    if self.tx.send(event).is_err() {
                        return PollOutcome::ChannelClosed;
                    }
                }
                Err(e) => {
                    tracing::warn!(%dashboard, error = %e, "subscription poll failed");
                    failed.push(dashboard);
                }
            }
        }
        if failed.is_empty() {
            return PollOutcome::Success;
        }
        let message = format!("Notification poll failed for {}", failed.join(", "));
        if self.tx.send(AppEvent::Error(message)).is_err() {
            return PollOutcome::ChannelClosed;
        }
        PollOutcome::Failure
    }
}

enum PollOutcome {
    Success,
    Failure,
    ChannelClosed,
}
