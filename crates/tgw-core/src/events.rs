//! Terminal input thread and application event channel.
//!
//! Terminal input is read on a dedicated OS thread since `crossterm::event::poll()`
//! blocks. Everything else (fetch results, poller updates, task crashes) joins the
//! same unbounded channel so the main loop has a single `next()` to await.

use crate::api::ApiError;
use crate::model::TabSummary;
use crate::query::{QueryData, Ticket};
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind, MouseEvent};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// Completion of a fetch started from a cache ticket.
    QueryResult {
        ticket: Ticket,
        result: Result<QueryData, ApiError>,
    },
    /// Fresh tab summaries for a subscribed dashboard, from the background poller.
    SubscriptionStatus {
        dashboard: String,
        summaries: Vec<TabSummary>,
    },
    /// Global toast, auto-dismisses after `ERROR_TTL_SECS`.
    Error(String),
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Translate a crossterm event; `None` for events the app ignores.
fn translate(event: CrosstermEvent) -> Option<AppEvent> {
    match event {
        // Windows reports both press and release.
        CrosstermEvent::Key(key) if key.kind != KeyEventKind::Release => Some(AppEvent::Key(key)),
        CrosstermEvent::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
        CrosstermEvent::Resize(w, h) => Some(AppEvent::Resize(w, h)),
        _ => None,
    }
}

/// Best-effort text from a panic payload, for thread joins and task join errors.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => payload
            .downcast::<&str>()
            .map_or_else(|_| "unknown panic".to_string(), |s| (*s).to_string()),
    }
}

/// Blocking loop on the input thread. Sends a tick whenever `tick_rate` passes
/// without terminal input, and exits once the receiver is gone or `shutdown` is set.
fn input_loop(tx: &mpsc::UnboundedSender<AppEvent>, shutdown: &AtomicBool, tick_rate: Duration) {
    while !shutdown.load(Ordering::Relaxed) {
        let ready = match event::poll(tick_rate) {
            Ok(ready) => ready,
            Err(e) => {
                let _ = tx.send(AppEvent::Error(format!("Terminal poll error: {e}")));
                return;
            }
        };
        let outgoing = if ready {
            match event::read() {
                Ok(ev) => translate(ev),
                // EINTR
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => None,
                Err(e) => {
                    let _ = tx.send(AppEvent::Error(format!("Terminal read error: {e}")));
                    return;
                }
            }
        } else {
            Some(AppEvent::Tick)
        };
        if let Some(app_event) = outgoing {
            if tx.send(app_event).is_err() {
                return;
            }
        }
    }
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread = {
            let tx = tx.clone();
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("tgw-input".to_string())
                .spawn(move || input_loop(&tx, &shutdown, tick_rate))
        };
        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                let _ = tx.send(AppEvent::Error(format!("Cannot start input thread: {e}")));
                None
            }
        };

        Self {
            rx,
            tx,
            shutdown,
            thread,
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(Err(payload)) = self.thread.take().map(JoinHandle::join) {
            tracing::error!("input thread panicked: {}", panic_message(payload));
        }
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        // No join: poll may still be blocking.
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers};

    fn key(kind: KeyEventKind) -> CrosstermEvent {
        CrosstermEvent::Key(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn key_releases_are_dropped() {
        assert!(matches!(translate(key(KeyEventKind::Press)), Some(AppEvent::Key(_))));
        assert!(translate(key(KeyEventKind::Release)).is_none());
    }

    #[test]
    fn panic_payloads_become_text() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic");
    }

    #[test]
    fn resize_is_forwarded() {
        assert!(matches!(
            translate(CrosstermEvent::Resize(80, 24)),
            Some(AppEvent::Resize(80, 24))
        ));
        assert!(translate(CrosstermEvent::FocusGained).is_none());
    }
}
