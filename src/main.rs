use tgw::api::TestGridApi;
use tgw::app::{AppConfig, AppState};
use tgw::cli::Cli;
use tgw::client::HttpApi;
use tgw::diff::StatusChange;
use tgw::events::{panic_message, AppEvent, EventHandler};
use tgw::input;
use tgw::notify;
use tgw::poller::SubscriptionPoller;
use tgw::query::{self, QueryKey, RetryPolicy, Ticket};
use tgw::report;
use tgw::storage::FileStorage;
use tgw::tui;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

const TICK_RATE: Duration = Duration::from_millis(100);

fn setup_verbose_logging(state_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(state_dir)
        .map_err(|e| eyre!("Failed to create log directory {state_dir:?}: {e}"))?;
    let log_path = state_dir.join("debug.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| eyre!("Failed to open log file {log_path:?}: {e}"))?;
    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .init();
    tracing::info!(
        "tgw v{} starting with verbose logging",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

fn spawn_monitored(
    tx: mpsc::UnboundedSender<AppEvent>,
    label: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) {
    tokio::spawn(async move {
        let handle = tokio::spawn(fut);
        if let Err(join_err) = handle.await {
            let msg = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                "task cancelled".to_string()
            };
            tracing::error!("{label} panicked: {msg}");
            if tx
                .send(AppEvent::Error(format!("{label} crashed: {msg}")))
                .is_err()
            {
                tracing::warn!("{label}: channel closed while reporting panic");
            }
        }
    });
}

/// Run one cache ticket in the background and report back on the event channel.
fn spawn_fetch(api: &Arc<dyn TestGridApi>, tx: &mpsc::UnboundedSender<AppEvent>, ticket: Ticket) {
    let api = Arc::clone(api);
    let tx2 = tx.clone();
    spawn_monitored(tx.clone(), "fetch", async move {
        let key: QueryKey = ticket.key.clone();
        let result = query::fetch_with_retry(RetryPolicy::default(), || {
            query::execute(api.as_ref(), &key)
        })
        .await;
        if tx2.send(AppEvent::QueryResult { ticket, result }).is_err() {
            tracing::warn!(key = %key.describe(), "fetch: channel closed");
        }
    });
}

/// Desktop notifications block on the session bus, so they run off the event loop.
fn spawn_notification(tx: &mpsc::UnboundedSender<AppEvent>, change: StatusChange) {
    let tx = tx.clone();
    tokio::task::spawn_blocking(move || {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            notify::send_desktop(&change)
        }));
        let error = match result {
            Ok(error) => error,
            Err(payload) => Some(format!("notification crashed: {}", panic_message(payload))),
        };
        if let Some(error) = error {
            if tx.send(AppEvent::Error(error)).is_err() {
                tracing::warn!("notify: channel closed");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    let state_dir = args.state_dir();

    if args.verbose {
        setup_verbose_logging(&state_dir)?;
    }

    let storage = FileStorage::open(state_dir.clone())?;
    let api: Arc<dyn TestGridApi> = Arc::new(HttpApi::new(&args.base_url)?);

    if let Some(command) = &args.command {
        let mut stdout = io::stdout().lock();
        return report::run(command, api.as_ref(), &storage, args.json, &mut stdout).await;
    }

    let config = AppConfig {
        version: format!("{}+{}", env!("CARGO_PKG_VERSION"), env!("BUILD_NUMBER")),
        base_url: args.base_url.clone(),
        dashboard: args.dashboard.clone(),
        tab: args.tab.clone(),
        desktop_notify: !args.no_notify,
    };
    let mut state = AppState::new(Box::new(storage), config);
    if let Some(interval) = args.interval {
        state.set_poll_interval(interval)?;
    }

    // Setup terminal with panic hook
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if let Err(e) = terminal::disable_raw_mode() {
            eprintln!("Failed to disable raw mode during panic: {e}");
        }
        if let Err(e) = execute!(
            io::stdout(),
            DisableMouseCapture,
            LeaveAlternateScreen,
            SetTitle("")
        ) {
            eprintln!("Failed to leave alternate screen during panic: {e}");
        }
        original_hook(panic_info);
    }));

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, SetTitle("tgw"))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    let size = terminal.size()?;
    state.set_terminal_size(size.width, size.height);

    let events = EventHandler::new(TICK_RATE);
    let tx = events.sender();

    // Poller configuration follows the notification settings and subscriptions.
    let (interval_tx, interval_rx) = watch::channel(state.poll_interval());
    let (dashboards_tx, dashboards_rx) = watch::channel(state.watched_dashboards());

    let poller = SubscriptionPoller::new(Arc::clone(&api), tx.clone(), interval_rx, dashboards_rx);
    spawn_monitored(tx.clone(), "poller", poller.run());

    let result = run_app(
        &mut terminal,
        &mut state,
        events,
        &tx,
        &api,
        &interval_tx,
        &dashboards_tx,
    )
    .await;

    // Restore terminal
    terminal::disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen,
        SetTitle("")
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    mut events: EventHandler,
    tx: &mpsc::UnboundedSender<AppEvent>,
    api: &Arc<dyn TestGridApi>,
    interval_tx: &watch::Sender<u64>,
    dashboards_tx: &watch::Sender<Vec<String>>,
) -> Result<()> {
    // Initial fetches for whatever the first screen needs.
    for ticket in state.collect_fetches(Instant::now()) {
        spawn_fetch(api, tx, ticket);
    }

    loop {
        terminal.draw(|f| tui::render::render(f, state))?;

        let Some(event) = events.next().await else {
            tracing::warn!("event channel closed");
            return Ok(());
        };
        match event {
            AppEvent::Key(key) => {
                let action = input::map_key(key, &state.input_context());
                state.handle_action(action);
            }
            AppEvent::Mouse(mouse) => state.handle_mouse(input::map_mouse(mouse)),
            AppEvent::Resize(width, height) => state.set_terminal_size(width, height),
            AppEvent::Tick => state.on_tick(),
            AppEvent::QueryResult { ticket, result } => state.handle_query_result(&ticket, result),
            AppEvent::SubscriptionStatus {
                dashboard,
                summaries,
            } => {
                for change in state.handle_subscription_status(&dashboard, &summaries) {
                    spawn_notification(tx, change);
                }
            }
            AppEvent::Error(e) => state.set_error(e),
        }

        if state.should_quit {
            events.stop();
            return Ok(());
        }

        for ticket in state.collect_fetches(Instant::now()) {
            spawn_fetch(api, tx, ticket);
        }

        let interval = state.poll_interval();
        interval_tx.send_if_modified(|current| {
            let changed = *current != interval;
            *current = interval;
            changed
        });
        let dashboards = state.watched_dashboards();
        dashboards_tx.send_if_modified(|current| {
            let changed = *current != dashboards;
            if changed {
                current.clone_from(&dashboards);
            }
            changed
        });
    }
}
