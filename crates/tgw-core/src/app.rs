//! Application state: the preference stores, the query cache, the sidebar navigator
//! and whichever view occupies the main pane.
//!
//! All mutation happens on the event loop. Fetches are never started from here;
//! [`AppState::collect_fetches`] hands out tickets and the caller runs them.

use crate::diff::{self, StatusChange, StatusSnapshot};
use crate::filter::{FilterState, FilterStore, FilteredRows};
use crate::grid::{CellDetail, GridComposer, GridConfig};
use crate::input::{Action, Focus, InputContext, MouseAction, OverlayMode};
use crate::model::{worst_status, Header, OverallStatus, Row, TabSummary};
use crate::notify;
use crate::prefs::{FocusTarget, ResolvedTheme, ThemeStore, UiStore};
use crate::query::{QueryCache, QueryData, QueryKey, Remote, Ticket};
use crate::search::{self, SearchResult};
use crate::storage::Storage;
use crate::subscription::{SettingsError, Subscription, SubscriptionKind, SubscriptionStore, SubscriptionTarget};
use crate::api::ApiError;
use ratatui::layout::Rect;
use std::time::Instant;

// UI constants
pub const NOTIFICATION_TTL_SECS: u64 = 5;
pub const ERROR_TTL_SECS: u64 = 10;
pub const SPINNER_FRAME_COUNT: usize = 10;
pub const SIDEBAR_WIDTH: u16 = 36;
pub const NARROW_WIDTH_THRESHOLD: u16 = 80;

/// Rows above the grid inside the main pane: filter toolbar and info bar.
const GRID_CHROME_HEIGHT: u16 = 2;

/// Screen regions shared by the renderer and mouse hit-testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLayout {
    pub header: Rect,
    pub sidebar: Option<Rect>,
    pub main: Rect,
    pub footer: Rect,
}

impl ScreenLayout {
    pub fn compute(area: Rect, sidebar_visible: bool) -> Self {
        let header = Rect::new(area.x, area.y, area.width, area.height.min(1));
        let footer_y = area.y + area.height.saturating_sub(1);
        let footer = Rect::new(area.x, footer_y, area.width, area.height.saturating_sub(1).min(1));
        let body_y = area.y + header.height;
        let body_height = area.height.saturating_sub(header.height + footer.height);

        let sidebar_width = if sidebar_visible && area.width >= NARROW_WIDTH_THRESHOLD {
            SIDEBAR_WIDTH.min(area.width / 2)
        } else {
            0
        };
        let sidebar = (sidebar_width > 0).then(|| Rect::new(area.x, body_y, sidebar_width, body_height));
        let main = Rect::new(
            area.x + sidebar_width,
            body_y,
            area.width - sidebar_width,
            body_height,
        );
        Self {
            header,
            sidebar,
            main,
            footer,
        }
    }

    /// Navigator rows: the sidebar minus its title line and right separator.
    pub fn nav_list(&self) -> Option<Rect> {
        self.sidebar.map(|s| {
            Rect::new(
                s.x,
                s.y + s.height.min(1),
                s.width.saturating_sub(1),
                s.height.saturating_sub(1),
            )
        })
    }

    pub fn toolbar(&self) -> Rect {
        Rect::new(self.main.x, self.main.y, self.main.width, self.main.height.min(1))
    }

    pub fn info_bar(&self) -> Rect {
        let y = self.main.y + self.main.height.min(1);
        Rect::new(self.main.x, y, self.main.width, self.main.height.saturating_sub(1).min(1))
    }

    pub fn grid(&self) -> Rect {
        let chrome = GRID_CHROME_HEIGHT.min(self.main.height);
        Rect::new(
            self.main.x,
            self.main.y + chrome,
            self.main.width,
            self.main.height - chrome,
        )
    }
}

fn contains(rect: Rect, x: u16, y: u16) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

/// One line of the accordion navigator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavItem {
    Group {
        name: String,
        expanded: bool,
    },
    Dashboard {
        group: String,
        name: String,
        expanded: bool,
    },
    Tab {
        group: String,
        dashboard: String,
        name: String,
    },
    Loading {
        depth: u8,
    },
    Failed {
        depth: u8,
        key: QueryKey,
    },
    Empty {
        depth: u8,
    },
}

impl NavItem {
    pub fn depth(&self) -> u8 {
        match self {
            NavItem::Group { .. } => 0,
            NavItem::Dashboard { .. } => 1,
            NavItem::Tab { .. } => 2,
            NavItem::Loading { depth } | NavItem::Failed { depth, .. } | NavItem::Empty { depth } => {
                *depth
            }
        }
    }

    /// Same group, dashboard or tab regardless of expansion.
    fn same_node(&self, other: &NavItem) -> bool {
        match (self, other) {
            (NavItem::Group { name: a, .. }, NavItem::Group { name: b, .. }) => a == b,
            (
                NavItem::Dashboard { group: ga, name: a, .. },
                NavItem::Dashboard { group: gb, name: b, .. },
            ) => ga == gb && a == b,
            (
                NavItem::Tab {
                    dashboard: da, name: a, ..
                },
                NavItem::Tab {
                    dashboard: db, name: b, ..
                },
            ) => da == db && a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    Group(String),
    Dashboard {
        group: String,
        name: String,
    },
    Tab {
        group: String,
        dashboard: String,
        name: String,
    },
}

impl SearchTarget {
    pub fn kind_label(&self) -> &'static str {
        match self {
            SearchTarget::Group(_) => "group",
            SearchTarget::Dashboard { .. } => "dashboard",
            SearchTarget::Tab { .. } => "tab",
        }
    }

    /// Where the item lives, shown next to the match.
    pub fn context(&self) -> Option<String> {
        match self {
            SearchTarget::Group(_) => None,
            SearchTarget::Dashboard { group, .. } => Some(group.clone()),
            SearchTarget::Tab {
                group, dashboard, ..
            } => Some(format!("{group} / {dashboard}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub text: String,
    pub target: SearchTarget,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOverlay {
    pub entries: Vec<SearchEntry>,
    pub results: Vec<SearchResult<SearchEntry>>,
    pub cursor: usize,
}

impl SearchOverlay {
    fn update(&mut self, query: &str) {
        self.results = search::fuzzy_search(&self.entries, query, |e| e.text.as_str(), search::MAX_RESULTS)
            .into_iter()
            .map(|r| SearchResult {
                item: r.item.clone(),
                score: r.score,
                matches: r.matches,
            })
            .collect();
        self.cursor = 0;
    }

    pub fn selected(&self) -> Option<&SearchResult<SearchEntry>> {
        self.results.get(self.cursor)
    }
}

/// Overlays are mutually exclusive.
#[derive(Debug, Clone, Default)]
pub enum ActiveOverlay {
    #[default]
    None,
    /// The selected cell lives in the grid view's composer.
    Detail,
    Search(SearchOverlay),
    /// Editing the tab's text filter; `original` is restored on cancel.
    TextFilter { original: String },
}

#[derive(Debug)]
pub struct GridView {
    pub dashboard: String,
    pub tab: String,
    pub composer: GridComposer,
    pub filtered: FilteredRows,
}

impl GridView {
    fn new(dashboard: &str, tab: &str) -> Self {
        Self {
            dashboard: dashboard.to_string(),
            tab: tab.to_string(),
            composer: GridComposer::new(GridConfig::default()),
            filtered: FilteredRows::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionsView {
    pub cursor: usize,
    return_to: Option<Box<GridView>>,
}

#[derive(Debug, Default)]
pub enum View {
    #[default]
    Empty,
    Grid(Box<GridView>),
    Subscriptions(SubscriptionsView),
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub failure: bool,
    pub timestamp: Instant,
}

/// Startup options from the command line.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Shown in the header, e.g. `0.3.0+42`.
    pub version: String,
    pub base_url: String,
    pub dashboard: Option<String>,
    pub tab: Option<String>,
    pub desktop_notify: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            base_url: crate::api::DEFAULT_BASE_URL.to_string(),
            dashboard: None,
            tab: None,
            desktop_notify: true,
        }
    }
}

fn headers_of<'a>(cache: &'a QueryCache, dashboard: &str, tab: &str) -> &'a [Header] {
    cache
        .get(&QueryKey::headers(dashboard, tab))
        .and_then(QueryData::as_headers)
        .map_or(&[][..], |h| h.headers.as_slice())
}

fn rows_of<'a>(cache: &'a QueryCache, dashboard: &str, tab: &str) -> &'a [Row] {
    cache
        .get(&QueryKey::rows(dashboard, tab))
        .and_then(QueryData::as_rows)
        .map_or(&[][..], |r| r.rows.as_slice())
}

pub struct AppState {
    pub config: AppConfig,
    storage: Box<dyn Storage>,

    // Stores
    pub subscriptions: SubscriptionStore,
    pub filters: FilterStore,
    pub theme: ThemeStore,
    pub ui: UiStore,
    pub resolved_theme: ResolvedTheme,

    // Remote data
    pub cache: QueryCache,
    queued: Vec<Ticket>,
    /// Dashboard to open once its tab list arrives.
    pending_open: Option<String>,

    // Navigation
    pub nav: Vec<NavItem>,
    pub nav_cursor: usize,
    pub nav_offset: usize,
    pub view: View,
    pub overlay: ActiveOverlay,
    pub layout: ScreenLayout,
    terminal_size: (u16, u16),

    // Subscription polling
    pub snapshot: StatusSnapshot,
    pub last_poll: Option<Instant>,

    // Transient UI
    pub notifications: Vec<Notification>,
    pub error: Option<(String, Instant)>,
    pub spinner_frame: usize,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(storage: Box<dyn Storage>, config: AppConfig) -> Self {
        let subscriptions = SubscriptionStore::load(storage.as_ref());
        let filters = FilterStore::load(storage.as_ref());
        let theme = ThemeStore::load(storage.as_ref());
        let ui = UiStore::load(storage.as_ref());
        let resolved_theme = theme.theme.resolve();

        let mut state = Self {
            storage,
            subscriptions,
            filters,
            theme,
            ui,
            resolved_theme,
            cache: QueryCache::new(),
            queued: Vec::new(),
            pending_open: None,
            nav: Vec::new(),
            nav_cursor: 0,
            nav_offset: 0,
            view: View::Empty,
            overlay: ActiveOverlay::None,
            layout: ScreenLayout::compute(Rect::new(0, 0, 120, 40), true),
            terminal_size: (120, 40),
            snapshot: StatusSnapshot::default(),
            last_poll: None,
            notifications: Vec::new(),
            error: None,
            spinner_frame: 0,
            should_quit: false,
            config,
        };

        match (state.config.dashboard.clone(), state.config.tab.clone()) {
            (Some(dashboard), Some(tab)) => state.open_tab(&dashboard, &tab),
            (Some(dashboard), None) => {
                state.pending_open = Some(dashboard.clone());
                state.open_pending(&dashboard);
            }
            _ => {}
        }
        state.rebuild_nav();
        state
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    // --- Fetching ---

    /// Keys the current screen depends on.
    pub fn wanted_keys(&self) -> Vec<QueryKey> {
        let mut keys = vec![QueryKey::DashboardGroups];
        let groups = self
            .cache
            .get(&QueryKey::DashboardGroups)
            .and_then(QueryData::as_groups);
        for group in groups.map_or(&[][..], |g| g.dashboard_groups.as_slice()) {
            if !self.ui.is_group_expanded(&group.name) {
                continue;
            }
            let dashboards_key = QueryKey::DashboardsInGroup(group.name.clone());
            let dashboards = self.cache.get(&dashboards_key).and_then(QueryData::as_dashboards);
            keys.push(dashboards_key.clone());
            keys.push(QueryKey::GroupSummaries(group.name.clone()));
            for dashboard in dashboards.map_or(&[][..], |d| d.dashboards.as_slice()) {
                if self.ui.is_dashboard_expanded(&dashboard.name) {
                    keys.push(QueryKey::DashboardTabs(dashboard.name.clone()));
                    keys.push(QueryKey::TabSummaries(dashboard.name.clone()));
                }
            }
        }
        if let Some(dashboard) = &self.pending_open {
            keys.push(QueryKey::DashboardTabs(dashboard.clone()));
        }
        if let Some(view) = self.grid_view() {
            keys.push(QueryKey::headers(&view.dashboard, &view.tab));
            keys.push(QueryKey::rows(&view.dashboard, &view.tab));
            keys.push(QueryKey::DashboardSummary(view.dashboard.clone()));
            keys.push(QueryKey::TabSummary {
                dashboard: view.dashboard.clone(),
                tab: view.tab.clone(),
            });
        }
        keys.dedup();
        keys
    }

    /// Tickets for missing or stale data plus any queued retries.
    pub fn collect_fetches(&mut self, now: Instant) -> Vec<Ticket> {
        let mut tickets = std::mem::take(&mut self.queued);
        for key in self.wanted_keys() {
            if let Some(ticket) = self.cache.ensure(&key, now) {
                tickets.push(ticket);
            }
        }
        tickets
    }

    pub fn is_loading(&self) -> bool {
        self.wanted_keys().iter().any(|k| self.cache.is_in_flight(k))
    }

    pub fn handle_query_result(&mut self, ticket: &Ticket, result: Result<QueryData, ApiError>) {
        let failure = result.as_ref().err().map(ToString::to_string);
        if !self.cache.complete(ticket, result, Instant::now()) {
            return;
        }
        if let Some(message) = failure {
            tracing::warn!(key = %ticket.key.describe(), error = %message, "query failed");
            self.set_error(message);
        }
        if let QueryKey::DashboardTabs(dashboard) = &ticket.key {
            self.open_pending(dashboard);
        }
        self.rebuild_nav();
        if self.shows_key(&ticket.key) {
            self.sync_grid();
        }
    }

    /// Whether `key` feeds the open grid.
    fn shows_key(&self, key: &QueryKey) -> bool {
        let View::Grid(view) = &self.view else {
            return false;
        };
        *key == QueryKey::headers(&view.dashboard, &view.tab)
            || *key == QueryKey::rows(&view.dashboard, &view.tab)
    }

    fn open_pending(&mut self, dashboard: &str) {
        if self.pending_open.as_deref() != Some(dashboard) {
            return;
        }
        let first_tab = self
            .cache
            .get(&QueryKey::DashboardTabs(dashboard.to_string()))
            .and_then(QueryData::as_tabs)
            .and_then(|t| t.dashboard_tabs.first())
            .map(|t| t.name.clone());
        if let Some(tab) = first_tab {
            self.pending_open = None;
            self.open_tab(dashboard, &tab);
        }
    }

    /// `r`: retry failed queries and refetch whatever is on screen.
    pub fn refresh(&mut self) {
        let wanted = self.wanted_keys();
        for key in self.cache.failed_keys() {
            if wanted.contains(&key) {
                if let Some(ticket) = self.cache.retry(&key) {
                    self.queued.push(ticket);
                }
            }
        }
        self.cache.invalidate_where(|k| wanted.contains(k));
        self.clear_error();
    }

    // --- Navigator ---

    fn push_remote<'a>(
        &'a self,
        key: &QueryKey,
        depth: u8,
        items: &mut Vec<NavItem>,
    ) -> Option<&'a QueryData> {
        match self.cache.status(key) {
            Remote::Ready(data) => Some(data),
            Remote::Failed(_) => {
                items.push(NavItem::Failed {
                    depth,
                    key: key.clone(),
                });
                None
            }
            Remote::Loading | Remote::Idle => {
                items.push(NavItem::Loading { depth });
                None
            }
        }
    }

    fn build_nav(&self) -> Vec<NavItem> {
        let mut items = Vec::new();
        let Some(groups) = self
            .push_remote(&QueryKey::DashboardGroups, 0, &mut items)
            .and_then(QueryData::as_groups)
        else {
            return items;
        };
        if groups.dashboard_groups.is_empty() {
            items.push(NavItem::Empty { depth: 0 });
        }
        for group in &groups.dashboard_groups {
            let expanded = self.ui.is_group_expanded(&group.name);
            items.push(NavItem::Group {
                name: group.name.clone(),
                expanded,
            });
            if !expanded {
                continue;
            }
            let key = QueryKey::DashboardsInGroup(group.name.clone());
            let Some(dashboards) = self
                .push_remote(&key, 1, &mut items)
                .and_then(QueryData::as_dashboards)
            else {
                continue;
            };
            if dashboards.dashboards.is_empty() {
                items.push(NavItem::Empty { depth: 1 });
            }
            for dashboard in &dashboards.dashboards {
                let expanded = self.ui.is_dashboard_expanded(&dashboard.name);
                items.push(NavItem::Dashboard {
                    group: group.name.clone(),
                    name: dashboard.name.clone(),
                    expanded,
                });
                if !expanded {
                    continue;
                }
                let key = QueryKey::DashboardTabs(dashboard.name.clone());
                let Some(tabs) = self.push_remote(&key, 2, &mut items).and_then(QueryData::as_tabs) else {
                    continue;
                };
                if tabs.dashboard_tabs.is_empty() {
                    items.push(NavItem::Empty { depth: 2 });
                }
                items.extend(tabs.dashboard_tabs.iter().map(|tab| NavItem::Tab {
                    group: group.name.clone(),
                    dashboard: dashboard.name.clone(),
                    name: tab.name.clone(),
                }));
            }
        }
        items
    }

    /// Rebuild the navigator, keeping the cursor on the same node when it survives.
    pub fn rebuild_nav(&mut self) {
        let current = self.nav.get(self.nav_cursor).cloned();
        self.nav = self.build_nav();
        if let Some(current) = current {
            if let Some(pos) = self.nav.iter().position(|item| item.same_node(&current)) {
                self.nav_cursor = pos;
            }
        }
        if self.nav_cursor >= self.nav.len() {
            self.nav_cursor = self.nav.len().saturating_sub(1);
        }
        self.ensure_nav_visible();
    }

    fn nav_height(&self) -> usize {
        self.layout.nav_list().map_or(0, |r| r.height as usize)
    }

    fn ensure_nav_visible(&mut self) {
        let height = self.nav_height().max(1);
        if self.nav_cursor < self.nav_offset {
            self.nav_offset = self.nav_cursor;
        } else if self.nav_cursor >= self.nav_offset + height {
            self.nav_offset = self.nav_cursor + 1 - height;
        }
        let max_offset = self.nav.len().saturating_sub(height);
        self.nav_offset = self.nav_offset.min(max_offset);
    }

    pub fn current_nav(&self) -> Option<&NavItem> {
        self.nav.get(self.nav_cursor)
    }

    fn move_nav(&mut self, delta: isize) {
        let max = self.nav.len().saturating_sub(1);
        self.nav_cursor = self.nav_cursor.saturating_add_signed(delta).min(max);
        self.ensure_nav_visible();
    }

    fn set_nav_cursor(&mut self, index: usize) {
        self.nav_cursor = index.min(self.nav.len().saturating_sub(1));
        self.ensure_nav_visible();
    }

    /// Worst dashboard status in the group, once its summaries are loaded.
    pub fn group_status(&self, group: &str) -> Option<OverallStatus> {
        let summaries = self
            .cache
            .get(&QueryKey::GroupSummaries(group.to_string()))
            .and_then(QueryData::as_group_summaries)?;
        Some(worst_status(
            summaries.dashboard_summaries.iter().map(|s| s.overall_status),
        ))
    }

    pub fn dashboard_status(&self, group: &str, dashboard: &str) -> Option<OverallStatus> {
        self.cache
            .get(&QueryKey::GroupSummaries(group.to_string()))
            .and_then(QueryData::as_group_summaries)?
            .dashboard_summaries
            .iter()
            .find(|s| s.name == dashboard)
            .map(|s| s.overall_status)
    }

    /// Cached tab summary, falling back to what the subscription poller last saw.
    pub fn tab_status(&self, dashboard: &str, tab: &str) -> Option<OverallStatus> {
        self.cache
            .get(&QueryKey::TabSummaries(dashboard.to_string()))
            .and_then(QueryData::as_tab_summaries)
            .and_then(|s| s.tab_summaries.iter().find(|t| t.tab_name == tab))
            .map(|t| t.overall_status)
            .or_else(|| self.snapshot.get(dashboard, tab))
    }

    fn expand_nav(&mut self) {
        match self.current_nav().cloned() {
            Some(NavItem::Group { name, expanded: false }) => {
                self.ui.expand_group(&name);
                self.save_ui();
                self.rebuild_nav();
            }
            Some(NavItem::Dashboard { name, expanded: false, .. }) => {
                self.ui.expand_dashboard(&name);
                self.save_ui();
                self.rebuild_nav();
            }
            Some(NavItem::Tab { dashboard, name, .. }) => self.open_tab(&dashboard, &name),
            Some(NavItem::Failed { key, .. }) => self.retry(&key),
            _ => {}
        }
    }

    fn collapse_nav(&mut self) {
        match self.current_nav().cloned() {
            Some(NavItem::Group { name, expanded: true }) => {
                self.ui.toggle_group(&name);
                self.save_ui();
                self.rebuild_nav();
            }
            Some(NavItem::Dashboard { name, expanded: true, .. }) => {
                self.ui.toggle_dashboard(&name);
                self.save_ui();
                self.rebuild_nav();
            }
            Some(item) if item.depth() > 0 => {
                // Jump to the parent
                let depth = item.depth();
                if let Some(parent) = self.nav[..self.nav_cursor]
                    .iter()
                    .rposition(|i| i.depth() < depth)
                {
                    self.set_nav_cursor(parent);
                }
            }
            _ => {}
        }
    }

    fn toggle_nav(&mut self) {
        match self.current_nav().cloned() {
            Some(NavItem::Group { name, .. }) => {
                self.ui.toggle_group(&name);
                self.save_ui();
                self.rebuild_nav();
            }
            Some(NavItem::Dashboard { name, .. }) => {
                self.ui.toggle_dashboard(&name);
                self.save_ui();
                self.rebuild_nav();
            }
            Some(NavItem::Tab { dashboard, name, .. }) => self.open_tab(&dashboard, &name),
            Some(NavItem::Failed { key, .. }) => self.retry(&key),
            _ => {}
        }
    }

    fn retry(&mut self, key: &QueryKey) {
        if let Some(ticket) = self.cache.retry(key) {
            self.queued.push(ticket);
        }
        self.rebuild_nav();
    }

    // --- Views ---

    pub fn grid_view(&self) -> Option<&GridView> {
        match &self.view {
            View::Grid(view) => Some(view),
            _ => None,
        }
    }

    fn grid_view_mut(&mut self) -> Option<&mut GridView> {
        match &mut self.view {
            View::Grid(view) => Some(view),
            _ => None,
        }
    }

    /// Headers and rows for the open tab, empty until loaded.
    pub fn grid_data(&self) -> Option<(&GridView, &[Header], &[Row])> {
        let view = self.grid_view()?;
        Some((
            view,
            headers_of(&self.cache, &view.dashboard, &view.tab),
            rows_of(&self.cache, &view.dashboard, &view.tab),
        ))
    }

    /// Combined state of the two requests the grid needs.
    pub fn grid_status(&self) -> Remote<()> {
        let Some(view) = self.grid_view() else {
            return Remote::Idle;
        };
        let headers = self.cache.status(&QueryKey::headers(&view.dashboard, &view.tab));
        let rows = self.cache.status(&QueryKey::rows(&view.dashboard, &view.tab));
        match (headers, rows) {
            (Remote::Failed(e), _) | (_, Remote::Failed(e)) => Remote::Failed(e),
            (Remote::Ready(_), Remote::Ready(_)) => Remote::Ready(()),
            _ => Remote::Loading,
        }
    }

    pub fn current_tab_summary(&self) -> Option<&TabSummary> {
        let view = self.grid_view()?;
        let key = QueryKey::TabSummary {
            dashboard: view.dashboard.clone(),
            tab: view.tab.clone(),
        };
        self.cache
            .get(&key)
            .and_then(QueryData::as_tab_summary)
            .map(|s| &s.tab_summary)
    }

    pub fn current_dashboard_status(&self) -> Option<OverallStatus> {
        let view = self.grid_view()?;
        self.cache
            .get(&QueryKey::DashboardSummary(view.dashboard.clone()))
            .and_then(QueryData::as_dashboard_summary)
            .map(|s| s.dashboard_summary.overall_status)
    }

    pub fn current_filter(&self) -> Option<FilterState> {
        let view = self.grid_view()?;
        Some(self.filters.get(&view.dashboard, &view.tab))
    }

    pub fn open_tab(&mut self, dashboard: &str, tab: &str) {
        let same = self
            .grid_view()
            .is_some_and(|v| v.dashboard == dashboard && v.tab == tab);
        if !same {
            tracing::debug!(%dashboard, %tab, "opening tab");
            self.view = View::Grid(Box::new(GridView::new(dashboard, tab)));
            self.overlay = ActiveOverlay::None;
        }
        self.ui.focus_target = FocusTarget::Grid;
        self.apply_grid_viewport();
        self.sync_grid();
    }

    fn apply_grid_viewport(&mut self) {
        let grid = self.layout.grid();
        if let Some(view) = self.grid_view_mut() {
            view.composer
                .set_viewport(grid.width as usize, grid.height as usize);
        }
    }

    /// Refilter when rows or the filter changed and resize both scroll axes.
    pub fn sync_grid(&mut self) {
        let View::Grid(view) = &mut self.view else {
            return;
        };
        let filter = self.filters.get(&view.dashboard, &view.tab);
        let headers = headers_of(&self.cache, &view.dashboard, &view.tab);
        let rows = rows_of(&self.cache, &view.dashboard, &view.tab);
        let revision = self
            .cache
            .revision_of(&QueryKey::rows(&view.dashboard, &view.tab));
        let count = view.filtered.refresh(rows, revision, &filter).len();
        view.composer.set_dimensions(count, headers.len());
    }

    pub fn show_subscriptions(&mut self) {
        if matches!(self.view, View::Subscriptions(_)) {
            return;
        }
        let return_to = match std::mem::take(&mut self.view) {
            View::Grid(view) => Some(view),
            _ => None,
        };
        self.view = View::Subscriptions(SubscriptionsView {
            cursor: 0,
            return_to,
        });
        self.overlay = ActiveOverlay::None;
        self.ui.focus_target = FocusTarget::Grid;
    }

    /// Subscriptions grouped by type, in creation order within a type.
    pub fn subscription_entries(&self) -> Vec<&Subscription> {
        SubscriptionKind::ALL
            .into_iter()
            .flat_map(|kind| self.subscriptions.by_type(kind))
            .collect()
    }

    fn back(&mut self) {
        match std::mem::take(&mut self.view) {
            View::Subscriptions(subs) => {
                self.view = subs.return_to.map_or(View::Empty, View::Grid);
                self.apply_grid_viewport();
                self.sync_grid();
            }
            other => {
                self.view = other;
                self.ui.focus_target = FocusTarget::Sidebar;
            }
        }
    }

    pub fn sidebar_visible(&self) -> bool {
        self.layout.sidebar.is_some()
    }

    pub fn input_context(&self) -> InputContext {
        let overlay = match &self.overlay {
            ActiveOverlay::None => OverlayMode::None,
            ActiveOverlay::Detail => OverlayMode::Detail,
            ActiveOverlay::Search(_) => OverlayMode::Search,
            ActiveOverlay::TextFilter { .. } => OverlayMode::TextFilter,
        };
        let main_focused = self.ui.focus_target == FocusTarget::Grid || !self.sidebar_visible();
        let focus = match &self.view {
            View::Grid(_) if main_focused => Focus::Grid,
            View::Subscriptions(_) if main_focused => Focus::Subscriptions,
            _ => Focus::Sidebar,
        };
        InputContext {
            has_error: self.error.is_some(),
            overlay,
            focus,
        }
    }

    pub fn set_terminal_size(&mut self, width: u16, height: u16) {
        self.terminal_size = (width, height);
        self.layout = ScreenLayout::compute(Rect::new(0, 0, width, height), !self.ui.sidebar_collapsed);
        self.apply_grid_viewport();
        self.ensure_nav_visible();
    }

    fn toggle_sidebar(&mut self) {
        self.ui.toggle_sidebar();
        self.save_ui();
        let (width, height) = self.terminal_size;
        self.set_terminal_size(width, height);
        if self.ui.sidebar_collapsed && !matches!(self.view, View::Empty) {
            self.ui.focus_target = FocusTarget::Grid;
        }
    }

    fn switch_focus(&mut self) {
        if matches!(self.view, View::Empty) || !self.sidebar_visible() {
            return;
        }
        self.ui.focus_target = match self.ui.focus_target {
            FocusTarget::Sidebar => FocusTarget::Grid,
            FocusTarget::Grid => FocusTarget::Sidebar,
        };
    }

    fn cycle_theme(&mut self) {
        let theme = self.theme.cycle();
        self.theme.save(self.storage.as_ref());
        self.resolved_theme = theme.resolve();
        self.notify(format!("Theme: {}", theme.label()), false);
    }

    // --- Search ---

    /// Every group, dashboard and tab name the cache knows about, in navigator order.
    pub fn search_entries(&self) -> Vec<SearchEntry> {
        let mut entries = Vec::new();
        let groups = self
            .cache
            .get(&QueryKey::DashboardGroups)
            .and_then(QueryData::as_groups);
        for group in groups.map_or(&[][..], |g| g.dashboard_groups.as_slice()) {
            entries.push(SearchEntry {
                text: group.name.clone(),
                target: SearchTarget::Group(group.name.clone()),
            });
            let dashboards = self
                .cache
                .get(&QueryKey::DashboardsInGroup(group.name.clone()))
                .and_then(QueryData::as_dashboards);
            for dashboard in dashboards.map_or(&[][..], |d| d.dashboards.as_slice()) {
                entries.push(SearchEntry {
                    text: dashboard.name.clone(),
                    target: SearchTarget::Dashboard {
                        group: group.name.clone(),
                        name: dashboard.name.clone(),
                    },
                });
                let tabs = self
                    .cache
                    .get(&QueryKey::DashboardTabs(dashboard.name.clone()))
                    .and_then(QueryData::as_tabs);
                for tab in tabs.map_or(&[][..], |t| t.dashboard_tabs.as_slice()) {
                    entries.push(SearchEntry {
                        text: tab.name.clone(),
                        target: SearchTarget::Tab {
                            group: group.name.clone(),
                            dashboard: dashboard.name.clone(),
                            name: tab.name.clone(),
                        },
                    });
                }
            }
        }
        entries
    }

    fn open_search(&mut self) {
        self.ui.open_search();
        self.overlay = ActiveOverlay::Search(SearchOverlay {
            entries: self.search_entries(),
            ..SearchOverlay::default()
        });
    }

    /// Expand the target's ancestors and put the navigator cursor on it.
    pub fn reveal(&mut self, target: &SearchTarget) {
        let wanted = match target {
            SearchTarget::Group(name) => NavItem::Group {
                name: name.clone(),
                expanded: false,
            },
            SearchTarget::Dashboard { group, name } => {
                self.ui.expand_group(group);
                NavItem::Dashboard {
                    group: group.clone(),
                    name: name.clone(),
                    expanded: false,
                }
            }
            SearchTarget::Tab {
                group,
                dashboard,
                name,
            } => {
                self.ui.expand_group(group);
                self.ui.expand_dashboard(dashboard);
                NavItem::Tab {
                    group: group.clone(),
                    dashboard: dashboard.clone(),
                    name: name.clone(),
                }
            }
        };
        self.save_ui();
        self.rebuild_nav();
        if let Some(pos) = self.nav.iter().position(|item| item.same_node(&wanted)) {
            self.set_nav_cursor(pos);
        }
        match target {
            SearchTarget::Tab { dashboard, name, .. } => self.open_tab(dashboard, name),
            _ => self.ui.focus_target = FocusTarget::Sidebar,
        }
    }

    // --- Overlays ---

    fn close_overlay(&mut self) {
        match std::mem::take(&mut self.overlay) {
            ActiveOverlay::Detail => {
                if let Some(view) = self.grid_view_mut() {
                    view.composer.close_detail();
                }
            }
            ActiveOverlay::Search(_) => self.ui.close_search(),
            ActiveOverlay::TextFilter { original } => {
                if let Some(view) = self.grid_view() {
                    let (dashboard, tab) = (view.dashboard.clone(), view.tab.clone());
                    self.filters.set_text(&dashboard, &tab, original);
                    self.sync_grid();
                }
            }
            ActiveOverlay::None => {}
        }
    }

    fn overlay_input(&mut self, c: Option<char>) {
        let edit = |text: &mut String| match c {
            Some(c) => text.push(c),
            None => {
                text.pop();
            }
        };
        if let ActiveOverlay::Search(search) = &mut self.overlay {
            edit(&mut self.ui.search_query);
            search.update(&self.ui.search_query);
            return;
        }
        if !matches!(self.overlay, ActiveOverlay::TextFilter { .. }) {
            return;
        }
        let Some(view) = self.grid_view() else {
            return;
        };
        let (dashboard, tab) = (view.dashboard.clone(), view.tab.clone());
        let mut text = self.filters.get(&dashboard, &tab).text_filter;
        edit(&mut text);
        self.filters.set_text(&dashboard, &tab, text);
        self.sync_grid();
    }

    fn overlay_submit(&mut self) {
        match std::mem::take(&mut self.overlay) {
            ActiveOverlay::Search(search) => {
                self.ui.close_search();
                if let Some(result) = search.selected() {
                    let target = result.item.target.clone();
                    self.reveal(&target);
                }
            }
            ActiveOverlay::TextFilter { .. } => self.filters.save(self.storage.as_ref()),
            other => self.overlay = other,
        }
    }

    fn move_search(&mut self, delta: isize) {
        if let ActiveOverlay::Search(search) = &mut self.overlay {
            let max = search.results.len().saturating_sub(1);
            search.cursor = search.cursor.saturating_add_signed(delta).min(max);
        }
    }

    pub fn selected_cell(&self) -> Option<&CellDetail> {
        if !matches!(self.overlay, ActiveOverlay::Detail) {
            return None;
        }
        self.grid_view()?.composer.selected()
    }

    fn open_detail_at_cursor(&mut self) {
        let View::Grid(view) = &mut self.view else {
            return;
        };
        let headers = headers_of(&self.cache, &view.dashboard, &view.tab);
        let rows = rows_of(&self.cache, &view.dashboard, &view.tab);
        if view
            .composer
            .open_at_cursor(headers, rows, view.filtered.indices())
            .is_some()
        {
            self.overlay = ActiveOverlay::Detail;
        }
    }

    // --- Filters ---

    fn update_filter(&mut self, update: impl FnOnce(&mut FilterStore, &str, &str)) {
        let Some(view) = self.grid_view() else {
            return;
        };
        let (dashboard, tab) = (view.dashboard.clone(), view.tab.clone());
        update(&mut self.filters, &dashboard, &tab);
        self.filters.save(self.storage.as_ref());
        self.sync_grid();
    }

    // --- Subscriptions ---

    fn subscription_target(&self) -> Option<SubscriptionTarget> {
        if let Some(detail) = self.selected_cell() {
            let view = self.grid_view()?;
            return Some(SubscriptionTarget::test(
                &view.dashboard,
                &view.tab,
                &detail.row_name,
            ));
        }
        match self.input_context().focus {
            Focus::Sidebar => match self.current_nav()? {
                NavItem::Dashboard { name, .. } => Some(SubscriptionTarget::dashboard(name)),
                NavItem::Tab { dashboard, name, .. } => Some(SubscriptionTarget::tab(dashboard, name)),
                _ => None,
            },
            Focus::Grid => {
                let view = self.grid_view()?;
                Some(SubscriptionTarget::tab(&view.dashboard, &view.tab))
            }
            Focus::Subscriptions => None,
        }
    }

    pub fn toggle_subscription(&mut self) {
        let Some(target) = self.subscription_target() else {
            return;
        };
        let name = target.display_name();
        let dashboard = target.dashboard_name().to_string();
        let subscribed = self.subscriptions.toggle(target);
        self.subscriptions.save(self.storage.as_ref());
        self.forget_if_unwatched(&dashboard);
        let message = if subscribed {
            format!("Subscribed to {name}")
        } else {
            format!("Unsubscribed from {name}")
        };
        self.notify(message, false);
    }

    fn delete_subscription(&mut self) {
        let View::Subscriptions(view) = &self.view else {
            return;
        };
        let Some(id) = self.subscription_entries().get(view.cursor).map(|s| s.id.clone()) else {
            return;
        };
        let dashboard = self.subscriptions.get(&id).map(|s| s.target.dashboard_name().to_string());
        if self.subscriptions.unsubscribe(&id) {
            self.subscriptions.save(self.storage.as_ref());
        }
        if let Some(dashboard) = dashboard {
            self.forget_if_unwatched(&dashboard);
        }
        let len = self.subscriptions.len();
        if let View::Subscriptions(view) = &mut self.view {
            view.cursor = view.cursor.min(len.saturating_sub(1));
        }
    }

    fn open_subscription(&mut self) {
        let View::Subscriptions(view) = &self.view else {
            return;
        };
        let Some(target) = self
            .subscription_entries()
            .get(view.cursor)
            .map(|s| s.target.clone())
        else {
            return;
        };
        match target.tab_name() {
            Some(tab) => self.open_tab(target.dashboard_name(), tab),
            None => {
                let dashboard = target.dashboard_name().to_string();
                self.pending_open = Some(dashboard.clone());
                self.open_pending(&dashboard);
            }
        }
    }

    /// Validated before anything changes; the poller picks up the new interval.
    pub fn set_poll_interval(&mut self, seconds: u64) -> Result<(), SettingsError> {
        self.subscriptions
            .update_notification_settings(|s| s.poll_interval_seconds = seconds)?;
        self.subscriptions.save(self.storage.as_ref());
        Ok(())
    }

    /// A later re-subscribe then treats a failing tab as newly failing.
    fn forget_if_unwatched(&mut self, dashboard: &str) {
        if !self.subscriptions.watched_dashboards().contains(dashboard) {
            self.snapshot.forget_dashboard(dashboard);
        }
    }

    pub fn poll_interval(&self) -> u64 {
        self.subscriptions.notification_settings().poll_interval_seconds
    }

    pub fn watched_dashboards(&self) -> Vec<String> {
        self.subscriptions.watched_dashboards().into_iter().collect()
    }

    /// Record fresh tab summaries from the poller. Returns the changes that warrant a
    /// desktop notification.
    pub fn handle_subscription_status(
        &mut self,
        dashboard: &str,
        summaries: &[TabSummary],
    ) -> Vec<StatusChange> {
        self.last_poll = Some(Instant::now());
        let changes = diff::detect_transitions(&mut self.snapshot, dashboard, summaries, &self.subscriptions);
        let now = chrono::Local::now().time();
        let settings = self.subscriptions.notification_settings().clone();
        let mut desktop = Vec::new();
        for change in changes {
            tracing::info!(message = %change.message(), "tab status changed");
            self.notify(change.message(), change.is_failure());
            if self.config.desktop_notify && notify::should_notify(&settings, &change, now) {
                desktop.push(change);
            }
        }
        desktop
    }

    // --- Input dispatch ---

    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::DismissError => self.clear_error(),
            Action::Back => self.back(),
            Action::CycleTheme => self.cycle_theme(),
            Action::ToggleSidebar => self.toggle_sidebar(),
            Action::SwitchFocus => self.switch_focus(),
            Action::OpenSearch => self.open_search(),
            Action::Refresh => self.refresh(),
            Action::ShowSubscriptions => self.show_subscriptions(),
            Action::ToggleSubscription => self.toggle_subscription(),
            Action::CloseOverlay => self.close_overlay(),
            Action::OverlayInput(c) => self.overlay_input(Some(c)),
            Action::OverlayBackspace => self.overlay_input(None),
            Action::OverlaySubmit => self.overlay_submit(),
            Action::None => {}
            Action::MoveUp if matches!(self.overlay, ActiveOverlay::Search(_)) => self.move_search(-1),
            Action::MoveDown if matches!(self.overlay, ActiveOverlay::Search(_)) => self.move_search(1),
            other => match self.input_context().focus {
                Focus::Sidebar => self.sidebar_action(other),
                Focus::Grid => self.grid_action(other),
                Focus::Subscriptions => self.subscriptions_action(other),
            },
        }
    }

    fn sidebar_action(&mut self, action: Action) {
        match action {
            Action::MoveUp => self.move_nav(-1),
            Action::MoveDown => self.move_nav(1),
            Action::PageUp => self.move_nav(-(self.nav_height().max(1) as isize)),
            Action::PageDown => self.move_nav(self.nav_height().max(1) as isize),
            Action::Top => self.set_nav_cursor(0),
            Action::Bottom => self.set_nav_cursor(self.nav.len()),
            Action::Expand => self.expand_nav(),
            Action::Collapse => self.collapse_nav(),
            Action::Select | Action::Toggle => self.toggle_nav(),
            _ => {}
        }
    }

    fn grid_action(&mut self, action: Action) {
        match action {
            Action::Select => self.open_detail_at_cursor(),
            Action::EditTextFilter => {
                if let Some(filter) = self.current_filter() {
                    self.overlay = ActiveOverlay::TextFilter {
                        original: filter.text_filter,
                    };
                }
            }
            Action::CycleStatusFilter => self.update_filter(|filters, d, t| {
                let next = filters.get(d, t).status_filter.next();
                filters.set_status(d, t, next);
            }),
            Action::ToggleFailuresOnly => self.update_filter(|filters, d, t| {
                let enabled = !filters.get(d, t).show_only_failures;
                filters.set_show_only_failures(d, t, enabled);
            }),
            Action::ClearFilters => self.update_filter(|filters, d, t| filters.clear(d, t)),
            _ => {
                let Some(view) = self.grid_view_mut() else {
                    return;
                };
                let composer = &mut view.composer;
                match action {
                    Action::MoveUp => composer.move_cursor(-1, 0),
                    Action::MoveDown => composer.move_cursor(1, 0),
                    Action::MoveLeft => composer.move_cursor(0, -1),
                    Action::MoveRight => composer.move_cursor(0, 1),
                    Action::PageUp => composer.page_rows(-1),
                    Action::PageDown => composer.page_rows(1),
                    Action::Top => composer.cursor_to_first_row(),
                    Action::Bottom => composer.cursor_to_last_row(),
                    Action::RowStart => composer.cursor_to_first_column(),
                    Action::RowEnd => composer.cursor_to_last_column(),
                    Action::CenterCursor => composer.center_on_cursor(),
                    _ => {}
                }
            }
        }
    }

    fn subscriptions_action(&mut self, action: Action) {
        let len = self.subscriptions.len();
        match action {
            Action::Select => self.open_subscription(),
            Action::DeleteEntry => self.delete_subscription(),
            _ => {
                let View::Subscriptions(view) = &mut self.view else {
                    return;
                };
                let max = len.saturating_sub(1);
                view.cursor = match action {
                    Action::MoveUp => view.cursor.saturating_sub(1),
                    Action::MoveDown => (view.cursor + 1).min(max),
                    Action::Top => 0,
                    Action::Bottom => max,
                    _ => view.cursor,
                };
            }
        }
    }

    pub fn handle_mouse(&mut self, action: MouseAction) {
        let grid = self.layout.grid();
        let nav = self.layout.nav_list();
        match action {
            MouseAction::Hover { x, y } => {
                if let Some(view) = self.grid_view_mut() {
                    if contains(grid, x, y) {
                        view.composer
                            .hover((x - grid.x) as usize, (y - grid.y) as usize);
                    } else {
                        view.composer.clear_hover();
                    }
                }
            }
            MouseAction::Click { x, y } => {
                if !matches!(self.overlay, ActiveOverlay::None) {
                    self.close_overlay();
                    return;
                }
                if let Some(list) = nav.filter(|r| contains(*r, x, y)) {
                    let index = self.nav_offset + (y - list.y) as usize;
                    if index < self.nav.len() {
                        self.ui.focus_target = FocusTarget::Sidebar;
                        self.set_nav_cursor(index);
                        self.toggle_nav();
                    }
                    return;
                }
                if contains(grid, x, y) {
                    self.click_grid((x - grid.x) as usize, (y - grid.y) as usize);
                }
            }
            MouseAction::ScrollRows(delta) => {
                if self.input_context().focus == Focus::Sidebar {
                    self.move_nav(delta);
                } else if let Some(view) = self.grid_view_mut() {
                    view.composer.scroll_rows(delta);
                }
            }
            MouseAction::ScrollColumns(delta) => {
                if let Some(view) = self.grid_view_mut() {
                    view.composer.scroll_columns(delta);
                }
            }
            MouseAction::None => {}
        }
    }

    fn click_grid(&mut self, x: usize, y: usize) {
        self.ui.focus_target = FocusTarget::Grid;
        let View::Grid(view) = &mut self.view else {
            return;
        };
        let headers = headers_of(&self.cache, &view.dashboard, &view.tab);
        let rows = rows_of(&self.cache, &view.dashboard, &view.tab);
        if view
            .composer
            .click(x, y, headers, rows, view.filtered.indices())
            .is_some()
        {
            self.overlay = ActiveOverlay::Detail;
        }
    }

    // --- Persistence helpers ---

    fn save_ui(&self) {
        self.ui.save(self.storage.as_ref());
    }

    // --- Transient UI ---

    pub fn notify(&mut self, message: String, failure: bool) {
        self.notifications.push(Notification {
            message,
            failure,
            timestamp: Instant::now(),
        });
    }

    pub fn prune_notifications(&mut self) {
        let now = Instant::now();
        self.notifications
            .retain(|n| now.duration_since(n.timestamp).as_secs() < NOTIFICATION_TTL_SECS);
    }

    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAME_COUNT;
    }

    pub fn on_tick(&mut self) {
        self.advance_spinner();
        self.prune_notifications();
        self.prune_error();
    }

    pub fn set_error(&mut self, msg: String) {
        self.error = Some((msg, Instant::now()));
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn prune_error(&mut self) {
        if let Some((_, ts)) = &self.error {
            if ts.elapsed().as_secs() >= ERROR_TTL_SECS {
                self.error = None;
            }
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|(msg, _)| msg.as_str())
    }
}
