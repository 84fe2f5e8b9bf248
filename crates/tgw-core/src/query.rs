//! Keyed cache for API responses with stale windows, request de-duplication and
//! last-request-wins completion.

use crate::api::{ApiError, TestGridApi};
use crate::model::{
    DashboardGroupList, DashboardSummaries, DashboardSummaryResponse, DashboardsInGroup,
    HeadersResponse, RowsResponse, TabList, TabSummaries, TabSummaryResponse,
};
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

const STRUCTURE_STALE: Duration = Duration::from_secs(5 * 60);
const STATUS_STALE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    DashboardGroups,
    DashboardsInGroup(String),
    GroupSummaries(String),
    DashboardSummary(String),
    DashboardTabs(String),
    TabSummaries(String),
    TabSummary { dashboard: String, tab: String },
    TabHeaders { dashboard: String, tab: String },
    TabRows { dashboard: String, tab: String },
}

impl QueryKey {
    pub fn headers(dashboard: &str, tab: &str) -> Self {
        QueryKey::TabHeaders {
            dashboard: dashboard.to_string(),
            tab: tab.to_string(),
        }
    }

    pub fn rows(dashboard: &str, tab: &str) -> Self {
        QueryKey::TabRows {
            dashboard: dashboard.to_string(),
            tab: tab.to_string(),
        }
    }

    /// Structural lists change rarely; status data goes stale after a minute.
    pub fn stale_after(&self) -> Duration {
        match self {
            QueryKey::DashboardGroups | QueryKey::DashboardsInGroup(_) | QueryKey::DashboardTabs(_) => {
                STRUCTURE_STALE
            }
            QueryKey::GroupSummaries(_)
            | QueryKey::DashboardSummary(_)
            | QueryKey::TabSummaries(_)
            | QueryKey::TabSummary { .. }
            | QueryKey::TabHeaders { .. }
            | QueryKey::TabRows { .. } => STATUS_STALE,
        }
    }

    /// Endpoint name for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            QueryKey::DashboardGroups => "dashboard-groups".to_string(),
            QueryKey::DashboardsInGroup(g) => format!("dashboard-groups/{g}"),
            QueryKey::GroupSummaries(g) => format!("dashboard-groups/{g}/dashboard-summaries"),
            QueryKey::DashboardSummary(d) => format!("dashboards/{d}/summary"),
            QueryKey::DashboardTabs(d) => format!("dashboards/{d}/tabs"),
            QueryKey::TabSummaries(d) => format!("dashboards/{d}/tab-summaries"),
            QueryKey::TabSummary { dashboard, tab } => {
                format!("dashboards/{dashboard}/tab-summaries/{tab}")
            }
            QueryKey::TabHeaders { dashboard, tab } => {
                format!("dashboards/{dashboard}/tabs/{tab}/headers")
            }
            QueryKey::TabRows { dashboard, tab } => format!("dashboards/{dashboard}/tabs/{tab}/rows"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Groups(DashboardGroupList),
    Dashboards(DashboardsInGroup),
    GroupSummaries(DashboardSummaries),
    DashboardSummary(DashboardSummaryResponse),
    Tabs(TabList),
    TabSummaries(TabSummaries),
    TabSummary(TabSummaryResponse),
    Headers(HeadersResponse),
    Rows(RowsResponse),
}

macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Option<&$ty> {
            match self {
                QueryData::$variant(inner) => Some(inner),
                _ => None,
            }
        }
    };
}

impl QueryData {
    accessor!(as_groups, Groups, DashboardGroupList);
    accessor!(as_dashboards, Dashboards, DashboardsInGroup);
    accessor!(as_group_summaries, GroupSummaries, DashboardSummaries);
    accessor!(as_dashboard_summary, DashboardSummary, DashboardSummaryResponse);
    accessor!(as_tabs, Tabs, TabList);
    accessor!(as_tab_summaries, TabSummaries, TabSummaries);
    accessor!(as_tab_summary, TabSummary, TabSummaryResponse);
    accessor!(as_headers, Headers, HeadersResponse);
    accessor!(as_rows, Rows, RowsResponse);
}

/// Run the request a key describes.
pub async fn execute(api: &dyn TestGridApi, key: &QueryKey) -> Result<QueryData, ApiError> {
    Ok(match key {
        QueryKey::DashboardGroups => QueryData::Groups(api.dashboard_groups().await?),
        QueryKey::DashboardsInGroup(g) => QueryData::Dashboards(api.dashboards_in_group(g).await?),
        QueryKey::GroupSummaries(g) => QueryData::GroupSummaries(api.group_summaries(g).await?),
        QueryKey::DashboardSummary(d) => {
            QueryData::DashboardSummary(api.dashboard_summary(d).await?)
        }
        QueryKey::DashboardTabs(d) => QueryData::Tabs(api.dashboard_tabs(d).await?),
        QueryKey::TabSummaries(d) => QueryData::TabSummaries(api.tab_summaries(d).await?),
        QueryKey::TabSummary { dashboard, tab } => {
            QueryData::TabSummary(api.tab_summary(dashboard, tab).await?)
        }
        QueryKey::TabHeaders { dashboard, tab } => {
            QueryData::Headers(api.tab_headers(dashboard, tab).await?)
        }
        QueryKey::TabRows { dashboard, tab } => QueryData::Rows(api.tab_rows(dashboard, tab).await?),
    })
}

/// State of one data-dependent region of the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Remote<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(ApiError),
}

impl<T> Remote<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Remote::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Remote::Loading)
    }

    pub fn filter_map<U>(self, f: impl FnOnce(T) -> Option<U>) -> Remote<U> {
        match self {
            Remote::Idle => Remote::Idle,
            Remote::Loading => Remote::Loading,
            Remote::Ready(value) => f(value).map_or(Remote::Idle, Remote::Ready),
            Remote::Failed(e) => Remote::Failed(e),
        }
    }
}

/// Handle for one issued fetch. Only the newest ticket for a key may complete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub key: QueryKey,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Entry {
    data: Option<QueryData>,
    error: Option<ApiError>,
    fetched_at: Option<Instant>,
    in_flight: bool,
    invalidated: bool,
    generation: u64,
    /// Bumped each time `data` is replaced.
    revision: u64,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, Entry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-key data revision; 0 until the first successful fetch.
    pub fn revision_of(&self, key: &QueryKey) -> u64 {
        self.entries.get(key).map_or(0, |e| e.revision)
    }

    pub fn get(&self, key: &QueryKey) -> Option<&QueryData> {
        self.entries.get(key)?.data.as_ref()
    }

    /// Cached data stays visible while a refetch is in flight.
    pub fn status(&self, key: &QueryKey) -> Remote<&QueryData> {
        let Some(entry) = self.entries.get(key) else {
            return Remote::Idle;
        };
        match (&entry.data, &entry.error) {
            (Some(data), _) => Remote::Ready(data),
            (None, _) if entry.in_flight => Remote::Loading,
            (None, Some(error)) => Remote::Failed(error.clone()),
            (None, None) => Remote::Idle,
        }
    }

    pub fn error(&self, key: &QueryKey) -> Option<&ApiError> {
        self.entries.get(key)?.error.as_ref()
    }

    pub fn fetched_at(&self, key: &QueryKey) -> Option<Instant> {
        self.entries.get(key)?.fetched_at
    }

    pub fn is_in_flight(&self, key: &QueryKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.in_flight)
    }

    /// Failed queries wait for an explicit retry instead of refetching on access.
    pub fn needs_fetch(&self, key: &QueryKey, now: Instant) -> bool {
        let Some(entry) = self.entries.get(key) else {
            return true;
        };
        if entry.in_flight || entry.error.is_some() {
            return false;
        }
        match entry.fetched_at {
            None => true,
            Some(at) => entry.invalidated || now.saturating_duration_since(at) >= key.stale_after(),
        }
    }

    /// Claim a fetch for `key`. `None` while another fetch for it is in flight.
    pub fn begin(&mut self, key: &QueryKey) -> Option<Ticket> {
        if self.is_in_flight(key) {
            return None;
        }
        Some(self.force(key))
    }

    /// Issue a fetch even if one is in flight; the older one's result will be ignored.
    pub fn force(&mut self, key: &QueryKey) -> Ticket {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.generation += 1;
        entry.in_flight = true;
        Ticket {
            key: key.clone(),
            generation: entry.generation,
        }
    }

    /// `begin` only when the key is missing or stale.
    pub fn ensure(&mut self, key: &QueryKey, now: Instant) -> Option<Ticket> {
        if self.needs_fetch(key, now) {
            self.begin(key)
        } else {
            None
        }
    }

    /// Apply a fetch result. Returns false if a newer ticket superseded this one.
    pub fn complete(
        &mut self,
        ticket: &Ticket,
        result: Result<QueryData, ApiError>,
        now: Instant,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&ticket.key) else {
            return false;
        };
        if entry.generation != ticket.generation {
            tracing::debug!(
                key = %ticket.key.describe(),
                stale = ticket.generation,
                current = entry.generation,
                "ignoring superseded response"
            );
            return false;
        }
        entry.in_flight = false;
        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.error = None;
                entry.fetched_at = Some(now);
                entry.invalidated = false;
                entry.revision += 1;
            }
            Err(error) => entry.error = Some(error),
        }
        true
    }

    pub fn invalidate(&mut self, key: &QueryKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.invalidated = true;
        }
    }

    pub fn invalidate_where(&mut self, mut predicate: impl FnMut(&QueryKey) -> bool) {
        for (key, entry) in &mut self.entries {
            if predicate(key) {
                entry.invalidated = true;
            }
        }
    }

    /// Clear a failure and refetch.
    pub fn retry(&mut self, key: &QueryKey) -> Option<Ticket> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.error = None;
        }
        self.begin(key)
    }

    /// Keys whose last fetch failed.
    pub fn failed_keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.error.is_some() && !e.in_flight)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): initial * 2^attempt, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy's
/// attempts run out.
pub async fn fetch_with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(error = %e, attempt, ?delay, "retrying request");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Header;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn headers(builds: &[&str]) -> QueryData {
        QueryData::Headers(HeadersResponse {
            headers: builds
                .iter()
                .map(|b| Header {
                    build: (*b).to_string(),
                    started: None,
                    extra: None,
                })
                .collect(),
        })
    }

    fn network() -> ApiError {
        ApiError::Network("connection reset".into())
    }

    #[test]
    fn stale_windows_by_kind() {
        assert_eq!(QueryKey::DashboardGroups.stale_after(), Duration::from_secs(300));
        assert_eq!(QueryKey::DashboardTabs("d".into()).stale_after(), Duration::from_secs(300));
        assert_eq!(QueryKey::rows("d", "t").stale_after(), Duration::from_secs(60));
        assert_eq!(QueryKey::TabSummaries("d".into()).stale_after(), Duration::from_secs(60));
    }

    #[test]
    fn begin_dedups_in_flight_requests() {
        let mut cache = QueryCache::new();
        let key = QueryKey::headers("d", "t");
        let ticket = cache.begin(&key).unwrap();
        assert!(cache.begin(&key).is_none());
        assert_eq!(cache.status(&key), Remote::Loading);
        assert!(cache.complete(&ticket, Ok(headers(&["1"])), Instant::now()));
        assert!(matches!(cache.status(&key), Remote::Ready(_)));
    }

    #[test]
    fn superseded_response_is_ignored() {
        let mut cache = QueryCache::new();
        let key = QueryKey::headers("d", "t");
        let old = cache.begin(&key).unwrap();
        let new = cache.force(&key);
        let now = Instant::now();

        assert!(cache.complete(&new, Ok(headers(&["new"])), now));
        assert!(!cache.complete(&old, Ok(headers(&["old"])), now));
        let data = cache.get(&key).and_then(QueryData::as_headers).unwrap();
        assert_eq!(data.headers[0].build, "new");
    }

    #[test]
    fn stale_and_invalidated_entries_refetch() {
        let mut cache = QueryCache::new();
        let key = QueryKey::rows("d", "t");
        let start = Instant::now();
        assert!(cache.needs_fetch(&key, start));

        let ticket = cache.ensure(&key, start).unwrap();
        assert!(cache.ensure(&key, start).is_none());
        cache.complete(&ticket, Ok(headers(&[])), start);
        assert!(!cache.needs_fetch(&key, start + Duration::from_secs(59)));
        assert!(cache.needs_fetch(&key, start + Duration::from_secs(60)));

        cache.invalidate(&key);
        assert!(cache.needs_fetch(&key, start));
    }

    #[test]
    fn failures_wait_for_retry() {
        let mut cache = QueryCache::new();
        let key = QueryKey::DashboardGroups;
        let ticket = cache.begin(&key).unwrap();
        cache.complete(&ticket, Err(network()), Instant::now());

        assert_eq!(cache.status(&key), Remote::Failed(network()));
        assert!(!cache.needs_fetch(&key, Instant::now() + Duration::from_secs(3600)));
        assert_eq!(cache.failed_keys(), vec![key.clone()]);

        let retry = cache.retry(&key).unwrap();
        assert_eq!(cache.status(&key), Remote::Loading);
        assert!(cache.complete(&retry, Ok(headers(&[])), Instant::now()));
        assert!(cache.failed_keys().is_empty());
    }

    #[test]
    fn failed_refetch_keeps_previous_data() {
        let mut cache = QueryCache::new();
        let key = QueryKey::headers("d", "t");
        let first = cache.begin(&key).unwrap();
        cache.complete(&first, Ok(headers(&["1"])), Instant::now());
        let second = cache.force(&key);
        cache.complete(&second, Err(network()), Instant::now());
        assert!(matches!(cache.status(&key), Remote::Ready(_)));
        assert!(cache.error(&key).is_some());
    }

    #[test]
    fn revision_is_per_key_and_tracks_data() {
        let mut cache = QueryCache::new();
        let key = QueryKey::DashboardGroups;
        let other = QueryKey::rows("d", "t");
        let stale = cache.begin(&key).unwrap();
        let fresh = cache.force(&key);
        cache.complete(&stale, Ok(headers(&[])), Instant::now());
        assert_eq!(cache.revision_of(&key), 0);
        cache.complete(&fresh, Ok(headers(&[])), Instant::now());
        assert_eq!(cache.revision_of(&key), 1);
        assert_eq!(cache.revision_of(&other), 0);

        let failed = cache.force(&key);
        cache.complete(&failed, Err(network()), Instant::now());
        assert_eq!(cache.revision_of(&key), 1);
    }

    #[test]
    fn remote_filter_map() {
        let data = headers(&["7"]);
        let remote = Remote::Ready(&data).filter_map(QueryData::as_headers);
        assert_eq!(remote.ready().map(|h| h.headers.len()), Some(1));
        let wrong = Remote::Ready(&data).filter_map(QueryData::as_rows);
        assert_eq!(wrong, Remote::Idle);
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
        assert_eq!(policy.delay_for(64), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_up_to_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ApiError> = fetch_with_retry(RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(network()) }
        })
        .await;
        assert_eq!(result, Err(network()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_error() {
        let calls = AtomicU32::new(0);
        let result = fetch_with_retry(RetryPolicy::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ApiError::Timeout(Duration::from_secs(30)))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_client_errors() {
        let calls = AtomicU32::new(0);
        let not_found = ApiError::HttpStatus {
            status: 404,
            url: "x".into(),
        };
        let result: Result<(), ApiError> = fetch_with_retry(RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            let err = not_found.clone();
            async move { Err(err) }
        })
        .await;
        assert_eq!(result, Err(not_found));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
