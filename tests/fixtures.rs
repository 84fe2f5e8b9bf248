#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tgw::api::{ApiError, TestGridApi};
use tgw::model::{
    Cell, DashboardGroup, DashboardGroupList, DashboardLink, DashboardSummaries, DashboardSummary,
    DashboardSummaryResponse, DashboardsInGroup, Header, HeadersResponse, OverallStatus, Row,
    RowsResponse, TabLink, TabList, TabSummaries, TabSummary, TabSummaryResponse,
};
use tgw::result::{FAIL, FLAKY, PASS, RUNNING};

pub fn header(build: &str) -> Header {
    Header {
        build: build.to_string(),
        started: Some("2024-05-01T12:00:00Z".to_string()),
        extra: None,
    }
}

pub fn cell(result: u32, message: Option<&str>) -> Cell {
    Cell {
        result: Some(result),
        message: message.map(str::to_string),
        icon: None,
    }
}

pub fn row(name: &str, cells: Vec<Cell>) -> Row {
    Row {
        name: name.to_string(),
        cells,
    }
}

pub fn tab_summary(dashboard: &str, tab: &str, status: OverallStatus) -> TabSummary {
    TabSummary {
        dashboard_name: dashboard.to_string(),
        tab_name: tab.to_string(),
        overall_status: status,
        detailed_status_message: Some(format!("{} tests", tab.len())),
        last_run_timestamp: None,
        last_update_timestamp: None,
        latest_passing_build: None,
    }
}

/// In-memory TestGrid with two groups, one dashboard with two tabs and a small grid.
pub struct FakeApi {
    pub groups: Vec<String>,
    pub dashboards: HashMap<String, Vec<String>>,
    pub tabs: Vec<String>,
    pub headers: Vec<Header>,
    pub rows: Vec<Row>,
    pub tab_statuses: Mutex<Vec<TabSummary>>,
    /// Endpoints that answer with HTTP 500.
    pub failing: Mutex<Vec<&'static str>>,
    pub calls: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        let dashboards = HashMap::from([
            (
                "sig-node".to_string(),
                vec!["sig-node-kubelet".to_string(), "sig-node-cri-o".to_string()],
            ),
            ("sig-release".to_string(), vec!["sig-release-master-blocking".to_string()]),
        ]);
        Self {
            groups: vec!["sig-node".to_string(), "sig-release".to_string()],
            dashboards,
            tabs: vec!["e2e".to_string(), "unit".to_string()],
            headers: vec![header("1001"), header("1000"), header("999")],
            rows: vec![
                row("TestKubeletStart", vec![cell(PASS, None), cell(PASS, None), cell(PASS, None)]),
                row(
                    "TestPodEviction",
                    vec![cell(FAIL, Some("timed out waiting for eviction")), cell(PASS, None), cell(FLAKY, None)],
                ),
                row("TestNodeReady", vec![cell(RUNNING, None), cell(PASS, None)]),
            ],
            tab_statuses: Mutex::new(vec![
                tab_summary("sig-node-kubelet", "e2e", OverallStatus::Passing),
                tab_summary("sig-node-kubelet", "unit", OverallStatus::Flaky),
            ]),
            failing: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeApi {
    pub fn set_tab_status(&self, tab: &str, status: OverallStatus) {
        let mut statuses = self.tab_statuses.lock().unwrap();
        if let Some(summary) = statuses.iter_mut().find(|s| s.tab_name == tab) {
            summary.overall_status = status;
        }
    }

    pub fn fail(&self, endpoint: &'static str) {
        self.failing.lock().unwrap().push(endpoint);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, endpoint: &'static str) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&endpoint) {
            return Err(ApiError::HttpStatus {
                status: 500,
                url: format!("fake://{endpoint}"),
            });
        }
        Ok(())
    }

    fn not_found(what: &str) -> ApiError {
        ApiError::HttpStatus {
            status: 404,
            url: format!("fake://{what}"),
        }
    }
}

#[async_trait]
impl TestGridApi for FakeApi {
    async fn dashboard_groups(&self) -> Result<DashboardGroupList, ApiError> {
        self.enter("groups")?;
        Ok(DashboardGroupList {
            dashboard_groups: self
                .groups
                .iter()
                .map(|name| DashboardGroup {
                    name: name.clone(),
                    link: format!("/dashboard-groups/{name}"),
                })
                .collect(),
        })
    }

    async fn dashboards_in_group(&self, group: &str) -> Result<DashboardsInGroup, ApiError> {
        self.enter("dashboards")?;
        let names = self.dashboards.get(group).ok_or_else(|| Self::not_found(group))?;
        Ok(DashboardsInGroup {
            dashboards: names
                .iter()
                .map(|name| DashboardLink {
                    name: name.clone(),
                    link: format!("/dashboards/{name}"),
                })
                .collect(),
        })
    }

    async fn group_summaries(&self, group: &str) -> Result<DashboardSummaries, ApiError> {
        self.enter("group_summaries")?;
        let names = self.dashboards.get(group).ok_or_else(|| Self::not_found(group))?;
        Ok(DashboardSummaries {
            dashboard_summaries: names
                .iter()
                .map(|name| DashboardSummary {
                    name: name.clone(),
                    overall_status: OverallStatus::Flaky,
                    tab_status_count: None,
                })
                .collect(),
        })
    }

    async fn dashboard_summary(&self, dashboard: &str) -> Result<DashboardSummaryResponse, ApiError> {
        self.enter("dashboard_summary")?;
        Ok(DashboardSummaryResponse {
            dashboard_summary: DashboardSummary {
                name: dashboard.to_string(),
                overall_status: OverallStatus::Flaky,
                tab_status_count: None,
            },
        })
    }

    async fn dashboard_tabs(&self, dashboard: &str) -> Result<TabList, ApiError> {
        self.enter("tabs")?;
        Ok(TabList {
            dashboard_tabs: self
                .tabs
                .iter()
                .map(|name| TabLink {
                    name: name.clone(),
                    link: format!("/dashboards/{dashboard}/tabs/{name}"),
                })
                .collect(),
        })
    }

    async fn tab_summaries(&self, dashboard: &str) -> Result<TabSummaries, ApiError> {
        self.enter("tab_summaries")?;
        let statuses = self.tab_statuses.lock().unwrap();
        Ok(TabSummaries {
            tab_summaries: statuses
                .iter()
                .filter(|s| s.dashboard_name == dashboard)
                .cloned()
                .collect(),
        })
    }

    async fn tab_summary(&self, dashboard: &str, tab: &str) -> Result<TabSummaryResponse, ApiError> {
        self.enter("tab_summary")?;
        let statuses = self.tab_statuses.lock().unwrap();
        let summary = statuses
            .iter()
            .find(|s| s.dashboard_name == dashboard && s.tab_name == tab)
            .cloned()
            .ok_or_else(|| Self::not_found(tab))?;
        Ok(TabSummaryResponse { tab_summary: summary })
    }

    async fn tab_headers(&self, _dashboard: &str, _tab: &str) -> Result<HeadersResponse, ApiError> {
        self.enter("headers")?;
        Ok(HeadersResponse {
            headers: self.headers.clone(),
        })
    }

    async fn tab_rows(&self, _dashboard: &str, _tab: &str) -> Result<RowsResponse, ApiError> {
        self.enter("rows")?;
        Ok(RowsResponse {
            rows: self.rows.clone(),
        })
    }
}
