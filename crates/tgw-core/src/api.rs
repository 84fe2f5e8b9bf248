use crate::model::{
    DashboardGroupList, DashboardSummaries, DashboardSummaryResponse, DashboardsInGroup,
    HeadersResponse, RowsResponse, TabList, TabSummaries, TabSummaryResponse,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://testgrid-api.prow.k8s.io/api/v1";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Refuse response bodies larger than this before parsing.
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Unexpected response from {endpoint}: {message}")]
    SchemaValidation { endpoint: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Network(_) | Self::Timeout(_) => true,
            Self::SchemaValidation { .. } | Self::InvalidUrl(_) => false,
        }
    }
}

/// Parse a response body against its schema.
pub fn parse_response<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ApiError> {
    if body.len() > MAX_RESPONSE_SIZE {
        return Err(ApiError::SchemaValidation {
            endpoint: endpoint.to_string(),
            message: format!(
                "response too large ({} MB, limit {} MB)",
                body.len() / (1024 * 1024),
                MAX_RESPONSE_SIZE / (1024 * 1024)
            ),
        });
    }
    serde_json::from_str(body).map_err(|e| ApiError::SchemaValidation {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// Read-only TestGrid REST endpoints.
#[async_trait]
pub trait TestGridApi: Send + Sync {
    async fn dashboard_groups(&self) -> Result<DashboardGroupList, ApiError>;
    async fn dashboards_in_group(&self, group: &str) -> Result<DashboardsInGroup, ApiError>;
    async fn group_summaries(&self, group: &str) -> Result<DashboardSummaries, ApiError>;
    async fn dashboard_summary(&self, dashboard: &str) -> Result<DashboardSummaryResponse, ApiError>;
    async fn dashboard_tabs(&self, dashboard: &str) -> Result<TabList, ApiError>;
    async fn tab_summaries(&self, dashboard: &str) -> Result<TabSummaries, ApiError>;
    async fn tab_summary(&self, dashboard: &str, tab: &str) -> Result<TabSummaryResponse, ApiError>;
    async fn tab_headers(&self, dashboard: &str, tab: &str) -> Result<HeadersResponse, ApiError>;
    async fn tab_rows(&self, dashboard: &str, tab: &str) -> Result<RowsResponse, ApiError>;
}
