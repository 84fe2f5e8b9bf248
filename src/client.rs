//! `reqwest` implementation of the TestGrid API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tgw_core::api::{self, ApiError, TestGridApi, MAX_RESPONSE_SIZE, REQUEST_TIMEOUT};
use tgw_core::model::{
    DashboardGroupList, DashboardSummaries, DashboardSummaryResponse, DashboardsInGroup,
    HeadersResponse, RowsResponse, TabList, TabSummaries, TabSummaryResponse,
};

/// Percent-encode a path segment. The upstream decoder expects literal commas.
pub fn encode_path_param(value: &str) -> String {
    urlencoding::encode(value).replace("%2C", ",")
}

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("tgw/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join literal path parts and encoded parameters, e.g.
    /// `url(&["dashboards", &encode_path_param(d), "tabs"])`.
    pub fn url(&self, parts: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for part in parts {
            url.push('/');
            url.push_str(part);
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, url: String) -> Result<T, ApiError> {
        let started = Instant::now();
        let response = self.client.get(&url).send().await.map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "request failed");
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_SIZE as u64)
        {
            return Err(ApiError::SchemaValidation {
                endpoint: endpoint.to_string(),
                message: format!(
                    "response too large (limit {} MB)",
                    MAX_RESPONSE_SIZE / (1024 * 1024)
                ),
            });
        }
        let body = response.text().await.map_err(map_send_error)?;
        tracing::debug!(
            %url,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request complete"
        );
        api::parse_response(endpoint, &body)
    }
}

fn map_send_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(REQUEST_TIMEOUT)
    } else if e.is_builder() {
        ApiError::InvalidUrl(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}

#[async_trait]
impl TestGridApi for HttpApi {
    async fn dashboard_groups(&self) -> Result<DashboardGroupList, ApiError> {
        self.get("dashboard-groups", self.url(&["dashboard-groups"])).await
    }

    async fn dashboards_in_group(&self, group: &str) -> Result<DashboardsInGroup, ApiError> {
        let url = self.url(&["dashboard-groups", &encode_path_param(group)]);
        self.get("dashboards-in-group", url).await
    }

    async fn group_summaries(&self, group: &str) -> Result<DashboardSummaries, ApiError> {
        let url = self.url(&["dashboard-groups", &encode_path_param(group), "dashboard-summaries"]);
        self.get("dashboard-summaries", url).await
    }

    async fn dashboard_summary(&self, dashboard: &str) -> Result<DashboardSummaryResponse, ApiError> {
        let url = self.url(&["dashboards", &encode_path_param(dashboard), "summary"]);
        self.get("dashboard-summary", url).await
    }

    async fn dashboard_tabs(&self, dashboard: &str) -> Result<TabList, ApiError> {
        let url = self.url(&["dashboards", &encode_path_param(dashboard), "tabs"]);
        self.get("dashboard-tabs", url).await
    }

    async fn tab_summaries(&self, dashboard: &str) -> Result<TabSummaries, ApiError> {
        let url = self.url(&["dashboards", &encode_path_param(dashboard), "tab-summaries"]);
        self.get("tab-summaries", url).await
    }

    async fn tab_summary(&self, dashboard: &str, tab: &str) -> Result<TabSummaryResponse, ApiError> {
        let url = self.url(&[
            "dashboards",
            &encode_path_param(dashboard),
            "tab-summaries",
            &encode_path_param(tab),
        ]);
        self.get("tab-summary", url).await
    }

    async fn tab_headers(&self, dashboard: &str, tab: &str) -> Result<HeadersResponse, ApiError> {
        let url = self.url(&[
            "dashboards",
            &encode_path_param(dashboard),
            "tabs",
            &encode_path_param(tab),
            "headers",
        ]);
        self.get("headers", url).await
    }

    async fn tab_rows(&self, dashboard: &str, tab: &str) -> Result<RowsResponse, ApiError> {
        let url = self.url(&[
            "dashboards",
            &encode_path_param(dashboard),
            "tabs",
            &encode_path_param(tab),
            "rows",
        ]);
        self.get("rows", url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_spaces_and_slashes() {
        assert_eq!(encode_path_param("sig node/e2e"), "sig%20node%2Fe2e");
    }

    #[test]
    fn commas_pass_through() {
        assert_eq!(encode_path_param("a,b c"), "a,b%20c");
    }

    #[test]
    fn plain_names_unchanged() {
        assert_eq!(encode_path_param("sig-release-master-blocking"), "sig-release-master-blocking");
    }

    #[test]
    fn url_joins_parts_and_trims_base() {
        let api = HttpApi::new("https://example.test/api/v1/").unwrap();
        assert_eq!(api.base_url(), "https://example.test/api/v1");
        assert_eq!(
            api.url(&["dashboards", &encode_path_param("a,b"), "tabs"]),
            "https://example.test/api/v1/dashboards/a,b/tabs"
        );
    }

    #[test]
    fn rejects_non_http_base_url() {
        assert!(matches!(HttpApi::new("ftp://x"), Err(ApiError::InvalidUrl(_))));
        assert!(matches!(HttpApi::new("testgrid"), Err(ApiError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let api = HttpApi::new("http://127.0.0.1:9").unwrap();
        let err = api.dashboard_groups().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_) | ApiError::Timeout(_)), "{err:?}");
        assert!(err.is_retryable());
    }
}
