//! Typed schemas for the TestGrid REST API.
//!
//! Every response is deserialized into these structs before it reaches the rest of
//! the application, so a shape mismatch surfaces as a schema error at the boundary
//! instead of a blank grid later on.

use crate::result::{self, Category, ColorToken, ResultCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

// ── Grid data ──

/// One grid column: a single CI build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub build: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Vec<String>>,
}

impl Header {
    /// `None` when the build has no start time or the upstream value is not RFC 3339.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.started.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }
}

/// One test's outcome on one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Cell {
    pub fn result_code(&self) -> ResultCode {
        self.result.unwrap_or(result::NO_RESULT)
    }

    pub fn category(&self) -> Category {
        result::classify(self.result_code(), self.icon.as_deref())
    }

    pub fn color(&self) -> ColorToken {
        result::color_for(self.category())
    }

    pub fn label(&self) -> Cow<'static, str> {
        result::label_for(self.result_code(), self.icon.as_deref())
    }

    /// Only cells with a non-empty message open the detail view.
    pub fn is_interactive(&self) -> bool {
        self.message.as_deref().is_some_and(|m| !m.is_empty())
    }
}

/// One test across every build of a tab. `cells[i]` lines up with `headers[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub name: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadersResponse {
    pub headers: Vec<Header>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsResponse {
    pub rows: Vec<Row>,
}

// ── Dashboards and tabs ──

/// Closed set: unknown values fail deserialization rather than being coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Passing,
    Flaky,
    Failing,
    Stale,
}

impl OverallStatus {
    pub fn label(self) -> &'static str {
        match self {
            OverallStatus::Passing => "Passing",
            OverallStatus::Flaky => "Flaky",
            OverallStatus::Failing => "Failing",
            OverallStatus::Stale => "Stale",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OverallStatus::Passing => "PASSING",
            OverallStatus::Flaky => "FLAKY",
            OverallStatus::Failing => "FAILING",
            OverallStatus::Stale => "STALE",
        }
    }

    pub fn color(self) -> ColorToken {
        match self {
            OverallStatus::Passing => ColorToken::Green,
            OverallStatus::Flaky => ColorToken::Orange,
            OverallStatus::Failing => ColorToken::Red,
            OverallStatus::Stale => ColorToken::Gray,
        }
    }

    /// Lower is worse.
    fn severity(self) -> u8 {
        match self {
            OverallStatus::Failing => 0,
            OverallStatus::Flaky => 1,
            OverallStatus::Stale => 2,
            OverallStatus::Passing => 3,
        }
    }

    /// Case-insensitive parse used by the `--status` command-line filter.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PASSING" => Some(OverallStatus::Passing),
            "FLAKY" => Some(OverallStatus::Flaky),
            "FAILING" => Some(OverallStatus::Failing),
            "STALE" => Some(OverallStatus::Stale),
            _ => None,
        }
    }
}

/// Worst status of the set; an empty set counts as passing.
pub fn worst_status<I>(statuses: I) -> OverallStatus
where
    I: IntoIterator<Item = OverallStatus>,
{
    statuses
        .into_iter()
        .fold(OverallStatus::Passing, |worst, current| {
            if current.severity() < worst.severity() {
                current
            } else {
                worst
            }
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardGroup {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardGroupList {
    pub dashboard_groups: Vec<DashboardGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardLink {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardsInGroup {
    pub dashboards: Vec<DashboardLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub name: String,
    pub overall_status: OverallStatus,
    /// Upstream may use the empty string as a key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_status_count: Option<BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummaries {
    pub dashboard_summaries: Vec<DashboardSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummaryResponse {
    pub dashboard_summary: DashboardSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabLink {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabList {
    pub dashboard_tabs: Vec<TabLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSummary {
    pub dashboard_name: String,
    pub tab_name: String,
    pub overall_status: OverallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_passing_build: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSummaries {
    pub tab_summaries: Vec<TabSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSummaryResponse {
    pub tab_summary: TabSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_defaults_to_no_result() {
        let cell: Cell = serde_json::from_str("{}").unwrap();
        assert_eq!(cell.result_code(), result::NO_RESULT);
        assert_eq!(cell.category(), Category::Empty);
        assert!(!cell.is_interactive());
    }

    #[test]
    fn cell_with_empty_message_is_not_interactive() {
        let cell = Cell {
            result: Some(result::FAIL),
            message: Some(String::new()),
            icon: None,
        };
        assert!(!cell.is_interactive());
    }

    #[test]
    fn negative_result_code_is_rejected() {
        let parsed = serde_json::from_str::<Cell>(r#"{"result": -1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_overall_status_is_rejected() {
        let json = r#"{"name": "d", "overall_status": "BROKEN"}"#;
        assert!(serde_json::from_str::<DashboardSummary>(json).is_err());
    }

    #[test]
    fn tab_status_count_accepts_empty_key() {
        let json = r#"{"name": "d", "overall_status": "FLAKY", "tab_status_count": {"": 2, "PASSING": 3}}"#;
        let summary: DashboardSummary = serde_json::from_str(json).unwrap();
        let counts = summary.tab_status_count.unwrap();
        assert_eq!(counts.get(""), Some(&2));
    }

    #[test]
    fn header_started_parses_rfc3339() {
        let header = Header {
            build: "123".to_string(),
            started: Some("2024-06-01T10:00:00Z".to_string()),
            extra: None,
        };
        assert!(header.started_at().is_some());
        let bad = Header {
            started: Some("yesterday".to_string()),
            ..header
        };
        assert!(bad.started_at().is_none());
    }

    #[test]
    fn worst_status_ranks_failing_first() {
        use crate::model::OverallStatus::*;
        assert_eq!(worst_status([Passing, Stale, Flaky]), Flaky);
        assert_eq!(worst_status([Passing, Failing, Flaky]), Failing);
        assert_eq!(worst_status([Passing, Stale]), Stale);
        assert_eq!(worst_status(Vec::new()), Passing);
    }

    #[test]
    fn overall_status_parse_is_case_insensitive() {
        assert_eq!(OverallStatus::parse("failing"), Some(OverallStatus::Failing));
        assert_eq!(OverallStatus::parse("Passing"), Some(OverallStatus::Passing));
        assert_eq!(OverallStatus::parse("green"), None);
    }
}
