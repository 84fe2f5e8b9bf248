//! Row filtering for a tab, and the per-tab filter store.

use crate::model::{Cell, Row};
use crate::result::Category;
use crate::storage::{self, Persist, Storage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status filtering only looks at the most recent builds.
pub const STATUS_FILTER_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pass,
    Fail,
    Skip,
    Flaky,
    Empty,
}

impl StatusFilter {
    pub const ALL: [StatusFilter; 6] = [
        StatusFilter::All,
        StatusFilter::Pass,
        StatusFilter::Fail,
        StatusFilter::Skip,
        StatusFilter::Flaky,
        StatusFilter::Empty,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Pass => "Pass",
            StatusFilter::Fail => "Fail",
            StatusFilter::Skip => "Skip",
            StatusFilter::Flaky => "Flaky",
            StatusFilter::Empty => "Empty",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.label().eq_ignore_ascii_case(s))
    }

    fn matches(self, cell: &Cell) -> bool {
        let category = cell.category();
        match self {
            StatusFilter::All => true,
            StatusFilter::Pass => category == Category::Pass,
            StatusFilter::Fail => category == Category::Fail,
            StatusFilter::Skip => category == Category::Skip,
            StatusFilter::Flaky => category == Category::Flaky,
            StatusFilter::Empty => category == Category::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterState {
    pub status_filter: StatusFilter,
    pub text_filter: String,
    pub show_only_failures: bool,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        *self != Self::default()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.predicate()(row)
    }

    /// Lowercases the text filter once for a whole pass over the rows.
    fn predicate(&self) -> impl Fn(&Row) -> bool + '_ {
        let needle = self.text_filter.to_lowercase();
        move |row: &Row| {
            matches_text(row, &needle)
                && matches_status(row, self.status_filter)
                && (!self.show_only_failures || row_has_failures(row))
        }
    }
}

fn matches_text(row: &Row, needle_lower: &str) -> bool {
    needle_lower.is_empty() || row.name.to_lowercase().contains(needle_lower)
}

fn matches_status(row: &Row, status: StatusFilter) -> bool {
    status == StatusFilter::All
        || row
            .cells
            .iter()
            .take(STATUS_FILTER_WINDOW)
            .any(|cell| status.matches(cell))
}

/// Any failure anywhere in the row, unlike the status filter.
pub fn row_has_failures(row: &Row) -> bool {
    row.cells.iter().any(|cell| cell.category() == Category::Fail)
}

/// Stable filter: keeps the input order.
pub fn filter_rows<'a, I>(rows: I, filter: &FilterState) -> Vec<&'a Row>
where
    I: IntoIterator<Item = &'a Row>,
{
    let predicate = filter.predicate();
    rows.into_iter().filter(|row| predicate(row)).collect()
}

/// Indices of the rows that pass the filter, in order.
pub fn filter_indices(rows: &[Row], filter: &FilterState) -> Vec<usize> {
    let predicate = filter.predicate();
    rows.iter()
        .enumerate()
        .filter(|(_, row)| predicate(row))
        .map(|(i, _)| i)
        .collect()
}

/// Filter result cached on the row set revision and the filter state.
#[derive(Debug, Clone, Default)]
pub struct FilteredRows {
    key: Option<(u64, FilterState)>,
    indices: Vec<usize>,
    runs: u64,
}

impl FilteredRows {
    /// Refilter only if `revision` or `filter` changed since the last call.
    pub fn refresh(&mut self, rows: &[Row], revision: u64, filter: &FilterState) -> &[usize] {
        let stale = self
            .key
            .as_ref()
            .is_none_or(|(rev, f)| *rev != revision || f != filter);
        if stale {
            self.indices = filter_indices(rows, filter);
            self.key = Some((revision, filter.clone()));
            self.runs += 1;
        }
        &self.indices
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }
}

pub fn filter_key(dashboard: &str, tab: &str) -> String {
    format!("{dashboard}/{tab}")
}

/// Filters for every tab the user has touched, persisted as one JSON map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterStore {
    filters: BTreeMap<String, FilterState>,
}

impl Persist for FilterStore {
    const KEY: &'static str = "filters";
}

impl FilterStore {
    pub fn load(storage: &dyn Storage) -> Self {
        storage::load_json(storage)
    }

    pub fn save(&self, storage: &dyn Storage) {
        storage::save_json(storage, self);
    }

    /// Defaults when the tab has no stored filter.
    pub fn get(&self, dashboard: &str, tab: &str) -> FilterState {
        self.filters
            .get(&filter_key(dashboard, tab))
            .cloned()
            .unwrap_or_default()
    }

    fn entry(&mut self, dashboard: &str, tab: &str) -> &mut FilterState {
        self.filters.entry(filter_key(dashboard, tab)).or_default()
    }

    pub fn set_status(&mut self, dashboard: &str, tab: &str, status: StatusFilter) {
        self.entry(dashboard, tab).status_filter = status;
    }

    pub fn set_text(&mut self, dashboard: &str, tab: &str, text: impl Into<String>) {
        self.entry(dashboard, tab).text_filter = text.into();
    }

    pub fn set_show_only_failures(&mut self, dashboard: &str, tab: &str, enabled: bool) {
        self.entry(dashboard, tab).show_only_failures = enabled;
    }

    pub fn clear(&mut self, dashboard: &str, tab: &str) {
        self.filters.remove(&filter_key(dashboard, tab));
    }

    pub fn clear_all(&mut self) {
        self.filters.clear();
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{self, ResultCode};
    use crate::storage::MemoryStorage;

    fn row(name: &str, codes: &[ResultCode]) -> Row {
        Row {
            name: name.to_string(),
            cells: codes
                .iter()
                .map(|&c| Cell {
                    result: Some(c),
                    message: None,
                    icon: None,
                })
                .collect(),
        }
    }

    fn names(rows: &[&Row]) -> Vec<String> {
        rows.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn default_filter_keeps_everything_in_order() {
        let rows = vec![row("b", &[1]), row("a", &[2]), row("c", &[])];
        let kept = filter_rows(&rows, &FilterState::default());
        assert_eq!(names(&kept), vec!["b", "a", "c"]);
    }

    #[test]
    fn text_filter_is_case_insensitive_substring() {
        let rows = vec![row("TestFoo", &[1]), row("testbar", &[1]), row("other", &[1])];
        let filter = FilterState {
            text_filter: "TEST".to_string(),
            ..FilterState::default()
        };
        assert_eq!(names(&filter_rows(&rows, &filter)), vec!["TestFoo", "testbar"]);
    }

    #[test]
    fn status_filter_only_inspects_recent_cells() {
        let mut codes = vec![result::PASS; STATUS_FILTER_WINDOW];
        codes.push(result::FAIL);
        let rows = vec![row("old-failure", &codes)];
        let status = FilterState {
            status_filter: StatusFilter::Fail,
            ..FilterState::default()
        };
        assert!(filter_rows(&rows, &status).is_empty());

        // Failures-only looks at the whole row.
        let failures = FilterState {
            show_only_failures: true,
            ..FilterState::default()
        };
        assert_eq!(filter_rows(&rows, &failures).len(), 1);
    }

    #[test]
    fn fail_filter_honors_failure_icon() {
        let mut r = row("iconic", &[result::PASS]);
        r.cells[0].icon = Some("F".to_string());
        let rows = vec![r];
        let filter = FilterState {
            status_filter: StatusFilter::Fail,
            ..FilterState::default()
        };
        assert_eq!(filter_rows(&rows, &filter).len(), 1);
        let pass = FilterState {
            status_filter: StatusFilter::Pass,
            ..FilterState::default()
        };
        assert!(filter_rows(&rows, &pass).is_empty());
    }

    #[test]
    fn empty_filter_matches_no_result_cells() {
        let rows = vec![row("blank", &[0, 0]), row("ran", &[1])];
        let filter = FilterState {
            status_filter: StatusFilter::Empty,
            ..FilterState::default()
        };
        assert_eq!(names(&filter_rows(&rows, &filter)), vec!["blank"]);
    }

    #[test]
    fn predicates_are_conjoined() {
        let rows = vec![
            row("net-a", &[result::FLAKY, result::FAIL]),
            row("net-b", &[result::FLAKY]),
            row("disk", &[result::FLAKY, result::FAIL]),
        ];
        let filter = FilterState {
            status_filter: StatusFilter::Flaky,
            text_filter: "net".to_string(),
            show_only_failures: true,
        };
        assert_eq!(names(&filter_rows(&rows, &filter)), vec!["net-a"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let rows = vec![
            row("a", &[1, 2]),
            row("b", &[3]),
            row("ab", &[5, 1]),
            row("c", &[2]),
        ];
        let filter = FilterState {
            status_filter: StatusFilter::Pass,
            text_filter: "a".to_string(),
            show_only_failures: false,
        };
        let once = filter_rows(&rows, &filter);
        let twice = filter_rows(once.iter().copied(), &filter);
        assert_eq!(once, twice);
        assert_eq!(filter_indices(&rows, &filter), vec![0, 2]);
    }

    #[test]
    fn filtered_rows_reuses_result() {
        let rows = vec![row("a", &[1]), row("b", &[2])];
        let mut memo = FilteredRows::default();
        let filter = FilterState::default();
        assert_eq!(memo.refresh(&rows, 1, &filter), &[0, 1]);
        memo.refresh(&rows, 1, &filter);
        assert_eq!(memo.runs(), 1);

        let failing = FilterState {
            show_only_failures: true,
            ..FilterState::default()
        };
        assert_eq!(memo.refresh(&rows, 1, &failing), &[1]);
        memo.refresh(&rows, 2, &failing);
        assert_eq!(memo.runs(), 3);
    }

    #[test]
    fn store_defaults_and_clears() {
        let mut store = FilterStore::default();
        assert_eq!(store.get("d", "t"), FilterState::default());

        store.set_status("d", "t", StatusFilter::Fail);
        store.set_text("d", "t", "net");
        store.set_show_only_failures("d", "u", true);
        assert_eq!(store.get("d", "t").status_filter, StatusFilter::Fail);
        assert_eq!(store.get("d", "t").text_filter, "net");
        assert!(store.get("d", "u").show_only_failures);

        store.clear("d", "t");
        assert_eq!(store.get("d", "t"), FilterState::default());
        assert!(store.get("d", "u").is_active());
        store.clear_all();
        assert!(store.is_empty());
    }

    #[test]
    fn store_persists_camel_case_map() {
        let storage = MemoryStorage::default();
        let mut store = FilterStore::default();
        store.set_text("dash", "tab", "x");
        store.save(&storage);

        let raw = storage.read("filters").unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["dash/tab"]["textFilter"], "x");
        assert_eq!(value["dash/tab"]["statusFilter"], "all");
        assert_eq!(value["dash/tab"]["showOnlyFailures"], false);

        assert_eq!(FilterStore::load(&storage), store);
    }

    #[test]
    fn status_filter_cycles() {
        let mut f = StatusFilter::All;
        for _ in 0..StatusFilter::ALL.len() {
            f = f.next();
        }
        assert_eq!(f, StatusFilter::All);
        assert_eq!(StatusFilter::parse("FLAKY"), Some(StatusFilter::Flaky));
    }
}
