//! Result codes, their semantic categories, and the colors and labels derived from them.
//!
//! `classify` is the only place that interprets a code together with its icon. Grid
//! coloring, labels, and the row filters all go through it.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub type ResultCode = u32;

pub const NO_RESULT: ResultCode = 0;
pub const PASS: ResultCode = 1;
pub const FAIL: ResultCode = 2;
pub const SKIPPED: ResultCode = 3;
pub const UNKNOWN: ResultCode = 4;
pub const FLAKY: ResultCode = 5;
pub const TRUNCATED: ResultCode = 6;
pub const RUNNING: ResultCode = 7;
pub const PASS_WITH_ERRORS: ResultCode = 12;
pub const PASS_WITH_SKIPS: ResultCode = 13;
pub const FAIL_EXPECTED: ResultCode = 14;
pub const BUILD_FAIL: ResultCode = 15;
pub const CATEGORIZED_ABORT: ResultCode = 16;
pub const CATEGORIZED_FAIL: ResultCode = 17;
pub const CATEGORIZED_INTERMITTENT_FAIL: ResultCode = 18;
pub const CANCEL: ResultCode = 19;
pub const TIMEOUT: ResultCode = 20;

/// Icon that marks a cell as failed whatever its numeric code says.
pub const FAILURE_ICON: &str = "F";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Pass,
    Fail,
    Flaky,
    Skip,
    Running,
    Truncated,
    Aborted,
    Empty,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Pass => "pass",
            Category::Fail => "fail",
            Category::Flaky => "flaky",
            Category::Skip => "skip",
            Category::Running => "running",
            Category::Truncated => "truncated",
            Category::Aborted => "aborted",
            Category::Empty => "empty",
        }
    }
}

/// Semantic color, resolved to a concrete terminal color by the active palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorToken {
    Green,
    Red,
    Orange,
    Yellow,
    Blue,
    Purple,
    Slate,
    Gray,
}

pub fn classify(result: ResultCode, icon: Option<&str>) -> Category {
    if icon == Some(FAILURE_ICON) {
        return Category::Fail;
    }
    match result {
        PASS | PASS_WITH_ERRORS | PASS_WITH_SKIPS => Category::Pass,
        FAIL | BUILD_FAIL | CATEGORIZED_FAIL | FAIL_EXPECTED => Category::Fail,
        FLAKY | CATEGORIZED_INTERMITTENT_FAIL => Category::Flaky,
        SKIPPED => Category::Skip,
        RUNNING => Category::Running,
        TRUNCATED => Category::Truncated,
        CANCEL | TIMEOUT | CATEGORIZED_ABORT => Category::Aborted,
        _ => Category::Empty,
    }
}

pub fn color_for(category: Category) -> ColorToken {
    match category {
        Category::Pass => ColorToken::Green,
        Category::Fail => ColorToken::Red,
        Category::Flaky => ColorToken::Orange,
        Category::Skip => ColorToken::Yellow,
        Category::Running => ColorToken::Blue,
        Category::Truncated => ColorToken::Slate,
        Category::Aborted => ColorToken::Purple,
        Category::Empty => ColorToken::Gray,
    }
}

/// Running cells pulse in the grid.
pub fn is_animated(category: Category) -> bool {
    category == Category::Running
}

pub fn label_for(result: ResultCode, icon: Option<&str>) -> Cow<'static, str> {
    if icon == Some(FAILURE_ICON) {
        return Cow::Borrowed("Fail");
    }
    let label = match result {
        PASS => "Pass",
        PASS_WITH_ERRORS => "Pass (with errors)",
        PASS_WITH_SKIPS => "Pass (with skips)",
        FAIL => "Fail",
        BUILD_FAIL => "Build Fail",
        CATEGORIZED_FAIL => "Categorized Fail",
        FAIL_EXPECTED => "Fail (expected)",
        FLAKY => "Flaky",
        CATEGORIZED_INTERMITTENT_FAIL => "Intermittent Fail",
        SKIPPED => "Skipped",
        RUNNING => "Running",
        TRUNCATED => "Truncated",
        CANCEL => "Cancelled",
        TIMEOUT => "Timeout",
        CATEGORIZED_ABORT => "Aborted",
        NO_RESULT => "No result",
        UNKNOWN => "Unknown",
        other => return Cow::Owned(format!("Result: {other}")),
    };
    Cow::Borrowed(label)
}

/// Machine-readable status name, as used in JSON output.
pub fn status_name(result: ResultCode) -> &'static str {
    match result {
        NO_RESULT => "empty",
        PASS => "pass",
        FAIL => "fail",
        SKIPPED => "skip",
        UNKNOWN => "unknown",
        FLAKY => "flaky",
        TRUNCATED => "truncated",
        RUNNING => "running",
        PASS_WITH_ERRORS => "pass_with_errors",
        PASS_WITH_SKIPS => "pass_with_skips",
        FAIL_EXPECTED => "fail_expected",
        BUILD_FAIL => "build_fail",
        CATEGORIZED_ABORT => "categorized_abort",
        CATEGORIZED_FAIL => "categorized_fail",
        CATEGORIZED_INTERMITTENT_FAIL => "categorized_intermittent_fail",
        CANCEL => "cancel",
        TIMEOUT => "timeout",
        _ => "unknown",
    }
}
