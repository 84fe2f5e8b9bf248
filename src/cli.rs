use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tgw_core::api::DEFAULT_BASE_URL;
use tgw_core::filter::StatusFilter;
use tgw_core::model::OverallStatus;
use tgw_core::subscription::{MAX_POLL_INTERVAL_SECS, MIN_POLL_INTERVAL_SECS};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_NUMBER"));

#[derive(Parser, Debug)]
#[command(name = "tgw", version = VERSION, about = "TestGrid Watcher TUI")]
pub struct Cli {
    /// TestGrid API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "TGW_BASE_URL")]
    pub base_url: String,

    /// Dashboard to open on startup
    #[arg(short, long)]
    pub dashboard: Option<String>,

    /// Tab to open on startup (with --dashboard)
    #[arg(short, long, requires = "dashboard")]
    pub tab: Option<String>,

    /// Subscription poll interval in seconds (saved to notification settings)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS))]
    pub interval: Option<u64>,

    /// Disable desktop notifications
    #[arg(long)]
    pub no_notify: bool,

    /// Enable verbose logging to $XDG_STATE_HOME/tgw/debug.log
    #[arg(long)]
    pub verbose: bool,

    /// Directory for saved subscriptions, filters and preferences
    #[arg(long, env = "TGW_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Print JSON instead of a table (subcommands only)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List dashboard groups
    Groups,
    /// List the dashboards of a group with their status
    Dashboards { group: String },
    /// List the tabs of a dashboard
    Tabs { dashboard: String },
    /// Show tab statuses of a dashboard
    Summaries {
        dashboard: String,
        /// Only tabs with this status (passing, flaky, failing, stale)
        #[arg(long, value_parser = parse_overall_status)]
        status: Option<OverallStatus>,
    },
    /// Print a tab's test results, newest builds first
    Grid(GridArgs),
    /// Fuzzy search groups, dashboards and tabs
    Search {
        query: String,
        /// Also walk every group's dashboards (one request per group)
        #[arg(long)]
        deep: bool,
    },
    /// Manage watched dashboards, tabs and tests
    #[command(subcommand)]
    Subscriptions(SubscriptionsCommand),
    /// Move all preferences (subscriptions, filters, theme, layout) between machines
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PrefsCommand {
    /// Print every saved preference as one JSON document
    Export,
    /// Replace preferences from an exported document, merging subscriptions
    Import { file: PathBuf },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GridArgs {
    pub dashboard: String,
    pub tab: String,

    /// Keep rows with this result among the recent builds (all, pass, fail, skip, flaky, empty)
    #[arg(long, value_parser = parse_status_filter, default_value = "all")]
    pub status: StatusFilter,

    /// Keep rows whose test name contains this text
    #[arg(long)]
    pub text: Option<String>,

    /// Keep rows with at least one failure
    #[arg(long)]
    pub failures_only: bool,

    /// Number of builds to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionsCommand {
    /// List subscriptions
    List,
    /// Print the subscriptions as importable JSON
    Export,
    /// Merge subscriptions from an exported file
    Import { file: PathBuf },
    /// Watch a dashboard, a tab, or a single test
    Add(TargetArgs),
    /// Stop watching a dashboard, tab or test
    Remove(TargetArgs),
    /// Remove every subscription
    Clear,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TargetArgs {
    pub dashboard: String,
    pub tab: Option<String>,
    /// Test name (requires a tab)
    #[arg(long, requires = "tab")]
    pub test: Option<String>,
}

fn parse_overall_status(s: &str) -> Result<OverallStatus, String> {
    OverallStatus::parse(s).ok_or_else(|| {
        format!("Invalid status '{s}'. Expected one of: passing, flaky, failing, stale.")
    })
}

fn parse_status_filter(s: &str) -> Result<StatusFilter, String> {
    StatusFilter::parse(s).ok_or_else(|| {
        format!("Invalid status filter '{s}'. Expected one of: all, pass, fail, skip, flaky, empty.")
    })
}

/// `$XDG_STATE_HOME/tgw`, falling back to `~/.local/state/tgw`, then `/tmp/tgw`.
pub fn default_state_dir() -> PathBuf {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME") {
        PathBuf::from(state).join("tgw")
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local").join("state").join("tgw")
    } else {
        PathBuf::from("/tmp/tgw")
    }
}

impl Cli {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("tgw").chain(args.iter().copied()))
    }

    #[test]
    fn prefs_import_takes_a_file() {
        let cli = parse(&["prefs", "import", "backup.json"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Prefs(PrefsCommand::Import {
                file: PathBuf::from("backup.json")
            }))
        );
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.base_url, DEFAULT_BASE_URL);
        assert_eq!(cli.interval, None);
        assert!(cli.command.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn interval_range_is_enforced() {
        assert!(parse(&["--interval", "29"]).is_err());
        assert!(parse(&["--interval", "3601"]).is_err());
        assert_eq!(parse(&["--interval", "30"]).unwrap().interval, Some(30));
    }

    #[test]
    fn tab_requires_dashboard() {
        assert!(parse(&["--tab", "e2e"]).is_err());
        let cli = parse(&["-d", "sig-node", "-t", "e2e"]).unwrap();
        assert_eq!(cli.tab.as_deref(), Some("e2e"));
    }

    #[test]
    fn grid_subcommand_parses_filters() {
        let cli = parse(&["grid", "sig-node", "e2e", "--status", "FAIL", "--failures-only", "--json"]).unwrap();
        let Some(Command::Grid(args)) = cli.command else {
            panic!("expected grid");
        };
        assert_eq!(args.status, StatusFilter::Fail);
        assert!(args.failures_only);
        assert_eq!(args.limit, 10);
        assert!(cli.json);
    }

    #[test]
    fn summaries_rejects_unknown_status() {
        assert!(parse(&["summaries", "d", "--status", "green"]).is_err());
        let cli = parse(&["summaries", "d", "--status", "failing"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Summaries { status: Some(OverallStatus::Failing), .. })
        ));
    }

    #[test]
    fn subscription_test_requires_tab() {
        assert!(parse(&["subscriptions", "add", "d", "--test", "TestFoo"]).is_err());
        let cli = parse(&["subscriptions", "add", "d", "t", "--test", "TestFoo"]).unwrap();
        let Some(Command::Subscriptions(SubscriptionsCommand::Add(target))) = cli.command else {
            panic!("expected subscriptions add");
        };
        assert_eq!(target.test.as_deref(), Some("TestFoo"));
    }

    #[test]
    fn explicit_state_dir_wins() {
        let cli = parse(&["--state-dir", "/tmp/x"]).unwrap();
        assert_eq!(cli.state_dir(), PathBuf::from("/tmp/x"));
    }
}
