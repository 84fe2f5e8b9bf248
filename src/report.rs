//! Non-interactive subcommands: fetch once, print a table or JSON, exit.

use crate::cli::{Command, GridArgs, PrefsCommand, SubscriptionsCommand, TargetArgs};
use color_eyre::eyre::{eyre, Result};
use serde_json::json;
use std::io::Write;
use tgw_core::api::{ApiError, TestGridApi};
use tgw_core::filter::{self, FilterState, FilterStore};
use tgw_core::model::{OverallStatus, Row};
use tgw_core::prefs::{PreferencesBundle, ThemeStore, UiStore};
use tgw_core::query::{fetch_with_retry, RetryPolicy};
use tgw_core::result::{self, Category};
use tgw_core::search::{self, MAX_RESULTS};
use tgw_core::storage::Storage;
use tgw_core::subscription::{SubscriptionStore, SubscriptionTarget};
use tgw_core::tui::grid::header_label;
use unicode_width::UnicodeWidthStr;

const NAME_WIDTH: usize = 60;

pub async fn run(
    command: &Command,
    api: &dyn TestGridApi,
    storage: &dyn Storage,
    as_json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Groups => groups(api, as_json, out).await,
        Command::Dashboards { group } => dashboards(api, group, as_json, out).await,
        Command::Tabs { dashboard } => tabs(api, dashboard, as_json, out).await,
        Command::Summaries { dashboard, status } => {
            summaries(api, dashboard, *status, as_json, out).await
        }
        Command::Grid(args) => grid(api, args, as_json, out).await,
        Command::Search { query, deep } => search(api, query, *deep, as_json, out).await,
        Command::Subscriptions(cmd) => subscriptions(cmd, storage, as_json, out),
        Command::Prefs(cmd) => prefs(cmd, storage, out),
    }
}

async fn retrying<T, F, Fut>(op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ApiError>>,
{
    fetch_with_retry(RetryPolicy::default(), op)
        .await
        .map_err(|e| eyre!(e))
}

fn pad(s: &str, width: usize) -> String {
    let s = tgw_core::tui::truncate(s, width);
    let fill = width.saturating_sub(UnicodeWidthStr::width(s.as_str()));
    format!("{s}{}", " ".repeat(fill))
}

fn print_json(out: &mut dyn Write, value: &serde_json::Value) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

async fn groups(api: &dyn TestGridApi, as_json: bool, out: &mut dyn Write) -> Result<()> {
    let list = retrying(|| api.dashboard_groups()).await?;
    if as_json {
        return print_json(out, &serde_json::to_value(&list)?);
    }
    for group in &list.dashboard_groups {
        writeln!(out, "{}", group.name)?;
    }
    Ok(())
}

async fn dashboards(api: &dyn TestGridApi, group: &str, as_json: bool, out: &mut dyn Write) -> Result<()> {
    let list = retrying(|| api.dashboards_in_group(group)).await?;
    // Statuses are optional decoration; a failure here still prints the names.
    let summaries = match retrying(|| api.group_summaries(group)).await {
        Ok(s) => s.dashboard_summaries,
        Err(e) => {
            tracing::warn!(%group, error = %e, "dashboard summaries unavailable");
            Vec::new()
        }
    };
    let status_of = |name: &str| {
        summaries
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.overall_status)
    };
    if as_json {
        let items: Vec<_> = list
            .dashboards
            .iter()
            .map(|d| json!({"name": d.name, "overall_status": status_of(&d.name)}))
            .collect();
        return print_json(out, &json!(items));
    }
    writeln!(out, "{}  STATUS", pad("DASHBOARD", NAME_WIDTH))?;
    for dashboard in &list.dashboards {
        let status = status_of(&dashboard.name).map_or("-", OverallStatus::as_str);
        writeln!(out, "{}  {status}", pad(&dashboard.name, NAME_WIDTH))?;
    }
    Ok(())
}

async fn tabs(api: &dyn TestGridApi, dashboard: &str, as_json: bool, out: &mut dyn Write) -> Result<()> {
    let list = retrying(|| api.dashboard_tabs(dashboard)).await?;
    if as_json {
        return print_json(out, &serde_json::to_value(&list)?);
    }
    for tab in &list.dashboard_tabs {
        writeln!(out, "{}", tab.name)?;
    }
    Ok(())
}

async fn summaries(
    api: &dyn TestGridApi,
    dashboard: &str,
    status: Option<OverallStatus>,
    as_json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let mut list = retrying(|| api.tab_summaries(dashboard)).await?.tab_summaries;
    if let Some(status) = status {
        list.retain(|s| s.overall_status == status);
    }
    if as_json {
        return print_json(out, &serde_json::to_value(&list)?);
    }
    writeln!(out, "{}  {:<8}  MESSAGE", pad("TAB", 40), "STATUS")?;
    for summary in &list {
        writeln!(
            out,
            "{}  {:<8}  {}",
            pad(&summary.tab_name, 40),
            summary.overall_status.as_str(),
            summary.detailed_status_message.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

/// One-character cell marker for plain-text grids.
pub fn cell_symbol(category: Category) -> char {
    match category {
        Category::Pass => 'P',
        Category::Fail => 'F',
        Category::Flaky => 'K',
        Category::Skip => 'S',
        Category::Running => 'R',
        Category::Truncated => 'T',
        Category::Aborted => 'A',
        Category::Empty => '.',
    }
}

fn grid_rows<'a>(rows: &'a [Row], args: &GridArgs) -> Vec<&'a Row> {
    let filter = FilterState {
        status_filter: args.status,
        text_filter: args.text.clone().unwrap_or_default(),
        show_only_failures: args.failures_only,
    };
    filter::filter_rows(rows, &filter)
}

async fn grid(api: &dyn TestGridApi, args: &GridArgs, as_json: bool, out: &mut dyn Write) -> Result<()> {
    let (headers, all_rows) = tokio::try_join!(
        retrying(|| api.tab_headers(&args.dashboard, &args.tab)),
        retrying(|| api.tab_rows(&args.dashboard, &args.tab)),
    )?;
    let builds: Vec<_> = headers.headers.iter().take(args.limit).collect();
    let rows = grid_rows(&all_rows.rows, args);

    if as_json {
        let items: Vec<_> = rows
            .iter()
            .map(|row| {
                let cells: Vec<_> = builds
                    .iter()
                    .zip(&row.cells)
                    .map(|(header, cell)| {
                        json!({
                            "build": header.build,
                            "status": result::status_name(cell.result_code()),
                            "message": cell.message,
                        })
                    })
                    .collect();
                json!({"name": row.name, "cells": cells})
            })
            .collect();
        return print_json(out, &json!(items));
    }

    let mut header_line = pad("TEST", NAME_WIDTH);
    for header in &builds {
        header_line.push(' ');
        header_line.push_str(&format!("{:>4}", header_label(&header.build, 4)));
    }
    writeln!(out, "{}", header_line.trim_end())?;
    for row in &rows {
        let mut line = pad(&row.name, NAME_WIDTH);
        for cell in row.cells.iter().take(builds.len()) {
            line.push_str(&format!(" {:>4}", cell_symbol(cell.category())));
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    writeln!(out, "{} of {} tests", rows.len(), all_rows.rows.len())?;
    Ok(())
}

async fn search(api: &dyn TestGridApi, query: &str, deep: bool, as_json: bool, out: &mut dyn Write) -> Result<()> {
    let groups = retrying(|| api.dashboard_groups()).await?.dashboard_groups;
    // (kind, name, parent)
    let mut entries: Vec<(&'static str, String, Option<String>)> = groups
        .iter()
        .map(|g| ("group", g.name.clone(), None))
        .collect();
    if deep {
        for group in &groups {
            match retrying(|| api.dashboards_in_group(&group.name)).await {
                Ok(list) => entries.extend(
                    list.dashboards
                        .into_iter()
                        .map(|d| ("dashboard", d.name, Some(group.name.clone()))),
                ),
                Err(e) => tracing::warn!(group = %group.name, error = %e, "skipping group"),
            }
        }
    }

    let results = search::fuzzy_search(&entries, query, |e| e.1.as_str(), MAX_RESULTS);
    if as_json {
        let items: Vec<_> = results
            .iter()
            .map(|r| json!({"kind": r.item.0, "name": r.item.1, "group": r.item.2, "score": r.score}))
            .collect();
        return print_json(out, &json!(items));
    }
    if results.is_empty() {
        writeln!(out, "No matches for {query:?}")?;
    }
    for r in &results {
        let context = r.item.2.as_deref().map(|g| format!("  ({g})")).unwrap_or_default();
        writeln!(out, "{:<9} {}{context}", r.item.0, r.item.1)?;
    }
    Ok(())
}

fn target_of(args: &TargetArgs) -> SubscriptionTarget {
    match (&args.tab, &args.test) {
        (Some(tab), Some(test)) => SubscriptionTarget::test(&args.dashboard, tab, test),
        (Some(tab), None) => SubscriptionTarget::tab(&args.dashboard, tab),
        (None, _) => SubscriptionTarget::dashboard(&args.dashboard),
    }
}

fn subscriptions(
    command: &SubscriptionsCommand,
    storage: &dyn Storage,
    as_json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let mut store = SubscriptionStore::load(storage);
    match command {
        SubscriptionsCommand::List => {
            if as_json {
                return print_json(out, &serde_json::to_value(store.all())?);
            }
            if store.is_empty() {
                writeln!(out, "No subscriptions")?;
            }
            for sub in store.all() {
                writeln!(
                    out,
                    "{:<9} {}  (since {})",
                    sub.target.kind().label().trim_end_matches('s').to_lowercase(),
                    sub.target.display_name(),
                    sub.created_at.format("%Y-%m-%d")
                )?;
            }
        }
        SubscriptionsCommand::Export => writeln!(out, "{}", store.export_json()?)?,
        SubscriptionsCommand::Import { file } => {
            let contents = std::fs::read_to_string(file)
                .map_err(|e| eyre!("Cannot read {}: {e}", file.display()))?;
            let added = store.import_json(&contents)?;
            store.save(storage);
            writeln!(out, "Imported {added} new subscription(s)")?;
        }
        SubscriptionsCommand::Add(args) => {
            let target = target_of(args);
            let name = target.display_name();
            if store.subscribe(target) {
                store.save(storage);
                writeln!(out, "Watching {name}")?;
            } else {
                writeln!(out, "Already watching {name}")?;
            }
        }
        SubscriptionsCommand::Remove(args) => {
            let target = target_of(args);
            if !store.unsubscribe_target(&target) {
                return Err(eyre!("Not watching {}", target.display_name()));
            }
            store.save(storage);
            writeln!(out, "Stopped watching {}", target.display_name())?;
        }
        SubscriptionsCommand::Clear => {
            let count = store.len();
            store.clear_all();
            store.save(storage);
            writeln!(out, "Removed {count} subscription(s)")?;
        }
    }
    Ok(())
}

fn prefs(command: &PrefsCommand, storage: &dyn Storage, out: &mut dyn Write) -> Result<()> {
    let mut subscriptions = SubscriptionStore::load(storage);
    let mut filters = FilterStore::load(storage);
    let mut theme = ThemeStore::load(storage);
    let mut ui = UiStore::load(storage);
    match command {
        PrefsCommand::Export => {
            let bundle = PreferencesBundle::collect(&subscriptions, &filters, &theme, &ui);
            writeln!(out, "{}", serde_json::to_string_pretty(&bundle)?)?;
        }
        PrefsCommand::Import { file } => {
            let contents = std::fs::read_to_string(file)
                .map_err(|e| eyre!("Cannot read {}: {e}", file.display()))?;
            let bundle = PreferencesBundle::parse(&contents)?;
            let added = bundle.apply(&mut subscriptions, &mut filters, &mut theme, &mut ui)?;
            subscriptions.save(storage);
            filters.save(storage);
            theme.save(storage);
            ui.save(storage);
            writeln!(out, "Imported preferences ({added} new subscription(s))")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tgw_core::storage::MemoryStorage;

    fn target(dashboard: &str, tab: Option<&str>, test: Option<&str>) -> TargetArgs {
        TargetArgs {
            dashboard: dashboard.into(),
            tab: tab.map(Into::into),
            test: test.map(Into::into),
        }
    }

    fn run_subs(cmd: SubscriptionsCommand, storage: &MemoryStorage) -> String {
        let mut out = Vec::new();
        subscriptions(&cmd, storage, false, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn target_depth_follows_arguments() {
        assert_eq!(target_of(&target("d", None, None)), SubscriptionTarget::dashboard("d"));
        assert_eq!(target_of(&target("d", Some("t"), None)), SubscriptionTarget::tab("d", "t"));
        assert_eq!(
            target_of(&target("d", Some("t"), Some("x"))),
            SubscriptionTarget::test("d", "t", "x")
        );
    }

    #[test]
    fn add_list_remove_round_trip() {
        let storage = MemoryStorage::default();
        assert_eq!(
            run_subs(SubscriptionsCommand::Add(target("sig-node", Some("e2e"), None)), &storage),
            "Watching sig-node / e2e\n"
        );
        assert_eq!(
            run_subs(SubscriptionsCommand::Add(target("sig-node", Some("e2e"), None)), &storage),
            "Already watching sig-node / e2e\n"
        );
        let listed = run_subs(SubscriptionsCommand::List, &storage);
        assert!(listed.starts_with("tab"), "{listed}");
        assert!(listed.contains("sig-node / e2e"));

        run_subs(SubscriptionsCommand::Remove(target("sig-node", Some("e2e"), None)), &storage);
        assert_eq!(run_subs(SubscriptionsCommand::List, &storage), "No subscriptions\n");
    }

    #[test]
    fn removing_unknown_target_fails() {
        let storage = MemoryStorage::default();
        let mut out = Vec::new();
        let cmd = SubscriptionsCommand::Remove(target("nope", None, None));
        assert!(subscriptions(&cmd, &storage, false, &mut out).is_err());
    }

    #[test]
    fn clear_reports_count() {
        let storage = MemoryStorage::default();
        run_subs(SubscriptionsCommand::Add(target("a", None, None)), &storage);
        run_subs(SubscriptionsCommand::Add(target("b", None, None)), &storage);
        assert_eq!(run_subs(SubscriptionsCommand::Clear, &storage), "Removed 2 subscription(s)\n");
    }

    #[test]
    fn prefs_export_imports_elsewhere() {
        let source = MemoryStorage::default();
        run_subs(SubscriptionsCommand::Add(target("sig-node", Some("e2e"), None)), &source);
        let mut exported = Vec::new();
        prefs(&PrefsCommand::Export, &source, &mut exported).unwrap();

        let dir = std::env::temp_dir().join(format!("tgw-prefs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("prefs.json");
        std::fs::write(&file, &exported).unwrap();

        let target_storage = MemoryStorage::default();
        let mut out = Vec::new();
        prefs(&PrefsCommand::Import { file: file.clone() }, &target_storage, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Imported preferences (1 new subscription(s))\n"
        );
        assert_eq!(SubscriptionStore::load(&target_storage).len(), 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cell_symbols_are_distinct() {
        let all = [
            Category::Pass,
            Category::Fail,
            Category::Flaky,
            Category::Skip,
            Category::Running,
            Category::Truncated,
            Category::Aborted,
            Category::Empty,
        ];
        let symbols: std::collections::HashSet<char> = all.into_iter().map(cell_symbol).collect();
        assert_eq!(symbols.len(), all.len());
    }

    #[test]
    fn pad_truncates_and_fills() {
        assert_eq!(pad("abc", 5), "abc  ");
        assert_eq!(pad("abcdefgh", 5), "abcd…");
    }
}
