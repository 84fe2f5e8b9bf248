use crate::app::{AppState, NavItem};
use crate::input::Focus;
use crate::model::OverallStatus;
use crate::subscription::SubscriptionTarget;
use crate::tui::palette::Palette;
use crate::tui::{spinner, truncate};
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

pub fn status_icon(status: OverallStatus) -> &'static str {
    match status {
        OverallStatus::Passing => "✓",
        OverallStatus::Flaky => "~",
        OverallStatus::Failing => "✗",
        OverallStatus::Stale => "·",
    }
}

pub fn render(f: &mut Frame, area: Rect, state: &AppState, palette: &Palette) {
    let focused = state.input_context().focus == Focus::Sidebar;
    let title_style = if focused { palette.title() } else { palette.dim() };
    let block = Block::default()
        .title(Line::from(Span::styled(" Dashboards ", title_style)))
        .borders(Borders::RIGHT)
        .border_style(Style::default().fg(palette.border));
    f.render_widget(block, area);

    let Some(list) = state.layout.nav_list() else {
        return;
    };
    let width = list.width as usize;

    let lines: Vec<Line> = state
        .nav
        .iter()
        .enumerate()
        .skip(state.nav_offset)
        .take(list.height as usize)
        .map(|(i, item)| {
            let selected = i == state.nav_cursor;
            let line = render_item(item, state, palette, width);
            if selected {
                let bg = if focused { palette.cursor_bg } else { palette.hover_bg };
                line.style(Style::default().bg(bg))
            } else {
                line
            }
        })
        .collect();

    f.render_widget(Paragraph::new(lines), list);
}

fn render_item<'a>(item: &'a NavItem, state: &AppState, palette: &Palette, width: usize) -> Line<'a> {
    let indent = "  ".repeat(item.depth() as usize);
    let (marker, name, status, target): (&str, &str, Option<OverallStatus>, Option<SubscriptionTarget>) =
        match item {
            NavItem::Group { name, expanded } => (
                if *expanded { "▾ " } else { "▸ " },
                name.as_str(),
                state.group_status(name),
                None,
            ),
            NavItem::Dashboard {
                group,
                name,
                expanded,
            } => (
                if *expanded { "▾ " } else { "▸ " },
                name.as_str(),
                state.dashboard_status(group, name),
                Some(SubscriptionTarget::dashboard(name.as_str())),
            ),
            NavItem::Tab { dashboard, name, .. } => (
                "  ",
                name.as_str(),
                state.tab_status(dashboard, name),
                Some(SubscriptionTarget::tab(dashboard.as_str(), name.as_str())),
            ),
            NavItem::Loading { .. } => {
                return Line::from(vec![
                    Span::raw(indent),
                    Span::styled(
                        format!("{} loading…", spinner::frame(state.spinner_frame)),
                        Style::default().fg(palette.warning),
                    ),
                ]);
            }
            NavItem::Failed { .. } => {
                return Line::from(vec![
                    Span::raw(indent),
                    Span::styled("✗ failed to load", Style::default().fg(palette.error)),
                    Span::styled(" (r retry)", palette.dim()),
                ]);
            }
            NavItem::Empty { .. } => {
                return Line::from(vec![Span::raw(indent), Span::styled("(empty)", palette.dim())]);
            }
        };

    let watched = target.is_some_and(|t| state.subscriptions.is_subscribed(&t));
    let suffix_width = 2 + usize::from(watched) * 2;
    let used = UnicodeWidthStr::width(indent.as_str()) + UnicodeWidthStr::width(marker);
    let name_width = width.saturating_sub(used + suffix_width);
    let name = truncate(name, name_width);
    let pad = name_width.saturating_sub(UnicodeWidthStr::width(name.as_str()));

    let name_style = match item {
        NavItem::Group { .. } => palette.text().add_modifier(Modifier::BOLD),
        _ => palette.text(),
    };
    let mut spans = vec![
        Span::raw(indent),
        Span::styled(marker, palette.dim()),
        Span::styled(name, name_style),
        Span::raw(" ".repeat(pad)),
    ];
    if watched {
        spans.push(Span::styled("★ ", Style::default().fg(palette.warning)));
    }
    match status {
        Some(status) => spans.push(Span::styled(
            format!(" {}", status_icon(status)),
            palette.status(status.color()),
        )),
        None => spans.push(Span::raw("  ")),
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_icons_are_single_column() {
        for status in [
            OverallStatus::Passing,
            OverallStatus::Flaky,
            OverallStatus::Failing,
            OverallStatus::Stale,
        ] {
            assert_eq!(UnicodeWidthStr::width(status_icon(status)), 1);
        }
    }
}
