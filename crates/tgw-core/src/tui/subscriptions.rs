use crate::app::AppState;
use crate::subscription::SubscriptionKind;
use crate::tui::palette::Palette;
use crate::tui::sidebar::status_icon;
use crate::tui::truncate;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(f: &mut Frame, area: Rect, state: &AppState, cursor: usize, palette: &Palette) {
    let entries = state.subscription_entries();
    let settings = state.subscriptions.notification_settings();
    let title = format!(
        " Watched ({}) · poll every {}s{} ",
        entries.len(),
        settings.poll_interval_seconds,
        if settings.enabled { "" } else { " · notifications off" },
    );
    let block = Block::default()
        .title(Line::from(Span::styled(title, palette.title())))
        .borders(Borders::TOP)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if entries.is_empty() {
        let msg = Line::styled(
            "Nothing watched yet. Press w on a dashboard, tab or test to watch it.",
            palette.dim(),
        );
        f.render_widget(Paragraph::new(msg), inner);
        return;
    }

    // One heading line per kind, then its entries.
    let mut lines = Vec::new();
    let mut cursor_line = 0;
    let width = inner.width as usize;
    let mut last_kind: Option<SubscriptionKind> = None;
    for (i, sub) in entries.iter().enumerate() {
        let kind = sub.target.kind();
        if last_kind != Some(kind) {
            lines.push(Line::styled(
                format!(" {}", kind.label()),
                palette.dim().add_modifier(Modifier::BOLD),
            ));
            last_kind = Some(kind);
        }
        let selected = i == cursor;
        if selected {
            cursor_line = lines.len();
        }
        let status = sub
            .target
            .tab_name()
            .and_then(|tab| state.tab_status(sub.target.dashboard_name(), tab));
        let since = sub.created_at.format("%Y-%m-%d").to_string();
        let name = truncate(&sub.target.display_name(), width.saturating_sub(20));
        let mut spans = vec![
            Span::raw(if selected { " ▶ " } else { "   " }),
            Span::styled(name, palette.text()),
        ];
        if let Some(status) = status {
            spans.push(Span::styled(
                format!(" {}", status_icon(status)),
                palette.status(status.color()),
            ));
        }
        spans.push(Span::styled(format!("  since {since}"), palette.dim()));
        let line = Line::from(spans);
        lines.push(if selected {
            line.style(Style::default().bg(palette.cursor_bg))
        } else {
            line
        });
    }

    let height = inner.height as usize;
    let scroll = (cursor_line + 1).saturating_sub(height.max(1));
    let visible: Vec<Line> = lines.into_iter().skip(scroll).take(height).collect();
    f.render_widget(Paragraph::new(visible), inner);
}
