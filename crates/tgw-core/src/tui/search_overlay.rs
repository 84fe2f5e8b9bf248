use crate::app::SearchOverlay;
use crate::search::highlight_matches;
use crate::tui::palette::Palette;
use crate::tui::{centered, truncate};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

/// First result to draw so the cursor stays inside `height` lines.
pub fn scroll_start(cursor: usize, height: usize) -> usize {
    (cursor + 1).saturating_sub(height.max(1))
}

pub fn render(f: &mut Frame, overlay: &SearchOverlay, query: &str, palette: &Palette) {
    let area = f.area();
    let width = (area.width * 6 / 10).max(40).min(area.width);
    let height = (area.height * 6 / 10).max(8).min(area.height);
    let overlay_area = centered(area, width, height);
    f.render_widget(Clear, overlay_area);

    let block = Block::default()
        .title(" Search dashboards ")
        .title_bottom(Line::from(" ↑↓ select · Enter go · Esc cancel ").centered())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .style(Style::default().bg(palette.overlay_bg));
    let inner = block.inner(overlay_area);
    f.render_widget(block, overlay_area);

    let inner_width = inner.width as usize;
    let list_height = (inner.height as usize).saturating_sub(2);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("› ", palette.key()),
            Span::styled(format!("{query}▏"), palette.text()),
        ]),
        Line::raw(""),
    ];

    if query.is_empty() {
        lines.push(Line::styled(
            format!("Type to search {} groups, dashboards and tabs", overlay.entries.len()),
            palette.dim(),
        ));
    } else if overlay.results.is_empty() {
        lines.push(Line::styled("No matches", palette.dim()));
    }

    let start = scroll_start(overlay.cursor, list_height);
    for (i, result) in overlay.results.iter().enumerate().skip(start).take(list_height) {
        let selected = i == overlay.cursor;
        let base = if selected {
            Style::default().bg(palette.cursor_bg).fg(palette.fg)
        } else {
            palette.text()
        };
        let entry = &result.item;
        let kind = format!("{:<9}", entry.target.kind_label());
        let mut spans = vec![
            Span::styled(if selected { "▶ " } else { "  " }, base),
            Span::styled(kind, palette.dim()),
        ];
        for segment in highlight_matches(&entry.text, &result.matches) {
            let style = if segment.highlighted {
                base.fg(palette.warning).add_modifier(Modifier::BOLD)
            } else {
                base
            };
            spans.push(Span::styled(segment.text, style));
        }
        if let Some(context) = entry.target.context() {
            let used = 11 + entry.text.chars().count();
            let room = inner_width.saturating_sub(used + 2);
            if room > 3 {
                spans.push(Span::styled(format!("  {}", truncate(&context, room)), palette.dim()));
            }
        }
        lines.push(Line::from(spans));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_keeps_cursor_visible() {
        assert_eq!(scroll_start(0, 10), 0);
        assert_eq!(scroll_start(9, 10), 0);
        assert_eq!(scroll_start(10, 10), 1);
        assert_eq!(scroll_start(3, 0), 3);
    }
}
