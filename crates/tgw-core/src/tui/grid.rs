//! Tab view: filter toolbar, info bar and the scrolling results grid.

use crate::app::{ActiveOverlay, AppState, GridView};
use crate::filter::StatusFilter;
use crate::input::Focus;
use crate::model::{Header, Row};
use crate::query::Remote;
use crate::result::{self, Category};
use crate::subscription::SubscriptionTarget;
use crate::tui::palette::Palette;
use crate::tui::{spinner, truncate};
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

pub fn render(f: &mut Frame, state: &AppState, palette: &Palette) {
    let Some((view, headers, rows)) = state.grid_data() else {
        return;
    };
    let layout = state.layout;
    render_toolbar(f, layout.toolbar(), state, view, rows.len(), palette);
    render_info_bar(f, layout.info_bar(), view, headers, rows.len(), palette);

    let area = layout.grid();
    match state.grid_status() {
        Remote::Idle | Remote::Loading => {
            let msg = format!("{} Loading {}…", spinner::frame(state.spinner_frame), view.tab);
            render_message(f, area, Line::styled(msg, Style::default().fg(palette.warning)));
        }
        Remote::Failed(e) => {
            let msg = Line::from(vec![
                Span::styled(format!("Failed to load grid: {e}"), Style::default().fg(palette.error)),
                Span::styled("  r to retry", palette.dim()),
            ]);
            render_message(f, area, msg);
        }
        Remote::Ready(()) if rows.is_empty() => {
            render_message(f, area, Line::styled("No test results for this tab", palette.dim()));
        }
        Remote::Ready(()) if view.filtered.is_empty() => {
            render_message(
                f,
                area,
                Line::styled("No tests match the current filters (c to clear)", palette.dim()),
            );
        }
        Remote::Ready(()) => {
            let focused = state.input_context().focus == Focus::Grid;
            render_grid(f.buffer_mut(), area, state, view, headers, rows, focused, palette);
        }
    }
}

fn render_message(f: &mut Frame, area: Rect, line: Line) {
    if area.height == 0 {
        return;
    }
    let y = area.y + area.height / 3;
    let target = Rect::new(area.x, y, area.width, area.height - (y - area.y));
    f.render_widget(
        Paragraph::new(line).alignment(Alignment::Center).wrap(Wrap { trim: true }),
        target,
    );
}

fn render_toolbar(
    f: &mut Frame,
    area: Rect,
    state: &AppState,
    view: &GridView,
    total: usize,
    palette: &Palette,
) {
    let filter = state.filters.get(&view.dashboard, &view.tab);
    let editing = matches!(state.overlay, ActiveOverlay::TextFilter { .. });
    let on = |active: bool| {
        if active {
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
        } else {
            palette.dim()
        }
    };

    let mut spans = vec![
        Span::styled(" s ", palette.key()),
        Span::styled(format!("[{}]", filter.status_filter.label()), on(filter.status_filter != StatusFilter::All)),
        Span::styled("  / ", palette.key()),
    ];
    if editing {
        spans.push(Span::styled(
            format!("{}▏", filter.text_filter),
            Style::default().fg(palette.fg).add_modifier(Modifier::UNDERLINED),
        ));
    } else if filter.text_filter.is_empty() {
        spans.push(Span::styled("filter tests", palette.dim()));
    } else {
        spans.push(Span::styled(format!("\"{}\"", filter.text_filter), on(true)));
    }
    spans.push(Span::styled("  f ", palette.key()));
    spans.push(Span::styled("failures only", on(filter.show_only_failures)));
    if filter.is_active() {
        spans.push(Span::styled(
            format!("  {} of {} tests", view.filtered.len(), total),
            Style::default().fg(palette.warning),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_info_bar(
    f: &mut Frame,
    area: Rect,
    view: &GridView,
    headers: &[Header],
    total: usize,
    palette: &Palette,
) {
    let shown = view.filtered.len();
    let mut spans = vec![Span::styled(
        format!(" {total} tests × {} builds", headers.len()),
        palette.dim(),
    )];
    if let Some((first, last)) = view.composer.visible_rows() {
        spans.push(Span::styled(
            format!("  Showing rows {first} - {last} of {shown}"),
            palette.dim(),
        ));
    }
    let cursor = view.composer.cursor();
    if let Some(header) = headers.get(cursor.column) {
        spans.push(Span::styled("  │ ", palette.dim()));
        spans.push(Span::styled(header.build.as_str(), palette.text()));
        if let Some(started) = header.started_at() {
            spans.push(Span::styled(
                format!(" {}", started.format("%Y-%m-%d %H:%M UTC")),
                palette.dim(),
            ));
        }
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Glyph for one result cell; running cells pulse with the spinner.
pub fn cell_glyph(category: Category, frame: usize) -> char {
    match category {
        Category::Running => spinner::pulse(frame),
        Category::Empty => '·',
        Category::Truncated => '░',
        _ => '█',
    }
}

/// Trailing characters of a build id, which is where builds differ.
pub fn header_label(build: &str, width: usize) -> String {
    let chars: Vec<char> = build.chars().collect();
    chars[chars.len().saturating_sub(width)..].iter().collect()
}

/// Visible part of a `width`-wide span starting at `x`, given the columns
/// `lo..hi`, as `(first visible column, columns cut from the start, visible length)`.
pub fn clip(x: i32, width: usize, lo: i32, hi: i32) -> Option<(u16, usize, usize)> {
    let end = x + width as i32;
    let start = x.max(lo);
    let stop = end.min(hi);
    if start >= stop {
        return None;
    }
    Some((start as u16, (start - x) as usize, (stop - start) as usize))
}

fn put(buf: &mut Buffer, area: Rect, x: i32, y: i32, lo: i32, text: &str, style: Style) {
    if y < 0 || y >= i32::from(area.height) {
        return;
    }
    let width = text.chars().count();
    let Some((col, skip, len)) = clip(x, width, lo, i32::from(area.width)) else {
        return;
    };
    for (i, ch) in text.chars().skip(skip).take(len).enumerate() {
        let pos = (area.x + col + i as u16, area.y + y as u16);
        if let Some(cell) = buf.cell_mut(pos) {
            cell.set_char(ch).set_style(style);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render_grid(
    buf: &mut Buffer,
    area: Rect,
    state: &AppState,
    view: &GridView,
    headers: &[Header],
    rows: &[Row],
    focused: bool,
    palette: &Palette,
) {
    let composer = &view.composer;
    let config = composer.config();
    let label = composer.label_width();
    let label_lo = label as i32;
    let header_height = config.header_height as i32;
    let cell_text_width = config.cell_width.saturating_sub(1).max(1);
    let cursor = composer.cursor();
    let frame = composer.compose(headers, rows, view.filtered.indices());

    // Corner
    let corner = truncate(&format!(" Test ({})", view.filtered.len()), label.saturating_sub(1));
    buf.set_stringn(area.x, area.y, corner, label, palette.dim().add_modifier(Modifier::BOLD));

    for cell in &frame.header_cells {
        let style = if cell.highlighted || cell.index == cursor.column {
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
        } else {
            palette.dim()
        };
        let text = header_label(&cell.header.build, cell_text_width);
        put(buf, area, cell.x, 0, label_lo, &text, style);
    }

    for row in &frame.rows {
        if row.y < header_height || row.y >= i32::from(area.height) {
            continue;
        }
        let y = area.y + row.y as u16;
        let at_cursor_row = row.position == cursor.row;
        let row_bg = if row.highlighted {
            Some(palette.hover_bg)
        } else {
            None
        };

        let watched = state.subscriptions.is_subscribed(&SubscriptionTarget::test(
            view.dashboard.as_str(),
            view.tab.as_str(),
            row.name,
        ));
        let mut label_style = if at_cursor_row {
            palette.text().add_modifier(Modifier::BOLD)
        } else {
            palette.text()
        };
        if let Some(bg) = row_bg {
            label_style = label_style.bg(bg);
        }
        let marker = if watched { "★" } else { " " };
        let name = truncate(row.name, label.saturating_sub(2));
        let text = format!("{marker}{name:<width$}", width = label.saturating_sub(2));
        buf.set_stringn(area.x, y, text, label, label_style);
        if watched {
            if let Some(cell) = buf.cell_mut((area.x, y)) {
                cell.set_fg(palette.warning);
            }
        }

        for cell in &row.cells {
            let glyph = cell_glyph(cell.category, state.spinner_frame);
            let text: String = std::iter::repeat_n(glyph, cell_text_width).collect();
            let mut style = palette.status(cell.color);
            if cell.at_cursor && focused {
                style = style.bg(palette.cursor_bg).add_modifier(Modifier::REVERSED);
            } else if cell.column_highlighted || row.highlighted {
                style = style.bg(palette.hover_bg);
            }
            if result::is_animated(cell.category) {
                style = style.add_modifier(Modifier::BOLD);
            }
            put(buf, area, cell.x, row.y, label_lo, &text, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_fully_visible() {
        assert_eq!(clip(10, 3, 5, 40), Some((10, 0, 3)));
    }

    #[test]
    fn clip_under_sticky_label() {
        // Starts two columns under the label column.
        assert_eq!(clip(3, 3, 5, 40), Some((5, 2, 1)));
        assert_eq!(clip(0, 3, 5, 40), None);
    }

    #[test]
    fn clip_past_right_edge() {
        assert_eq!(clip(38, 3, 5, 40), Some((38, 0, 2)));
        assert_eq!(clip(40, 3, 5, 40), None);
    }

    #[test]
    fn clip_negative_offsets() {
        assert_eq!(clip(-10, 3, 0, 40), None);
        assert_eq!(clip(-1, 3, 0, 40), Some((0, 1, 2)));
    }

    #[test]
    fn header_label_keeps_tail() {
        assert_eq!(header_label("1789012345", 2), "45");
        assert_eq!(header_label("7", 2), "7");
        assert_eq!(header_label("", 2), "");
    }

    #[test]
    fn running_cells_animate() {
        let glyphs: std::collections::HashSet<char> =
            (0..crate::app::SPINNER_FRAME_COUNT).map(|f| cell_glyph(Category::Running, f)).collect();
        assert!(glyphs.len() > 1);
        assert_eq!(cell_glyph(Category::Pass, 0), cell_glyph(Category::Pass, 5));
    }
}
