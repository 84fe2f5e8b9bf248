use crate::grid::CellDetail;
use crate::tui::palette::Palette;
use crate::tui::{centered, truncate};
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

/// Label/value pairs shown above the message.
pub fn fields(detail: &CellDetail) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("Test", detail.row_name.clone()),
        ("Result", detail.cell.label().into_owned()),
    ];
    if let Some(header) = &detail.header {
        fields.push(("Build", header.build.clone()));
        if let Some(started) = header.started_at() {
            fields.push(("Started", started.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
        }
        if let Some(extra) = header.extra.as_ref().filter(|e| !e.is_empty()) {
            fields.push(("Extra", extra.join(", ")));
        }
    }
    fields
}

pub fn render(f: &mut Frame, detail: &CellDetail, watched: bool, palette: &Palette) {
    let area = f.area();
    let fields = fields(detail);
    let message = detail.cell.message.as_deref().unwrap_or_default();

    let width = (area.width * 6 / 10).max(30).min(area.width);
    let inner_width = width.saturating_sub(2) as usize;
    let message_lines = message
        .lines()
        .map(|l| UnicodeWidthStr::width(l).div_ceil(inner_width.max(1)).max(1))
        .sum::<usize>();
    // +2 border, +1 blank line before the message
    let content = fields.len() + 1 + message_lines;
    let height = (content.min(u16::MAX as usize - 3) as u16).saturating_add(3);
    let overlay_area: Rect = centered(area, width, height.max(6));

    f.render_widget(Clear, overlay_area);

    let hints = if watched {
        " w unwatch test · q/Esc close "
    } else {
        " w watch test · q/Esc close "
    };
    let block = Block::default()
        .title(format!(" {} ", truncate(&detail.row_name, inner_width.saturating_sub(2))))
        .title_bottom(Line::from(hints).centered())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .style(Style::default().bg(palette.overlay_bg));

    let label_width = fields
        .iter()
        .map(|(l, _)| UnicodeWidthStr::width(*l))
        .max()
        .unwrap_or(0);
    let value_max = inner_width.saturating_sub(label_width + 2);

    let mut lines: Vec<Line> = fields
        .iter()
        .map(|(label, value)| {
            let value_style = if *label == "Result" {
                palette.status(detail.cell.color()).add_modifier(Modifier::BOLD)
            } else {
                palette.text()
            };
            Line::from(vec![
                Span::styled(format!("{label:>label_width$}  "), palette.title()),
                Span::styled(truncate(value, value_max), value_style),
            ])
        })
        .collect();
    lines.push(Line::raw(""));
    lines.extend(message.lines().map(|l| Line::styled(l.to_string(), palette.text())));

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(paragraph, overlay_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cell, Header};
    use crate::result;

    fn detail(header: Option<Header>) -> CellDetail {
        CellDetail {
            row_name: "TestFoo".into(),
            row_index: 0,
            cell_index: 1,
            cell: Cell {
                result: Some(result::FAIL),
                message: Some("timeout waiting for pod".into()),
                icon: None,
            },
            header,
        }
    }

    #[test]
    fn fields_include_build_when_known() {
        let fields = fields(&detail(Some(Header {
            build: "1789".into(),
            started: Some("2024-05-01T10:00:00Z".into()),
            extra: None,
        })));
        let labels: Vec<&str> = fields.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, ["Test", "Result", "Build", "Started"]);
        assert_eq!(fields[1].1, "Fail");
        assert_eq!(fields[3].1, "2024-05-01 10:00:00 UTC");
    }

    #[test]
    fn fields_without_header() {
        let fields = fields(&detail(None));
        assert_eq!(fields.len(), 2);
    }
}
