use crate::app::{AppState, NARROW_WIDTH_THRESHOLD};
use crate::input::{Focus, InputContext, OverlayMode};
use crate::tui::palette::Palette;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub fn hints(ctx: &InputContext, narrow: bool) -> &'static [(&'static str, &'static str)] {
    match (ctx.overlay, ctx.focus, narrow) {
        (OverlayMode::Detail, ..) => &[("w", "watch test"), ("q/Esc", "close")],
        (OverlayMode::Search, ..) => &[("↑↓", "select"), ("Enter", "go"), ("Esc", "cancel")],
        (OverlayMode::TextFilter, ..) => &[("Enter", "apply"), ("Esc", "cancel")],
        (OverlayMode::None, Focus::Sidebar, true) => &[
            ("j/k", "nav"),
            ("l/h", "exp/col"),
            ("/", "find"),
            ("w", "watch"),
            ("q", "quit"),
        ],
        (OverlayMode::None, Focus::Sidebar, false) => &[
            ("↑↓/jk", "navigate"),
            ("→/l", "expand"),
            ("←/h", "collapse"),
            ("Enter", "open"),
            ("/", "search"),
            ("w", "watch"),
            ("W", "watched"),
            ("r", "refresh"),
            ("q", "quit"),
        ],
        (OverlayMode::None, Focus::Grid, true) => &[
            ("hjkl", "move"),
            ("Enter", "detail"),
            ("/", "filter"),
            ("s", "status"),
            ("q", "quit"),
        ],
        (OverlayMode::None, Focus::Grid, false) => &[
            ("hjkl", "move"),
            ("Enter", "detail"),
            ("/", "filter"),
            ("s", "status"),
            ("f", "failures"),
            ("c", "clear"),
            ("w", "watch tab"),
            ("Tab", "sidebar"),
            ("q", "quit"),
        ],
        (OverlayMode::None, Focus::Subscriptions, _) => &[
            ("j/k", "navigate"),
            ("Enter", "open"),
            ("x", "remove"),
            ("Esc", "back"),
            ("q", "quit"),
        ],
    }
}

pub fn render(f: &mut Frame, area: Rect, state: &AppState, palette: &Palette) {
    let narrow = area.width < NARROW_WIDTH_THRESHOLD;

    let line = if let Some(notif) = state.notifications.last() {
        let color = if notif.failure { palette.error } else { palette.warning };
        Line::from(vec![
            Span::styled(" ★ ", Style::default().fg(color)),
            Span::styled(notif.message.as_str(), Style::default().fg(color)),
        ])
    } else {
        let mut spans: Vec<Span> = vec![Span::raw(" ")];
        for (i, (key, desc)) in hints(&state.input_context(), narrow).iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(*key, palette.key()));
            spans.push(Span::styled(format!(" {desc}"), palette.dim()));
        }
        Line::from(spans)
    };

    f.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(overlay: OverlayMode, focus: Focus) -> InputContext {
        InputContext {
            has_error: false,
            overlay,
            focus,
        }
    }

    #[test]
    fn overlays_override_focus_hints() {
        let hints = hints(&ctx(OverlayMode::Search, Focus::Grid), false);
        assert!(hints.iter().any(|(k, _)| *k == "Enter"));
        assert!(!hints.iter().any(|(k, _)| *k == "hjkl"));
    }

    #[test]
    fn narrow_hints_are_shorter() {
        let wide = hints(&ctx(OverlayMode::None, Focus::Grid), false);
        let narrow = hints(&ctx(OverlayMode::None, Focus::Grid), true);
        assert!(narrow.len() < wide.len());
    }
}
