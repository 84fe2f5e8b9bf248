use crate::app::AppState;
use crate::tui::palette::Palette;
use crate::tui::spinner;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub fn render(f: &mut Frame, area: Rect, state: &AppState, palette: &Palette) {
    let mut spans = vec![
        Span::styled(format!(" tgw v{} ", state.config.version), palette.title()),
        Span::styled("│ ", palette.dim()),
    ];

    match state.grid_view() {
        Some(view) => {
            let dashboard_style = state
                .current_dashboard_status()
                .map_or(palette.text(), |s| palette.status(s.color()));
            spans.push(Span::styled(
                view.dashboard.as_str(),
                dashboard_style.add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(" / ", palette.dim()));
            spans.push(Span::styled(view.tab.as_str(), palette.text()));
            if let Some(status) = state.current_tab_summary().map(|s| s.overall_status) {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    format!("[{}]", status.label()),
                    palette.status(status.color()).add_modifier(Modifier::BOLD),
                ));
            }
        }
        None => spans.push(Span::styled("TestGrid", palette.text())),
    }

    let watched = state.subscriptions.len();
    if watched > 0 {
        spans.push(Span::styled(format!("  ★ {watched}"), Style::default().fg(palette.warning)));
    }

    if state.is_loading() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            spinner::frame(state.spinner_frame).to_string(),
            Style::default().fg(palette.warning),
        ));
    }

    if state.error_message().is_some() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            "!",
            Style::default().fg(palette.error).add_modifier(Modifier::BOLD),
        ));
    }

    spans.push(Span::styled(
        format!("  {}", state.theme.theme.label()),
        palette.dim(),
    ));

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
