use crate::app::{ActiveOverlay, AppState, View};
use crate::subscription::SubscriptionTarget;
use crate::tui::palette::Palette;
use crate::tui::{detail_overlay, footer, grid, header, search_overlay, sidebar, subscriptions};
use ratatui::layout::{Alignment, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

pub fn render(f: &mut Frame, state: &AppState) {
    let palette = Palette::for_theme(state.resolved_theme);
    f.render_widget(Block::default().style(palette.text()), f.area());

    let layout = state.layout;
    header::render(f, layout.header, state, &palette);
    if let Some(area) = layout.sidebar {
        sidebar::render(f, area, state, &palette);
    }
    match &state.view {
        View::Empty => render_welcome(f, layout.main, &palette),
        View::Grid(_) => grid::render(f, state, &palette),
        View::Subscriptions(view) => subscriptions::render(f, layout.main, state, view.cursor, &palette),
    }
    footer::render(f, layout.footer, state, &palette);

    // Error toast
    if let Some(err) = state.error_message() {
        let area = f.area();
        if area.height > 6 && area.width >= 4 {
            let err_area = Rect {
                x: area.x + 1,
                y: area.y + area.height.saturating_sub(5),
                width: area.width.saturating_sub(2),
                height: 3,
            };
            let err_widget = Paragraph::new(err.to_owned())
                .style(Style::default().fg(palette.error).bg(palette.overlay_bg))
                .block(
                    Block::default()
                        .title(" Error ")
                        .title_bottom(Line::from(" Esc dismiss · r retry ").right_aligned())
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(palette.error)),
                )
                .wrap(Wrap { trim: true });
            f.render_widget(err_widget, err_area);
        }
    }

    // Overlay (drawn on top of everything)
    match &state.overlay {
        ActiveOverlay::Detail => {
            if let (Some(detail), Some(view)) = (state.selected_cell(), state.grid_view()) {
                let watched = state.subscriptions.is_subscribed(&SubscriptionTarget::test(
                    view.dashboard.as_str(),
                    view.tab.as_str(),
                    detail.row_name.as_str(),
                ));
                detail_overlay::render(f, detail, watched, &palette);
            }
        }
        ActiveOverlay::Search(overlay) => {
            search_overlay::render(f, overlay, &state.ui.search_query, &palette);
        }
        // Edited in place in the grid toolbar.
        ActiveOverlay::TextFilter { .. } | ActiveOverlay::None => {}
    }
}

fn render_welcome(f: &mut Frame, area: Rect, palette: &Palette) {
    if area.height == 0 {
        return;
    }
    let lines = vec![
        Line::styled("TestGrid", palette.title()),
        Line::raw(""),
        Line::styled("Pick a tab in the sidebar and press Enter", palette.dim()),
        Line::styled("/ or Ctrl-K searches every dashboard", palette.dim()),
        Line::styled("W lists what you are watching", palette.dim()),
    ];
    let y = area.y + area.height / 3;
    let target = Rect::new(area.x, y, area.width, area.height - (y - area.y));
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), target);
}
