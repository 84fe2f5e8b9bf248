use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    DismissError,
    Back,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    PageUp,
    PageDown,
    Top,
    Bottom,
    RowStart,
    RowEnd,
    CenterCursor,
    Expand,
    Collapse,
    Select,
    Toggle,
    SwitchFocus,
    ToggleSidebar,
    OpenSearch,
    CycleTheme,
    Refresh,
    ToggleSubscription,
    ShowSubscriptions,
    EditTextFilter,
    CycleStatusFilter,
    ToggleFailuresOnly,
    ClearFilters,
    DeleteEntry,
    CloseOverlay,
    OverlayInput(char),
    OverlayBackspace,
    OverlaySubmit,
    None,
}

/// Which overlay (if any) is currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayMode {
    #[default]
    None,
    Detail,
    Search,
    TextFilter,
}

/// Which pane receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Sidebar,
    Grid,
    Subscriptions,
}

/// Captures the UI state needed to interpret a key press.
#[derive(Debug, Clone, Default)]
pub struct InputContext {
    pub has_error: bool,
    pub overlay: OverlayMode,
    pub focus: Focus,
}

pub fn map_key(key: KeyEvent, ctx: &InputContext) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Ctrl+C always quits
    if ctrl && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match ctx.overlay {
        OverlayMode::Search | OverlayMode::TextFilter => return map_text_input(key, ctx.overlay),
        OverlayMode::Detail => {
            return match key.code {
                KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => Action::CloseOverlay,
                KeyCode::Char('w') => Action::ToggleSubscription,
                _ => Action::None,
            };
        }
        OverlayMode::None => {}
    }

    if ctrl && key.code == KeyCode::Char('k') {
        return Action::OpenSearch;
    }

    match key.code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Esc => {
            return if ctx.has_error {
                Action::DismissError
            } else {
                Action::Back
            };
        }
        KeyCode::Tab | KeyCode::BackTab => return Action::SwitchFocus,
        KeyCode::Char('t') => return Action::CycleTheme,
        KeyCode::Char('b') => return Action::ToggleSidebar,
        KeyCode::Char('r') => return Action::Refresh,
        KeyCode::Char('W') => return Action::ShowSubscriptions,
        KeyCode::Char('g') | KeyCode::Home if ctx.focus != Focus::Grid => return Action::Top,
        KeyCode::Char('G') | KeyCode::End if ctx.focus != Focus::Grid => return Action::Bottom,
        KeyCode::Up | KeyCode::Char('k') => return Action::MoveUp,
        KeyCode::Down | KeyCode::Char('j') => return Action::MoveDown,
        KeyCode::PageUp => return Action::PageUp,
        KeyCode::PageDown => return Action::PageDown,
        _ => {}
    }

    match ctx.focus {
        Focus::Sidebar => match key.code {
            KeyCode::Right | KeyCode::Char('l') => Action::Expand,
            KeyCode::Left | KeyCode::Char('h') => Action::Collapse,
            KeyCode::Enter => Action::Select,
            KeyCode::Char(' ') => Action::Toggle,
            KeyCode::Char('/') => Action::OpenSearch,
            KeyCode::Char('w') => Action::ToggleSubscription,
            _ => Action::None,
        },
        Focus::Grid => match key.code {
            KeyCode::Left | KeyCode::Char('h') => Action::MoveLeft,
            KeyCode::Right | KeyCode::Char('l') => Action::MoveRight,
            KeyCode::Char('g') => Action::Top,
            KeyCode::Char('G') => Action::Bottom,
            KeyCode::Char('0') | KeyCode::Home => Action::RowStart,
            KeyCode::Char('$') | KeyCode::End => Action::RowEnd,
            KeyCode::Char('z') => Action::CenterCursor,
            KeyCode::Enter => Action::Select,
            KeyCode::Char('/') => Action::EditTextFilter,
            KeyCode::Char('s') => Action::CycleStatusFilter,
            KeyCode::Char('f') => Action::ToggleFailuresOnly,
            KeyCode::Char('c') => Action::ClearFilters,
            KeyCode::Char('w') => Action::ToggleSubscription,
            _ => Action::None,
        },
        Focus::Subscriptions => match key.code {
            KeyCode::Enter => Action::Select,
            KeyCode::Char('x' | 'd') | KeyCode::Delete => Action::DeleteEntry,
            _ => Action::None,
        },
    }
}

fn map_text_input(key: KeyEvent, overlay: OverlayMode) -> Action {
    match key.code {
        KeyCode::Esc => Action::CloseOverlay,
        KeyCode::Enter => Action::OverlaySubmit,
        KeyCode::Backspace => Action::OverlayBackspace,
        KeyCode::Up if overlay == OverlayMode::Search => Action::MoveUp,
        KeyCode::Down if overlay == OverlayMode::Search => Action::MoveDown,
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => Action::OverlayInput(c),
        _ => Action::None,
    }
}

/// Lines scrolled per wheel notch.
pub const WHEEL_STEP: isize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Hover { x: u16, y: u16 },
    Click { x: u16, y: u16 },
    ScrollRows(isize),
    ScrollColumns(isize),
    None,
}

/// Shift+wheel scrolls builds sideways.
pub fn map_mouse(mouse: MouseEvent) -> MouseAction {
    let shift = mouse.modifiers.contains(KeyModifiers::SHIFT);
    match mouse.kind {
        MouseEventKind::Moved => MouseAction::Hover {
            x: mouse.column,
            y: mouse.row,
        },
        MouseEventKind::Down(MouseButton::Left) => MouseAction::Click {
            x: mouse.column,
            y: mouse.row,
        },
        MouseEventKind::ScrollDown if shift => MouseAction::ScrollColumns(WHEEL_STEP),
        MouseEventKind::ScrollUp if shift => MouseAction::ScrollColumns(-WHEEL_STEP),
        MouseEventKind::ScrollDown => MouseAction::ScrollRows(WHEEL_STEP),
        MouseEventKind::ScrollUp => MouseAction::ScrollRows(-WHEEL_STEP),
        MouseEventKind::ScrollRight => MouseAction::ScrollColumns(WHEEL_STEP),
        MouseEventKind::ScrollLeft => MouseAction::ScrollColumns(-WHEEL_STEP),
        _ => MouseAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        press_with(code, KeyModifiers::NONE)
    }

    fn press_with(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn ctx(focus: Focus) -> InputContext {
        InputContext {
            focus,
            ..Default::default()
        }
    }

    fn overlay(mode: OverlayMode) -> InputContext {
        InputContext {
            overlay: mode,
            ..Default::default()
        }
    }

    #[test]
    fn quit_and_ctrl_c() {
        assert_eq!(map_key(press(KeyCode::Char('q')), &ctx(Focus::Grid)), Action::Quit);
        assert_eq!(
            map_key(press_with(KeyCode::Char('c'), KeyModifiers::CONTROL), &overlay(OverlayMode::Search)),
            Action::Quit
        );
    }

    #[test]
    fn esc_dismisses_error_first() {
        let with_error = InputContext {
            has_error: true,
            ..Default::default()
        };
        assert_eq!(map_key(press(KeyCode::Esc), &with_error), Action::DismissError);
        assert_eq!(map_key(press(KeyCode::Esc), &ctx(Focus::Grid)), Action::Back);
    }

    #[test]
    fn release_is_ignored() {
        let key = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(map_key(key, &ctx(Focus::Sidebar)), Action::None);
    }

    #[test]
    fn grid_keys() {
        let grid = ctx(Focus::Grid);
        assert_eq!(map_key(press(KeyCode::Char('h')), &grid), Action::MoveLeft);
        assert_eq!(map_key(press(KeyCode::Char('l')), &grid), Action::MoveRight);
        assert_eq!(map_key(press(KeyCode::Char('G')), &grid), Action::Bottom);
        assert_eq!(map_key(press(KeyCode::Char('$')), &grid), Action::RowEnd);
        assert_eq!(map_key(press(KeyCode::Char('/')), &grid), Action::EditTextFilter);
        assert_eq!(map_key(press(KeyCode::Char('s')), &grid), Action::CycleStatusFilter);
        assert_eq!(map_key(press(KeyCode::Char('f')), &grid), Action::ToggleFailuresOnly);
        assert_eq!(map_key(press(KeyCode::Enter), &grid), Action::Select);
    }

    #[test]
    fn sidebar_keys() {
        let sidebar = ctx(Focus::Sidebar);
        assert_eq!(map_key(press(KeyCode::Char('l')), &sidebar), Action::Expand);
        assert_eq!(map_key(press(KeyCode::Char('h')), &sidebar), Action::Collapse);
        assert_eq!(map_key(press(KeyCode::Char('/')), &sidebar), Action::OpenSearch);
        assert_eq!(map_key(press(KeyCode::Char('g')), &sidebar), Action::Top);
        assert_eq!(map_key(press(KeyCode::Char('s')), &sidebar), Action::None);
    }

    #[test]
    fn global_keys() {
        let sidebar = ctx(Focus::Sidebar);
        assert_eq!(map_key(press(KeyCode::Char('t')), &sidebar), Action::CycleTheme);
        assert_eq!(map_key(press(KeyCode::Tab), &sidebar), Action::SwitchFocus);
        assert_eq!(map_key(press(KeyCode::Char('W')), &sidebar), Action::ShowSubscriptions);
        assert_eq!(
            map_key(press_with(KeyCode::Char('k'), KeyModifiers::CONTROL), &ctx(Focus::Grid)),
            Action::OpenSearch
        );
    }

    #[test]
    fn subscription_list_deletes() {
        let subs = ctx(Focus::Subscriptions);
        assert_eq!(map_key(press(KeyCode::Char('x')), &subs), Action::DeleteEntry);
        assert_eq!(map_key(press(KeyCode::Char('j')), &subs), Action::MoveDown);
    }

    #[test]
    fn text_overlays_capture_characters() {
        let search = overlay(OverlayMode::Search);
        assert_eq!(map_key(press(KeyCode::Char('q')), &search), Action::OverlayInput('q'));
        assert_eq!(map_key(press(KeyCode::Down), &search), Action::MoveDown);
        assert_eq!(map_key(press(KeyCode::Enter), &search), Action::OverlaySubmit);
        assert_eq!(map_key(press(KeyCode::Backspace), &search), Action::OverlayBackspace);
        let filter = overlay(OverlayMode::TextFilter);
        assert_eq!(map_key(press(KeyCode::Down), &filter), Action::None);
        assert_eq!(map_key(press(KeyCode::Esc), &filter), Action::CloseOverlay);
    }

    #[test]
    fn detail_overlay_keys() {
        let detail = overlay(OverlayMode::Detail);
        assert_eq!(map_key(press(KeyCode::Esc), &detail), Action::CloseOverlay);
        assert_eq!(map_key(press(KeyCode::Char('w')), &detail), Action::ToggleSubscription);
        assert_eq!(map_key(press(KeyCode::Char('j')), &detail), Action::None);
    }

    #[test]
    fn mouse_mapping() {
        let event = |kind, modifiers| MouseEvent {
            kind,
            column: 5,
            row: 7,
            modifiers,
        };
        assert_eq!(
            map_mouse(event(MouseEventKind::Moved, KeyModifiers::NONE)),
            MouseAction::Hover { x: 5, y: 7 }
        );
        assert_eq!(
            map_mouse(event(MouseEventKind::Down(MouseButton::Left), KeyModifiers::NONE)),
            MouseAction::Click { x: 5, y: 7 }
        );
        assert_eq!(
            map_mouse(event(MouseEventKind::ScrollDown, KeyModifiers::NONE)),
            MouseAction::ScrollRows(WHEEL_STEP)
        );
        assert_eq!(
            map_mouse(event(MouseEventKind::ScrollUp, KeyModifiers::SHIFT)),
            MouseAction::ScrollColumns(-WHEEL_STEP)
        );
    }
}
