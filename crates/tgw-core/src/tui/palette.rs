//! Concrete terminal colors for the light and dark themes.

use crate::prefs::ResolvedTheme;
use crate::result::ColorToken;
use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub fg: Color,
    pub muted: Color,
    pub accent: Color,
    pub border: Color,
    pub overlay_bg: Color,
    pub cursor_bg: Color,
    pub hover_bg: Color,
    pub warning: Color,
    pub error: Color,
    tokens: [Color; 8],
}

const DARK: Palette = Palette {
    fg: Color::White,
    muted: Color::DarkGray,
    accent: Color::Cyan,
    border: Color::DarkGray,
    overlay_bg: Color::Black,
    cursor_bg: Color::Rgb(70, 70, 90),
    hover_bg: Color::Rgb(40, 40, 52),
    warning: Color::Yellow,
    error: Color::Red,
    tokens: [
        Color::Rgb(34, 197, 94),
        Color::Rgb(239, 68, 68),
        Color::Rgb(249, 115, 22),
        Color::Rgb(234, 179, 8),
        Color::Rgb(59, 130, 246),
        Color::Rgb(168, 85, 247),
        Color::Rgb(100, 116, 139),
        Color::Rgb(75, 85, 99),
    ],
};

const LIGHT: Palette = Palette {
    fg: Color::Black,
    muted: Color::Gray,
    accent: Color::Blue,
    border: Color::Gray,
    overlay_bg: Color::White,
    cursor_bg: Color::Rgb(200, 210, 235),
    hover_bg: Color::Rgb(228, 232, 242),
    warning: Color::Rgb(161, 98, 7),
    error: Color::Rgb(185, 28, 28),
    tokens: [
        Color::Rgb(22, 163, 74),
        Color::Rgb(220, 38, 38),
        Color::Rgb(234, 88, 12),
        Color::Rgb(202, 138, 4),
        Color::Rgb(37, 99, 235),
        Color::Rgb(147, 51, 234),
        Color::Rgb(71, 85, 105),
        Color::Rgb(209, 213, 219),
    ],
};

impl Palette {
    pub fn for_theme(theme: ResolvedTheme) -> Self {
        match theme {
            ResolvedTheme::Dark => DARK,
            ResolvedTheme::Light => LIGHT,
        }
    }

    pub fn token(&self, token: ColorToken) -> Color {
        let idx = match token {
            ColorToken::Green => 0,
            ColorToken::Red => 1,
            ColorToken::Orange => 2,
            ColorToken::Yellow => 3,
            ColorToken::Blue => 4,
            ColorToken::Purple => 5,
            ColorToken::Slate => 6,
            ColorToken::Gray => 7,
        };
        self.tokens[idx]
    }

    pub fn text(&self) -> Style {
        Style::default().fg(self.fg)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn key(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn status(&self, token: ColorToken) -> Style {
        Style::default().fg(self.token(token))
    }
}
