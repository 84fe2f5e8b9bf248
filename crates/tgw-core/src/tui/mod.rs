pub mod detail_overlay;
pub mod footer;
pub mod grid;
pub mod header;
pub mod palette;
pub mod render;
pub mod search_overlay;
pub mod sidebar;
pub mod spinner;
pub mod subscriptions;

use ratatui::layout::Rect;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Cut `s` to at most `max` display columns, marking the cut with `…`.
pub fn truncate(s: &str, max: usize) -> String {
    if UnicodeWidthStr::width(s) <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut result = String::new();
    let mut width = 0;
    for c in s.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw + 1 > max {
            break;
        }
        result.push(c);
        width += cw;
    }
    result.push('…');
    result
}

/// A box of at most `width` × `height` centered in `area`.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_exact_fit() {
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("hello world", 6), "hello…");
    }

    #[test]
    fn truncate_zero_width() {
        assert_eq!(truncate("hello", 0), "");
    }

    #[test]
    fn truncate_counts_wide_chars() {
        let out = truncate("日本語テキスト", 5);
        assert!(UnicodeWidthStr::width(out.as_str()) <= 5);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn centered_fits_inside() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(centered(area, 60, 10), Rect::new(20, 15, 60, 10));
        assert_eq!(centered(Rect::new(0, 0, 10, 5), 60, 10), Rect::new(0, 0, 10, 5));
    }
}
