//! One-dimensional windowing over a uniformly sized list.
//!
//! The grid runs two independent [`VirtualAxis`] instances, one for rows and one
//! for build columns. All sizes and offsets are in terminal cells.

use std::cell::Cell;
use std::ops::Range;

/// Contiguous slice of items to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: usize,
    /// Exclusive; equal to `start` when the list is empty.
    end: usize,
    item_size: usize,
    total_size: usize,
}

impl Window {
    const EMPTY: Self = Self {
        start: 0,
        end: 0,
        item_size: 1,
        total_size: 0,
    };

    pub fn start_index(&self) -> usize {
        self.start
    }

    /// Last materialized index, `None` when the list is empty.
    pub fn end_index(&self) -> Option<usize> {
        (self.end > self.start).then(|| self.end - 1)
    }

    pub fn offset_of_start(&self) -> usize {
        self.start * self.item_size
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices().contains(&index)
    }

    pub fn items(&self) -> impl Iterator<Item = VirtualItem> + '_ {
        self.indices().map(move |index| VirtualItem {
            index,
            offset: index * self.item_size,
            size: self.item_size,
        })
    }
}

/// Materialized item with its absolute offset from the start of the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualItem {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
}

/// Index window covering `[scroll_offset, scroll_offset + container_size]`, padded by
/// `overscan` items on each side and clamped to the list bounds.
pub fn compute_window(
    item_count: usize,
    item_size: usize,
    container_size: usize,
    scroll_offset: usize,
    overscan: usize,
) -> Window {
    if item_count == 0 {
        return Window::EMPTY;
    }
    let size = item_size.max(1);
    let last = item_count - 1;
    let end = (scroll_offset + container_size)
        .div_ceil(size)
        .saturating_add(overscan)
        .min(last);
    let start = (scroll_offset / size).saturating_sub(overscan).min(end);
    Window {
        start,
        end: end + 1,
        item_size: size,
        total_size: item_count * size,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
}

/// Scroll offset that puts `index` at the aligned edge of the viewport, clamped to
/// `[0, total_size - container_size]`.
pub fn scroll_to_index(
    index: usize,
    align: Align,
    item_count: usize,
    item_size: usize,
    container_size: usize,
) -> usize {
    let size = item_size.max(1) as i64;
    let container = container_size as i64;
    let offset = index as i64 * size;
    let target = match align {
        Align::Start => offset,
        Align::Center => offset - (container - size) / 2,
        Align::End => offset - container + size,
    };
    let max = (item_count as i64 * size - container).max(0);
    target.clamp(0, max) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisConfig {
    pub item_size: usize,
    pub overscan: usize,
}

type WindowKey = (usize, usize, usize, usize, usize);

/// Scroll state for one axis with a memoized window.
///
/// The window is recomputed only when item count, container size, scroll offset or
/// the axis config change.
#[derive(Debug, Clone)]
pub struct VirtualAxis {
    config: AxisConfig,
    item_count: usize,
    container_size: usize,
    scroll_offset: usize,
    memo: Cell<Option<(WindowKey, Window)>>,
    computations: Cell<u64>,
}

impl VirtualAxis {
    pub fn new(config: AxisConfig) -> Self {
        Self {
            config,
            item_count: 0,
            container_size: 0,
            scroll_offset: 0,
            memo: Cell::new(None),
            computations: Cell::new(0),
        }
    }

    pub fn config(&self) -> AxisConfig {
        self.config
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn container_size(&self) -> usize {
        self.container_size
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn item_size(&self) -> usize {
        self.config.item_size.max(1)
    }

    pub fn total_size(&self) -> usize {
        self.item_count * self.item_size()
    }

    pub fn max_scroll(&self) -> usize {
        self.total_size().saturating_sub(self.container_size)
    }

    /// How often the window has actually been recomputed.
    pub fn computations(&self) -> u64 {
        self.computations.get()
    }

    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;
        self.clamp_scroll();
    }

    pub fn set_container_size(&mut self, size: usize) {
        self.container_size = size;
        self.clamp_scroll();
    }

    pub fn set_scroll_offset(&mut self, offset: usize) {
        self.scroll_offset = offset.min(self.max_scroll());
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let next = self.scroll_offset.saturating_add_signed(delta);
        self.set_scroll_offset(next);
    }

    pub fn scroll_to_index(&mut self, index: usize, align: Align) {
        self.scroll_offset = scroll_to_index(
            index,
            align,
            self.item_count,
            self.item_size(),
            self.container_size,
        );
    }

    /// Scroll the minimum distance that brings `index` fully into view.
    pub fn ensure_visible(&mut self, index: usize) {
        let size = self.item_size();
        let top = index * size;
        let bottom = top + size;
        if top < self.scroll_offset {
            self.set_scroll_offset(top);
        } else if bottom > self.scroll_offset + self.container_size {
            self.set_scroll_offset(bottom.saturating_sub(self.container_size));
        }
    }

    pub fn window(&self) -> Window {
        let key = (
            self.item_count,
            self.item_size(),
            self.container_size,
            self.scroll_offset,
            self.config.overscan,
        );
        if let Some((cached_key, window)) = self.memo.get() {
            if cached_key == key {
                return window;
            }
        }
        let window = compute_window(key.0, key.1, key.2, key.3, key.4);
        self.memo.set(Some((key, window)));
        self.computations.set(self.computations.get() + 1);
        window
    }

    /// Items at least partially inside the viewport, without overscan.
    pub fn visible_range(&self) -> Range<usize> {
        let size = self.item_size();
        let end = (self.scroll_offset + self.container_size)
            .div_ceil(size)
            .min(self.item_count);
        let start = (self.scroll_offset / size).min(end);
        start..end
    }

    /// Item under a viewport-relative position.
    pub fn index_at(&self, position: usize) -> Option<usize> {
        if position >= self.container_size {
            return None;
        }
        let index = (self.scroll_offset + position) / self.item_size();
        (index < self.item_count).then_some(index)
    }

    fn clamp_scroll(&mut self) {
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }
}
