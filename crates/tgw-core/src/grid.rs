//! Two-axis grid composition: which rows and build columns to draw, and where.
//!
//! Rows scroll vertically, builds scroll horizontally, and the row-label column and
//! header row stay pinned. Coordinates in a [`GridFrame`] are relative to the grid's
//! top-left corner; cells in the overscan band may fall outside the visible area and
//! are clipped by the renderer.

use crate::model::{Cell, Header, Row};
use crate::result::{Category, ColorToken};
use crate::virtual_scroll::{Align, AxisConfig, VirtualAxis, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    pub cell_width: usize,
    pub row_height: usize,
    pub row_label_width: usize,
    pub header_height: usize,
    pub column_overscan: usize,
    pub row_overscan: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_width: 3,
            row_height: 1,
            row_label_width: 40,
            header_height: 1,
            column_overscan: 5,
            row_overscan: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellPos {
    /// Position in the filtered row list.
    pub row: usize,
    pub column: usize,
}

/// What the detail overlay shows for a clicked cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellDetail {
    pub row_name: String,
    /// Index into the unfiltered rows.
    pub row_index: usize,
    pub cell_index: usize,
    pub cell: Cell,
    pub header: Option<Header>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Corner,
    ColumnHeader(usize),
    RowLabel(usize),
    Cell(CellPos),
    Outside,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell<'a> {
    pub index: usize,
    pub x: i32,
    pub header: &'a Header,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCell<'a> {
    pub column: usize,
    pub x: i32,
    pub cell: &'a Cell,
    pub category: Category,
    pub color: ColorToken,
    pub column_highlighted: bool,
    pub at_cursor: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow<'a> {
    pub position: usize,
    pub source_index: usize,
    pub y: i32,
    pub name: &'a str,
    pub highlighted: bool,
    pub cells: Vec<RenderedCell<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridFrame<'a> {
    pub row_window: Window,
    pub column_window: Window,
    pub header_cells: Vec<HeaderCell<'a>>,
    pub rows: Vec<RenderedRow<'a>>,
}

#[derive(Debug, Clone)]
pub struct GridComposer {
    config: GridConfig,
    rows: VirtualAxis,
    columns: VirtualAxis,
    width: usize,
    height: usize,
    hovered_row: Option<usize>,
    hovered_column: Option<usize>,
    cursor: CellPos,
    selected: Option<CellDetail>,
}

impl GridComposer {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            rows: VirtualAxis::new(AxisConfig {
                item_size: config.row_height,
                overscan: config.row_overscan,
            }),
            columns: VirtualAxis::new(AxisConfig {
                item_size: config.cell_width,
                overscan: config.column_overscan,
            }),
            width: 0,
            height: 0,
            hovered_row: None,
            hovered_column: None,
            cursor: CellPos::default(),
            selected: None,
        }
    }

    pub fn config(&self) -> GridConfig {
        self.config
    }

    pub fn row_axis(&self) -> &VirtualAxis {
        &self.rows
    }

    pub fn column_axis(&self) -> &VirtualAxis {
        &self.columns
    }

    /// Full grid area including the pinned label column and header row.
    pub fn set_viewport(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.rows
            .set_container_size(height.saturating_sub(self.config.header_height));
        self.columns
            .set_container_size(width.saturating_sub(self.label_width()));
    }

    /// Filtered row count and header count. Clamps the cursor and drops stale hover state.
    pub fn set_dimensions(&mut self, row_count: usize, column_count: usize) {
        self.rows.set_item_count(row_count);
        self.columns.set_item_count(column_count);
        self.cursor.row = self.cursor.row.min(row_count.saturating_sub(1));
        self.cursor.column = self.cursor.column.min(column_count.saturating_sub(1));
        if self.hovered_row.is_some_and(|r| r >= row_count) {
            self.hovered_row = None;
        }
        if self.hovered_column.is_some_and(|c| c >= column_count) {
            self.hovered_column = None;
        }
    }

    /// The label column gives way to cells on narrow terminals.
    pub fn label_width(&self) -> usize {
        self.config.row_label_width.min(self.width / 2)
    }

    pub fn row_window(&self) -> Window {
        self.rows.window()
    }

    pub fn column_window(&self) -> Window {
        self.columns.window()
    }

    pub fn cursor(&self) -> CellPos {
        self.cursor
    }

    pub fn hovered_row(&self) -> Option<usize> {
        self.hovered_row
    }

    pub fn hovered_column(&self) -> Option<usize> {
        self.hovered_column
    }

    pub fn selected(&self) -> Option<&CellDetail> {
        self.selected.as_ref()
    }

    pub fn close_detail(&mut self) {
        self.selected = None;
    }

    pub fn scroll_rows(&mut self, delta: isize) {
        self.rows.scroll_by(delta * self.config.row_height.max(1) as isize);
    }

    pub fn scroll_columns(&mut self, delta: isize) {
        self.columns
            .scroll_by(delta * self.config.cell_width.max(1) as isize);
    }

    pub fn move_cursor(&mut self, rows: isize, columns: isize) {
        let row_max = self.rows.item_count().saturating_sub(1);
        let col_max = self.columns.item_count().saturating_sub(1);
        self.cursor.row = self.cursor.row.saturating_add_signed(rows).min(row_max);
        self.cursor.column = self
            .cursor
            .column
            .saturating_add_signed(columns)
            .min(col_max);
        self.rows.ensure_visible(self.cursor.row);
        self.columns.ensure_visible(self.cursor.column);
    }

    pub fn page_rows(&mut self, pages: isize) {
        let page = self.rows.visible_range().len().max(1) as isize;
        self.move_cursor(pages * page, 0);
    }

    pub fn cursor_to_first_row(&mut self) {
        self.cursor.row = 0;
        self.rows.scroll_to_index(0, Align::Start);
    }

    pub fn cursor_to_last_row(&mut self) {
        let last = self.rows.item_count().saturating_sub(1);
        self.cursor.row = last;
        self.rows.scroll_to_index(last, Align::End);
    }

    pub fn cursor_to_first_column(&mut self) {
        self.cursor.column = 0;
        self.columns.scroll_to_index(0, Align::Start);
    }

    pub fn cursor_to_last_column(&mut self) {
        let last = self.columns.item_count().saturating_sub(1);
        self.cursor.column = last;
        self.columns.scroll_to_index(last, Align::End);
    }

    pub fn center_on_cursor(&mut self) {
        self.rows.scroll_to_index(self.cursor.row, Align::Center);
        self.columns.scroll_to_index(self.cursor.column, Align::Center);
    }

    /// Rows shown on screen as a 1-based inclusive range, for the info bar.
    pub fn visible_rows(&self) -> Option<(usize, usize)> {
        let range = self.rows.visible_range();
        (!range.is_empty()).then(|| (range.start + 1, range.end))
    }

    pub fn hit_test(&self, x: usize, y: usize) -> HitTarget {
        if x >= self.width || y >= self.height {
            return HitTarget::Outside;
        }
        let label = self.label_width();
        let header = self.config.header_height;
        match (x < label, y < header) {
            (true, true) => HitTarget::Corner,
            (false, true) => self
                .columns
                .index_at(x - label)
                .map_or(HitTarget::Outside, HitTarget::ColumnHeader),
            (true, false) => self
                .rows
                .index_at(y - header)
                .map_or(HitTarget::Outside, HitTarget::RowLabel),
            (false, false) => {
                match (self.rows.index_at(y - header), self.columns.index_at(x - label)) {
                    (Some(row), Some(column)) => HitTarget::Cell(CellPos { row, column }),
                    _ => HitTarget::Outside,
                }
            }
        }
    }

    /// Row hover and column hover are separate fields, each cleared when the pointer
    /// leaves its region. A pointer over a cell or label highlights its row and leaves
    /// the headers, so the column hover clears. A pointer over a build header does the
    /// reverse.
    pub fn hover(&mut self, x: usize, y: usize) {
        match self.hit_test(x, y) {
            HitTarget::ColumnHeader(column) => {
                self.hovered_column = Some(column);
                self.hovered_row = None;
            }
            HitTarget::RowLabel(row) | HitTarget::Cell(CellPos { row, .. }) => {
                self.hovered_row = Some(row);
                self.hovered_column = None;
            }
            HitTarget::Corner | HitTarget::Outside => self.clear_hover(),
        }
    }

    pub fn clear_hover(&mut self) {
        self.hovered_row = None;
        self.hovered_column = None;
    }

    /// Moves the cursor to the clicked cell and opens its detail when it has a message.
    pub fn click(
        &mut self,
        x: usize,
        y: usize,
        headers: &[Header],
        rows: &[Row],
        order: &[usize],
    ) -> Option<&CellDetail> {
        let HitTarget::Cell(pos) = self.hit_test(x, y) else {
            return None;
        };
        self.cursor = pos;
        self.open_at(pos, headers, rows, order)
    }

    pub fn open_at_cursor(
        &mut self,
        headers: &[Header],
        rows: &[Row],
        order: &[usize],
    ) -> Option<&CellDetail> {
        self.open_at(self.cursor, headers, rows, order)
    }

    fn open_at(
        &mut self,
        pos: CellPos,
        headers: &[Header],
        rows: &[Row],
        order: &[usize],
    ) -> Option<&CellDetail> {
        let row_index = *order.get(pos.row)?;
        let row = rows.get(row_index)?;
        let cell = row.cells.get(pos.column)?;
        if !cell.is_interactive() {
            return None;
        }
        self.selected = Some(CellDetail {
            row_name: row.name.clone(),
            row_index,
            cell_index: pos.column,
            cell: cell.clone(),
            header: headers.get(pos.column).cloned(),
        });
        self.selected.as_ref()
    }

    /// Materialize the visible part of the grid. `order` maps filtered positions to
    /// indices in `rows`.
    pub fn compose<'a>(&self, headers: &'a [Header], rows: &'a [Row], order: &[usize]) -> GridFrame<'a> {
        let row_window = self.rows.window();
        let column_window = self.columns.window();
        let label = self.label_width() as i32;
        let header_height = self.config.header_height as i32;
        let column_scroll = self.columns.scroll_offset() as i32;
        let row_scroll = self.rows.scroll_offset() as i32;

        let header_cells = column_window
            .items()
            .filter_map(|item| {
                let header = headers.get(item.index)?;
                Some(HeaderCell {
                    index: item.index,
                    x: label + item.offset as i32 - column_scroll,
                    header,
                    highlighted: self.hovered_column == Some(item.index),
                })
            })
            .collect();

        let rendered_rows = row_window
            .items()
            .filter_map(|item| {
                let source_index = *order.get(item.index)?;
                let row = rows.get(source_index)?;
                let cells = column_window
                    .items()
                    .take_while(|col| col.index < row.cells.len())
                    .map(|col| {
                        let cell = &row.cells[col.index];
                        let category = cell.category();
                        RenderedCell {
                            column: col.index,
                            x: label + col.offset as i32 - column_scroll,
                            cell,
                            category,
                            color: crate::result::color_for(category),
                            column_highlighted: self.hovered_column == Some(col.index),
                            at_cursor: self.cursor
                                == (CellPos {
                                    row: item.index,
                                    column: col.index,
                                }),
                        }
                    })
                    .collect();
                Some(RenderedRow {
                    position: item.index,
                    source_index,
                    y: header_height + item.offset as i32 - row_scroll,
                    name: &row.name,
                    highlighted: self.hovered_row == Some(item.index),
                    cells,
                })
            })
            .collect();

        GridFrame {
            row_window,
            column_window,
            header_cells,
            rows: rendered_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result;

    fn header(build: &str) -> Header {
        Header {
            build: build.to_string(),
            started: None,
            extra: None,
        }
    }

    fn cell(code: u32, message: &str) -> Cell {
        Cell {
            result: Some(code),
            message: (!message.is_empty()).then(|| message.to_string()),
            icon: None,
        }
    }

    fn fixture(rows: usize, columns: usize) -> (Vec<Header>, Vec<Row>) {
        let headers = (0..columns).map(|i| header(&format!("b{i}"))).collect();
        let rows = (0..rows)
            .map(|r| Row {
                name: format!("test-{r}"),
                cells: (0..columns).map(|_| cell(result::PASS, "")).collect(),
            })
            .collect();
        (headers, rows)
    }

    fn composer(width: usize, height: usize, rows: usize, columns: usize) -> GridComposer {
        let mut grid = GridComposer::new(GridConfig {
            cell_width: 3,
            row_height: 1,
            row_label_width: 10,
            header_height: 1,
            column_overscan: 2,
            row_overscan: 3,
        });
        grid.set_viewport(width, height);
        grid.set_dimensions(rows, columns);
        grid
    }

    #[test]
    fn every_row_shares_the_column_window() {
        let (headers, rows) = fixture(50, 40);
        let order: Vec<usize> = (0..rows.len()).collect();
        let mut grid = composer(40, 11, rows.len(), headers.len());
        grid.scroll_columns(4);
        let frame = grid.compose(&headers, &rows, &order);
        let expected: Vec<usize> = frame.column_window.indices().collect();
        for row in &frame.rows {
            let cols: Vec<usize> = row.cells.iter().map(|c| c.column).collect();
            assert_eq!(cols, expected);
        }
        assert_eq!(frame.header_cells.len(), expected.len());
    }

    #[test]
    fn short_rows_omit_missing_cells() {
        let (headers, mut rows) = fixture(3, 10);
        rows[1].cells.truncate(4);
        let order = vec![0, 1, 2];
        let grid = composer(60, 10, 3, 10);
        let frame = grid.compose(&headers, &rows, &order);
        assert_eq!(frame.rows[0].cells.len(), 10);
        assert_eq!(frame.rows[1].cells.len(), 4);
        assert!(frame.rows[1].cells.iter().all(|c| c.column < 4));
    }

    #[test]
    fn labels_and_header_stay_pinned() {
        let (headers, rows) = fixture(100, 100);
        let order: Vec<usize> = (0..rows.len()).collect();
        let mut grid = composer(40, 11, 100, 100);
        grid.scroll_rows(20);
        grid.scroll_columns(20);
        let frame = grid.compose(&headers, &rows, &order);
        // The first row on screen sits directly under the header.
        let top = frame.rows.iter().find(|r| r.position == 20).unwrap();
        assert_eq!(top.y, 1);
        // The first visible build starts right after the label column.
        let first = frame.header_cells.iter().find(|h| h.index == 20).unwrap();
        assert_eq!(first.x, 10);
    }

    #[test]
    fn filtered_order_maps_to_source_rows() {
        let (headers, rows) = fixture(10, 5);
        let order = vec![7, 2];
        let grid = composer(40, 10, order.len(), headers.len());
        let frame = grid.compose(&headers, &rows, &order);
        let names: Vec<&str> = frame.rows.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["test-7", "test-2"]);
        assert_eq!(frame.rows[0].source_index, 7);
    }

    #[test]
    fn hover_clears_when_the_pointer_leaves_its_region() {
        let mut grid = composer(40, 11, 20, 20);
        grid.hover(12, 0);
        assert_eq!(grid.hovered_column(), Some(0));
        assert_eq!(grid.hovered_row(), None);
        grid.hover(2, 3);
        assert_eq!(grid.hovered_row(), Some(2));
        assert_eq!(grid.hovered_column(), None);
        grid.hover(12, 3);
        assert_eq!(grid.hovered_row(), Some(2));
        assert_eq!(grid.hovered_column(), None);
        grid.hover(0, 0);
        assert_eq!(grid.hovered_row(), None);
        assert_eq!(grid.hovered_column(), None);

        grid.hover(12, 0);
        grid.clear_hover();
        assert_eq!(grid.hovered_column(), None);
    }

    #[test]
    fn click_opens_detail_only_with_message() {
        let (headers, mut rows) = fixture(5, 5);
        rows[2].cells[1] = cell(result::FAIL, "assertion failed");
        let order: Vec<usize> = (0..rows.len()).collect();
        let mut grid = composer(40, 11, 5, 5);

        // Column 0, row 2: no message.
        assert!(grid.click(10, 3, &headers, &rows, &order).is_none());
        assert!(grid.selected().is_none());
        assert_eq!(grid.cursor(), CellPos { row: 2, column: 0 });

        let detail = grid.click(13, 3, &headers, &rows, &order).cloned().unwrap();
        assert_eq!(detail.row_name, "test-2");
        assert_eq!(detail.cell_index, 1);
        assert_eq!(detail.header.map(|h| h.build), Some("b1".to_string()));
        grid.close_detail();
        assert!(grid.selected().is_none());
    }

    #[test]
    fn click_beyond_short_row_is_noop() {
        let (headers, mut rows) = fixture(2, 6);
        rows[0].cells.truncate(1);
        let order = vec![0, 1];
        let mut grid = composer(40, 5, 2, 6);
        assert!(grid.click(19, 1, &headers, &rows, &order).is_none());
    }

    #[test]
    fn window_is_not_recomputed_without_input_changes() {
        let (headers, rows) = fixture(200, 50);
        let order: Vec<usize> = (0..rows.len()).collect();
        let mut grid = composer(40, 11, 200, 50);
        grid.compose(&headers, &rows, &order);
        let row_runs = grid.row_axis().computations();
        let col_runs = grid.column_axis().computations();

        grid.compose(&headers, &rows, &order);
        grid.hover(12, 4);
        grid.compose(&headers, &rows, &order);
        assert_eq!(grid.row_axis().computations(), row_runs);
        assert_eq!(grid.column_axis().computations(), col_runs);

        grid.scroll_columns(1);
        grid.compose(&headers, &rows, &order);
        assert_eq!(grid.row_axis().computations(), row_runs);
        assert_eq!(grid.column_axis().computations(), col_runs + 1);

        grid.set_dimensions(150, 50);
        grid.compose(&headers, &rows, &order);
        assert_eq!(grid.row_axis().computations(), row_runs + 1);
    }

    #[test]
    fn cursor_movement_keeps_cursor_visible() {
        let mut grid = composer(40, 11, 100, 100);
        grid.move_cursor(25, 0);
        assert_eq!(grid.cursor().row, 25);
        assert!(grid.row_axis().visible_range().contains(&25));
        grid.move_cursor(1000, 1000);
        assert_eq!(grid.cursor(), CellPos { row: 99, column: 99 });
        grid.cursor_to_first_row();
        grid.cursor_to_first_column();
        assert_eq!(grid.cursor(), CellPos::default());
        assert_eq!(grid.visible_rows(), Some((1, 10)));
    }

    #[test]
    fn shrinking_rows_clamps_cursor() {
        let mut grid = composer(40, 11, 100, 10);
        grid.move_cursor(80, 0);
        grid.set_dimensions(5, 10);
        assert_eq!(grid.cursor().row, 4);
        grid.set_dimensions(0, 0);
        assert_eq!(grid.cursor(), CellPos::default());
        assert_eq!(grid.visible_rows(), None);
    }
}
