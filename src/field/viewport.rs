use crate::config::RenderConfig;

/// Braille packs 2x4 subpixels into one character cell.
pub const SUB_X: usize = 2;
pub const SUB_Y: usize = 4;

/// Character-cell layout of a frame for a given terminal size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    /// Terminal size after the minimum floor is applied.
    pub cols: usize,
    pub rows: usize,
    /// Cells available to the canvas.
    pub cell_cols: usize,
    pub cell_rows: usize,
    pub left: usize,
    pub top: usize,
}

impl Viewport {
    pub fn new(cols: u16, rows: u16, render: &RenderConfig) -> Self {
        let cols = usize::from(cols.max(render.min_cols));
        let rows = usize::from(rows.max(render.min_rows));
        let border = usize::from(render.border);
        let left = border;
        let right = border;
        let top = render.header_lines() + border;
        let bottom = border;
        Self {
            cols,
            rows,
            cell_cols: cols.saturating_sub(left + right),
            cell_rows: rows.saturating_sub(top + bottom),
            left,
            top,
        }
    }

    pub fn sub_width(&self) -> usize {
        self.cell_cols * SUB_X
    }

    pub fn sub_height(&self) -> usize {
        self.cell_rows * SUB_Y
    }
}
