use ratatui::symbols::braille;

use crate::config::RenderConfig;
use crate::field::viewport::{SUB_X, SUB_Y};
use crate::field::Canvas;

/// Below this the percentile is treated as "no activity".
const MIN_SCALE: f64 = 1e-9;

/// One character cell of a rendered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeatCell {
    /// Braille dot mask, bit layout as in the Unicode block.
    pub mask: u8,
    /// 256-colour palette index.
    pub color: u8,
    /// Outside the active circle cells are always blank.
    pub visible: bool,
}

impl HeatCell {
    pub fn glyph(&self) -> char {
        if !self.visible || self.mask == 0 {
            return ' ';
        }
        char::from_u32(u32::from(braille::BLANK) + u32::from(self.mask)).unwrap_or(' ')
    }
}

/// Dot bit for subpixel `(sx, sy)` of a cell: left column top-to-bottom, then
/// right column.
pub fn dot_bit(sx: usize, sy: usize) -> u8 {
    if sx < SUB_X && sy < SUB_Y {
        braille::DOTS[sy][sx] as u8
    } else {
        0
    }
}

/// Brightness divisor: the value at `percentile` of all subpixels, so one very
/// bright entity does not wash out the rest.
pub fn equalization_scale(values: &[f64], percentile: f64) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    let mut sorted = values.to_vec();
    let n = sorted.len();
    let idx = ((percentile * n as f64) as usize).saturating_sub(1).min(n - 1);
    let (_, q, _) = sorted.select_nth_unstable_by(idx, f64::total_cmp);
    let q = *q;
    if q > MIN_SCALE {
        return q;
    }
    let max = values.iter().copied().fold(0.0, f64::max);
    max.max(1.0)
}

/// Palette entry for a normalized intensity, snapping to the nearer of the
/// two bracketing stops.
pub fn palette_color(palette: &[u8], u: f64) -> u8 {
    let (Some(&first), Some(&last)) = (palette.first(), palette.last()) else {
        return 0;
    };
    if !(u > 0.0) {
        return first;
    }
    if u >= 1.0 {
        return last;
    }
    let segs = palette.len() - 1;
    let x = u * segs as f64;
    let i = (x as usize).min(segs);
    let t = x - i as f64;
    if t > 0.5 {
        palette[(i + 1).min(segs)]
    } else {
        palette[i]
    }
}

/// A rendered frame, independent of how it is presented.
#[derive(Clone, Debug)]
pub struct HeatFrame {
    cols: usize,
    rows: usize,
    cells: Vec<HeatCell>,
    scale: f64,
    peak: f64,
    peak_level: f64,
}

impl HeatFrame {
    pub fn from_canvas(canvas: &Canvas, render: &RenderConfig) -> Self {
        let merged = canvas.merged();
        let scale = equalization_scale(merged.values(), render.eq_percentile);
        let peak = merged.values().iter().copied().fold(0.0, f64::max);
        let cols = canvas.cell_cols();
        let rows = canvas.cell_rows();
        let blank = HeatCell {
            mask: 0,
            color: palette_color(&render.palette, 0.0),
            visible: false,
        };

        let mut cells = vec![blank; cols * rows];
        let mut peak_level: f64 = 0.0;
        for row in 0..rows {
            for col in 0..cols {
                if !canvas.cell_visible(col, row) {
                    continue;
                }
                let mut mask = 0u8;
                let mut total = 0.0;
                for sy in 0..SUB_Y {
                    for sx in 0..SUB_X {
                        let ink = merged.get(col * SUB_X + sx, row * SUB_Y + sy).unwrap_or(0.0);
                        let v = (ink / scale).min(1.0);
                        total += v;
                        if v > render.glyph_threshold {
                            mask |= dot_bit(sx, sy);
                        }
                    }
                }
                let level = (total / (SUB_X * SUB_Y) as f64).clamp(0.0, 1.0);
                peak_level = peak_level.max(level);
                cells[row * cols + col] = HeatCell {
                    mask,
                    color: palette_color(&render.palette, level),
                    visible: true,
                };
            }
        }

        Self {
            cols,
            rows,
            cells,
            scale,
            peak,
            peak_level,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell(&self, col: usize, row: usize) -> Option<HeatCell> {
        if col < self.cols && row < self.rows {
            Some(self.cells[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row_cells(&self) -> impl Iterator<Item = &[HeatCell]> {
        self.cells.chunks(self.cols.max(1))
    }

    /// Divisor used for this frame.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Largest raw `fast + slow` value on the canvas.
    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Brightest cell's average normalized intensity.
    pub fn peak_level(&self) -> f64 {
        self.peak_level
    }

    pub fn lit_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.visible && c.mask != 0).count()
    }
}
