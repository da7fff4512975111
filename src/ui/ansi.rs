//! Escape-sequence frame written straight to stdout.

use std::fmt::Write;

use crossterm::cursor::MoveTo;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use ratatui::symbols::line;

use super::{header_lines, HeatFrame};
use crate::config::Config;

/// Rows end with CR+LF so the frame lays out correctly in raw mode too.
pub const LINE_END: &str = "\r\n";

fn border_row(out: &mut String, cols: usize, left: &str, right: &str) {
    out.push_str(left);
    out.push_str(&line::HORIZONTAL.repeat(cols));
    out.push_str(right);
    out.push_str(LINE_END);
}

/// Compose a full frame: home/clear, header, optional border, one line per
/// cell row with a colour escape before every visible glyph.
pub fn compose(frame: &HeatFrame, config: &Config, stamp: &str) -> String {
    let render = &config.render;
    // colour escape + glyph is at most ~15 bytes per cell
    let mut out = String::with_capacity((frame.cols() * 16 + 8) * (frame.rows() + 4));

    let _ = write!(out, "{}{}", MoveTo(0, 0), Clear(ClearType::FromCursorDown));
    if render.header {
        for line in header_lines(config, stamp) {
            out.push_str(&line);
            out.push_str(LINE_END);
        }
    }
    if render.border {
        border_row(&mut out, frame.cols(), line::TOP_LEFT, line::TOP_RIGHT);
    }

    for row in frame.row_cells() {
        if render.border {
            out.push_str(line::VERTICAL);
        }
        for cell in row {
            if !cell.visible {
                out.push(' ');
                continue;
            }
            let _ = write!(out, "{}", SetForegroundColor(Color::AnsiValue(cell.color)));
            out.push(cell.glyph());
        }
        let _ = write!(out, "{}", ResetColor);
        if render.border {
            out.push_str(line::VERTICAL);
        }
        out.push_str(LINE_END);
    }

    if render.border {
        border_row(&mut out, frame.cols(), line::BOTTOM_LEFT, line::BOTTOM_RIGHT);
    }
    out
}
