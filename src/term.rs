use std::io::{self, Write};

use crossterm::{
    cursor, execute,
    style::ResetColor,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::warn;

use crate::config::DisplayMode;

/// Owns the terminal's visual mode for the life of the run.
///
/// Restoration happens once, either through `restore()` or on drop, which also
/// covers early returns and panics.
pub struct TermGuard<W: Write> {
    out: W,
    raw: bool,
    alternate: bool,
    restored: bool,
}

impl TermGuard<io::Stdout> {
    pub fn acquire(mode: DisplayMode) -> io::Result<Self> {
        Self::with_writer(io::stdout(), mode)
    }
}

impl<W: Write> TermGuard<W> {
    pub fn with_writer(mut out: W, mode: DisplayMode) -> io::Result<Self> {
        // Raw mode turns Ctrl+C into a key press, so interruption goes
        // through the normal shutdown path.
        let raw = match terminal::enable_raw_mode() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "raw mode unavailable; Ctrl+C will not restore the terminal");
                false
            }
        };
        let alternate = mode == DisplayMode::Tui;
        if alternate {
            execute!(out, EnterAlternateScreen)?;
        }
        execute!(out, cursor::Hide)?;
        Ok(Self {
            out,
            raw,
            alternate,
            restored: false,
        })
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        let _ = execute!(self.out, ResetColor, cursor::Show);
        if self.alternate {
            let _ = execute!(self.out, LeaveAlternateScreen);
        }
        if self.raw {
            let _ = terminal::disable_raw_mode();
        }
        let _ = self.out.flush();
    }
}

impl<W: Write> Drop for TermGuard<W> {
    fn drop(&mut self) {
        self.restore();
    }
}
