mod app;
mod config;
mod error;
mod event;
mod field;
mod input;
mod logging;
mod term;
mod ui;

use std::io::{self, Write};
use std::time::Instant;

use clap::Parser;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, trace};

use app::App;
use config::{Cli, Config, DisplayMode};
use error::Error;
use event::{Event, EventHandler};
use term::TermGuard;
use ui::HeatFrame;

/// Used when the terminal size cannot be queried (e.g. stdout is a pipe).
const FALLBACK_SIZE: (u16, u16) = (180, 56);

fn stamp() -> String {
    chrono::Local::now().format(ui::STAMP_FORMAT).to_string()
}

/// Pump events until the input ends or the user quits, handing each due frame
/// to `present`.
fn run_loop<F>(app: &mut App, events: &EventHandler, mut present: F) -> Result<(), Error>
where
    F: FnMut(&App, &HeatFrame) -> io::Result<()>,
{
    loop {
        let event = events.next();
        let now = Instant::now();
        match event {
            Event::Line(line) => app.on_line(&line, now),
            Event::Tick => {}
            Event::Key(key) => app.on_key(key),
            Event::Resize(cols, rows) => app.on_resize(cols, rows, now),
            Event::InputClosed => {
                info!("input closed");
                app.should_quit = true;
            }
        }

        if app.should_quit {
            return Ok(());
        }

        if app.tick(now) {
            let heat = app.frame();
            present(app, &heat)?;
            trace!(
                frames = app.stats().frames,
                scale = heat.scale(),
                peak = heat.peak(),
                lit = heat.lit_cells(),
                "frame emitted"
            );
        }
    }
}

fn run(config: Config) -> Result<(), Error> {
    let size = terminal::size().unwrap_or(FALLBACK_SIZE);
    let mode = config.mode;
    let mut app = App::new(config, size, Instant::now());
    let viewport = app.viewport();
    info!(
        cols = viewport.cols,
        rows = viewport.rows,
        radius = app.canvas().radius(),
        mode = ?mode,
        "starting"
    );
    let events = EventHandler::new(app.config().render.frame_interval());

    let mut guard = TermGuard::acquire(mode)?;
    let result = match mode {
        DisplayMode::Ansi => run_loop(&mut app, &events, |app, heat| {
            let text = ui::ansi::compose(heat, app.config(), &stamp());
            let out = guard.writer();
            out.write_all(text.as_bytes())?;
            out.flush()
        }),
        DisplayMode::Tui => {
            let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
            terminal.clear()?;
            run_loop(&mut app, &events, |app, heat| {
                let stamp = stamp();
                terminal
                    .draw(|frame| ui::tui::render(frame, heat, app.config(), &stamp))
                    .map(|_| ())
            })
        }
    };
    guard.restore();

    let stats = app.stats();
    info!(
        observations = stats.observations,
        skipped = stats.skipped,
        frames = stats.frames,
        resets = stats.resets,
        entities = app.conditioner().len(),
        "shutting down"
    );
    result
}

fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    let log_file = cli.log_file.take();
    logging::init(log_file.as_deref())?;

    let config = cli.into_config()?;
    run(config)?;
    Ok(())
}
