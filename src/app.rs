use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::field::projection::{angle_of, radius_of};
use crate::field::{Canvas, Conditioner, Viewport};
use crate::input::{parse_record, Observation};
use crate::ui::{self, HeatFrame};

/// Caps output to the target frame rate.
pub struct FramePacer {
    interval: Duration,
    last: Option<Instant>,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// True (and the frame counts as emitted) when a full interval has passed
    /// since the last emitted frame.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub observations: u64,
    pub skipped: u64,
    pub frames: u64,
    pub resets: u64,
}

pub struct App {
    pub should_quit: bool,
    config: Config,
    viewport: Viewport,
    canvas: Canvas,
    conditioner: Conditioner,
    rng: StdRng,
    pacer: FramePacer,
    stats: Stats,
}

impl App {
    pub fn new(config: Config, size: (u16, u16), now: Instant) -> Self {
        let viewport = Viewport::new(size.0, size.1, &config.render);
        let canvas = Canvas::new(&viewport, config.decay, config.deposit, now);
        let conditioner = Conditioner::new(config.smoothing, config.deposit, config.max_entities);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let pacer = FramePacer::new(config.render.frame_interval());
        Self {
            should_quit: false,
            config,
            viewport,
            canvas,
            conditioner,
            rng,
            pacer,
            stats: Stats::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn conditioner(&self) -> &Conditioner {
        &self.conditioner
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Deposit a record if it parses; malformed lines are skipped.
    pub fn on_line(&mut self, line: &str, now: Instant) {
        match parse_record(line, &self.config.ignore_prefix) {
            Ok(obs) => self.ingest(&obs, now),
            Err(reason) => {
                self.stats.skipped += 1;
                debug!(%reason, line = line.trim_end(), "skipping record");
            }
        }
    }

    pub fn ingest(&mut self, obs: &Observation, now: Instant) {
        let conditioned = self.conditioner.observe(&obs.id, obs.strength, obs.motion, now);
        let theta = angle_of(&obs.id);
        let r_pix = radius_of(conditioned.strength, &self.config.signal, self.canvas.radius());
        self.canvas.deposit(theta, r_pix, &conditioned, &mut self.rng);
        self.stats.observations += 1;
        trace!(
            entity = %obs.id,
            radius = r_pix,
            samples = conditioned.samples,
            motion = conditioned.motion_unit,
            rate = conditioned.rate_unit,
            ink = conditioned.total_ink(),
            "deposited"
        );
    }

    /// Rebuild the canvas for a new terminal size. Accumulated ink is lost;
    /// per-entity smoothing survives.
    pub fn on_resize(&mut self, cols: u16, rows: u16, now: Instant) {
        self.viewport = Viewport::new(cols, rows, &self.config.render);
        self.canvas = Canvas::new(&self.viewport, self.config.decay, self.config.deposit, now);
        self.stats.resets += 1;
        info!(
            cols = self.viewport.cols,
            rows = self.viewport.rows,
            "terminal resized, canvas reset"
        );
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        // Ctrl+C always quits
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }

    /// Attempt a draw: decay always, then report whether a frame is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.canvas.decay(now);
        if self.pacer.due(now) {
            self.stats.frames += 1;
            true
        } else {
            false
        }
    }

    pub fn frame(&self) -> HeatFrame {
        HeatFrame::from_canvas(&self.canvas, &self.config.render)
    }

    pub fn compose(&self, stamp: &str) -> String {
        ui::ansi::compose(&self.frame(), &self.config, stamp)
    }
}
