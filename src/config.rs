use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::ConfigError;

/// Signal strength window mapped onto the canvas radius.
/// `near` is the strongest reading (drawn at the centre), `far` the weakest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalRange {
    pub near: f64,
    pub far: f64,
}

impl Default for SignalRange {
    fn default() -> Self {
        Self { near: -30.0, far: -90.0 }
    }
}

/// Per-entity exponential smoothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothingConfig {
    pub strength_alpha: f64,
    pub motion_alpha: f64,
    /// Cap on |d(strength)/dt| (units per second) used for ink boost.
    pub rate_clamp: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            strength_alpha: 0.35,
            motion_alpha: 0.4,
            rate_clamp: 8.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepositConfig {
    /// Micro-deposits per observation before motion/rate boosts.
    pub base_samples: usize,
    pub samples_per_motion: f64,
    pub samples_per_rate: f64,
    /// Hard cap per observation (protects CPU on bursty input).
    pub max_samples: usize,
    pub jitter_arc_deg: f64,
    pub jitter_radius_frac: f64,
    /// Ray density; a ray of length L gets L * steps / 8 deposits.
    pub ray_steps_per_unit: f64,
    /// Random neighbour probes when looking for a less congested subpixel.
    pub splat_probes: usize,
    pub motion_weight: f64,
    pub rate_weight: f64,
    pub presence_weight: f64,
}

impl Default for DepositConfig {
    fn default() -> Self {
        Self {
            base_samples: 24,
            samples_per_motion: 10.0,
            samples_per_rate: 30.0,
            max_samples: 600,
            jitter_arc_deg: 22.0,
            jitter_radius_frac: 0.10,
            ray_steps_per_unit: 9.0,
            splat_probes: 4,
            motion_weight: 0.9,
            rate_weight: 0.1,
            presence_weight: 1.0,
        }
    }
}

/// Fast "trail" vs slow "map" memories.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayConfig {
    pub fast_per_sec: f64,
    pub slow_per_sec: f64,
    /// Fraction of ink that also feeds the slow layer.
    pub slow_gain: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            fast_per_sec: 0.88,
            slow_per_sec: 0.995,
            slow_gain: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub target_fps: f64,
    pub border: bool,
    pub header: bool,
    /// 256-colour indices, grey -> green -> yellow -> orange -> red.
    pub palette: Vec<u8>,
    pub glyph_threshold: f64,
    /// Scale to this percentile instead of the absolute max.
    pub eq_percentile: f64,
    pub min_cols: u16,
    pub min_rows: u16,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: 20.0,
            border: true,
            header: true,
            palette: vec![240, 71, 184, 208, 196],
            glyph_threshold: 0.12,
            eq_percentile: 0.95,
            min_cols: 120,
            min_rows: 40,
        }
    }
}

impl RenderConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps)
    }

    pub fn header_lines(&self) -> usize {
        if self.header {
            2
        } else {
            0
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DisplayMode {
    /// Raw escape-sequence frames written straight to stdout
    #[default]
    Ansi,
    /// Frames drawn through ratatui on the alternate screen
    Tui,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub signal: SignalRange,
    pub smoothing: SmoothingConfig,
    pub deposit: DepositConfig,
    pub decay: DecayConfig,
    pub render: RenderConfig,
    /// `None` keeps every entity ever seen.
    pub max_entities: Option<usize>,
    pub seed: Option<u64>,
    pub ignore_prefix: String,
    pub mode: DisplayMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signal: SignalRange::default(),
            smoothing: SmoothingConfig::default(),
            deposit: DepositConfig::default(),
            decay: DecayConfig::default(),
            render: RenderConfig::default(),
            max_entities: None,
            seed: None,
            ignore_prefix: "cnt".to_string(),
            mode: DisplayMode::Ansi,
        }
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fps = self.render.target_fps;
        if !(fps.is_finite() && fps > 0.0) || Duration::try_from_secs_f64(1.0 / fps).is_err() {
            return Err(ConfigError::FrameRate(fps));
        }
        if !(self.signal.near > self.signal.far) {
            return Err(ConfigError::SignalRange {
                near: self.signal.near,
                far: self.signal.far,
            });
        }
        if self.deposit.base_samples > self.deposit.max_samples {
            return Err(ConfigError::SampleCap {
                base: self.deposit.base_samples,
                cap: self.deposit.max_samples,
            });
        }
        if self.render.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        if !(self.smoothing.rate_clamp > 0.0) {
            return Err(ConfigError::RateClamp(self.smoothing.rate_clamp));
        }
        let gain = self.decay.slow_gain;
        if !(gain.is_finite() && gain >= 0.0) {
            return Err(ConfigError::SlowGain(gain));
        }
        if !self.render.glyph_threshold.is_finite() {
            return Err(ConfigError::GlyphThreshold(self.render.glyph_threshold));
        }
        unit_interval("equalization percentile", self.render.eq_percentile)?;
        unit_interval("fast decay", self.decay.fast_per_sec)?;
        unit_interval("slow decay", self.decay.slow_per_sec)?;
        unit_interval("strength alpha", self.smoothing.strength_alpha)?;
        unit_interval("motion alpha", self.smoothing.motion_alpha)?;
        Ok(())
    }
}

/// Paint per-packet Wi-Fi observations (`mac,rssi,motion` lines on stdin) as a
/// decaying polar heat map in the terminal.
#[derive(Parser, Debug)]
#[command(name = "wifi-room-mapper")]
#[command(author, version, about)]
pub struct Cli {
    /// Frames per second to aim for
    #[arg(long, default_value_t = 20.0)]
    pub fps: f64,

    /// Strongest signal (dBm), drawn at the centre
    #[arg(long, default_value_t = -30.0, allow_hyphen_values = true)]
    pub near: f64,

    /// Weakest signal (dBm), drawn at the rim
    #[arg(long, default_value_t = -90.0, allow_hyphen_values = true)]
    pub far: f64,

    /// Per-second retention of the fast (motion trail) layer
    #[arg(long, default_value_t = 0.88)]
    pub fast_decay: f64,

    /// Per-second retention of the slow (structure) layer
    #[arg(long, default_value_t = 0.995)]
    pub slow_decay: f64,

    /// Fraction of each deposit that feeds the slow layer
    #[arg(long, default_value_t = 0.25)]
    pub slow_gain: f64,

    /// Normalized intensity above which a braille dot is lit
    #[arg(long, default_value_t = 0.12)]
    pub threshold: f64,

    /// Brightness is scaled to this percentile of the canvas
    #[arg(long, default_value_t = 0.95)]
    pub percentile: f64,

    /// Hard cap on micro-deposits per observation
    #[arg(long, default_value_t = 600)]
    pub max_samples: usize,

    /// Comma-separated 256-colour palette, dim to bright
    #[arg(long, value_delimiter = ',', default_values_t = [240u8, 71, 184, 208, 196])]
    pub palette: Vec<u8>,

    /// Evict the least recently seen entity beyond this many
    #[arg(long)]
    pub max_entities: Option<usize>,

    /// Seed for the deposition jitter (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Lines starting with this prefix are ignored
    #[arg(long, default_value = "cnt")]
    pub ignore_prefix: String,

    /// Disable the frame border
    #[arg(long)]
    pub no_border: bool,

    /// Disable the two header lines
    #[arg(long)]
    pub no_header: bool,

    /// Output presentation
    #[arg(long, value_enum, default_value_t = DisplayMode::Ansi)]
    pub mode: DisplayMode,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let defaults = Config::default();
        let config = Config {
            signal: SignalRange {
                near: self.near,
                far: self.far,
            },
            deposit: DepositConfig {
                max_samples: self.max_samples,
                ..defaults.deposit
            },
            decay: DecayConfig {
                fast_per_sec: self.fast_decay,
                slow_per_sec: self.slow_decay,
                slow_gain: self.slow_gain,
            },
            render: RenderConfig {
                target_fps: self.fps,
                border: !self.no_border,
                header: !self.no_header,
                palette: self.palette,
                glyph_threshold: self.threshold,
                eq_percentile: self.percentile,
                ..defaults.render
            },
            max_entities: self.max_entities,
            seed: self.seed,
            ignore_prefix: self.ignore_prefix,
            mode: self.mode,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let cli = Cli::parse_from(["wifi-room-mapper"]);
        let config = cli.into_config().unwrap();
        let defaults = Config::default();
        assert_eq!(config.signal, defaults.signal);
        assert_eq!(config.decay, defaults.decay);
        assert_eq!(config.deposit, defaults.deposit);
        assert_eq!(config.render, defaults.render);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "wifi-room-mapper",
            "--fps",
            "10",
            "--near",
            "-20",
            "--far",
            "-80",
            "--palette",
            "1,2,3",
            "--no-border",
            "--mode",
            "tui",
            "--seed",
            "7",
        ]);
        let config = cli.into_config().unwrap();
        assert_eq!(config.render.target_fps, 10.0);
        assert_eq!(config.signal, SignalRange { near: -20.0, far: -80.0 });
        assert_eq!(config.render.palette, vec![1, 2, 3]);
        assert!(!config.render.border);
        assert_eq!(config.mode, DisplayMode::Tui);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let cli = Cli::parse_from(["wifi-room-mapper", "--near", "-90", "--far", "-30"]);
        assert!(matches!(
            cli.into_config(),
            Err(ConfigError::SignalRange { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config::default();
        config.render.target_fps = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::FrameRate(_))));

        let mut config = Config::default();
        config.deposit.max_samples = 10;
        assert!(matches!(config.validate(), Err(ConfigError::SampleCap { .. })));

        let mut config = Config::default();
        config.render.palette.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyPalette)));

        let mut config = Config::default();
        config.render.target_fps = 1e-320;
        assert!(matches!(config.validate(), Err(ConfigError::FrameRate(_))));

        let mut config = Config::default();
        config.decay.slow_gain = -0.25;
        assert!(matches!(config.validate(), Err(ConfigError::SlowGain(_))));

        let mut config = Config::default();
        config.render.glyph_threshold = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::GlyphThreshold(_))));

        let mut config = Config::default();
        config.decay.fast_per_sec = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange { .. })
        ));
    }

    #[test]
    fn test_cli_rejects_negative_slow_gain() {
        let cli = Cli::parse_from(["wifi-room-mapper", "--slow-gain=-1"]);
        assert!(matches!(cli.into_config(), Err(ConfigError::SlowGain(_))));
    }

    #[test]
    fn test_frame_interval() {
        let render = RenderConfig::default();
        assert!((render.frame_interval().as_secs_f64() - 0.05).abs() < 1e-6);
        assert_eq!(render.header_lines(), 2);
    }
}
