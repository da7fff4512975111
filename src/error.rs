use std::io;

/// Top-level failures. None of these occur in normal operation; input
/// problems are skipped record by record instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("target frame rate must be positive with a representable frame interval, got {0}")]
    FrameRate(f64),
    #[error("near ({near}) must be a stronger signal than far ({far})")]
    SignalRange { near: f64, far: f64 },
    #[error("base sample count {base} exceeds the hard cap {cap}")]
    SampleCap { base: usize, cap: usize },
    #[error("colour palette is empty")]
    EmptyPalette,
    #[error("rate-of-change clamp must be positive, got {0}")]
    RateClamp(f64),
    #[error("slow layer gain must be finite and non-negative, got {0}")]
    SlowGain(f64),
    #[error("glyph threshold must be finite, got {0}")]
    GlyphThreshold(f64),
    #[error("{name} must lie in (0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
}

/// Why an input line did not become an observation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("blank line")]
    Blank,
    #[error("ignorable line")]
    Ignored,
    #[error("expected 3 fields, found {0}")]
    MissingFields(usize),
    #[error("{field} is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("{field} is not finite")]
    NonFinite { field: &'static str },
}
