pub mod ansi;
pub mod heat;
pub mod tui;

pub use heat::HeatFrame;

use crate::config::Config;

/// Timestamp format used in the header.
pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The two header lines: title with timestamp, range and rate, then a legend.
pub fn header_lines(config: &Config, stamp: &str) -> [String; 2] {
    [
        format!(
            " Wi-Fi Room Mapper | {}   near~{} dBm  far~{} dBm    fps~{}",
            stamp,
            config.signal.near as i64,
            config.signal.far as i64,
            config.render.target_fps as i64,
        ),
        " Fast = motion (bright),  Slow = persistent structure (dim). Ray-painted paths; density adaptively scaled."
            .to_string(),
    ]
}
