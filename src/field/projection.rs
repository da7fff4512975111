use sha2::{Digest, Sha256};

use crate::config::SignalRange;

/// Stable azimuth for an identifier, in radians within `[0, 2π)`.
///
/// The full digest is reduced modulo 360 and mapped to whole degrees, so the
/// angle depends only on the identifier and never on the canvas.
pub fn angle_of(id: &str) -> f64 {
    let digest = Sha256::digest(id.as_bytes());
    let degrees = digest
        .iter()
        .fold(0u32, |acc, &byte| (acc * 256 + u32::from(byte)) % 360);
    f64::from(degrees).to_radians()
}

/// Radius in subpixels for a signal strength. Stronger is closer to the
/// centre; readings outside the range saturate at its ends.
pub fn radius_of(strength: f64, range: &SignalRange, max_radius: f64) -> f64 {
    let clamped = strength.clamp(range.far, range.near);
    let t = (range.near - clamped) / (range.near - range.far);
    let span = (max_radius - 6.0).max(0.0);
    2.0 + t * span
}
