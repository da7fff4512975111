use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{DepositConfig, SmoothingConfig};

/// Shortest interval used when estimating the rate of change.
const MIN_ELAPSED: Duration = Duration::from_millis(1);

#[derive(Clone, Debug)]
pub struct EntityState {
    pub strength: f64,
    pub motion: f64,
    pub last_seen: Instant,
    pub last_strength: f64,
}

/// What one observation contributes to the canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Conditioned {
    /// Smoothed strength, used for the radius.
    pub strength: f64,
    pub motion_unit: f64,
    pub rate_unit: f64,
    /// Micro-deposits `k`.
    pub samples: usize,
    pub ink_per_sample: f64,
}

impl Conditioned {
    /// Ink carried by all micro-deposits together; does not grow with `k`.
    pub fn total_ink(&self) -> f64 {
        self.samples as f64 * self.ink_per_sample
    }
}

/// `k = base + round(spm * motion) + round(spr * rate)`, capped.
pub fn sample_count(deposit: &DepositConfig, motion_unit: f64, rate_unit: f64) -> usize {
    // `as usize` saturates: negatives and NaN become 0, huge values usize::MAX
    let from_motion = (deposit.samples_per_motion * motion_unit).round() as usize;
    let from_rate = (deposit.samples_per_rate * rate_unit).round() as usize;
    deposit
        .base_samples
        .saturating_add(from_motion)
        .saturating_add(from_rate)
        .min(deposit.max_samples)
}

/// Per-entity smoothing and rate-of-change estimation.
pub struct Conditioner {
    smoothing: SmoothingConfig,
    deposit: DepositConfig,
    max_entities: Option<usize>,
    entities: HashMap<String, EntityState>,
}

impl Conditioner {
    pub fn new(smoothing: SmoothingConfig, deposit: DepositConfig, max_entities: Option<usize>) -> Self {
        Self {
            smoothing,
            deposit,
            max_entities,
            entities: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn entity(&self, id: &str) -> Option<&EntityState> {
        self.entities.get(id)
    }

    pub fn observe(&mut self, id: &str, strength: f64, motion: f64, now: Instant) -> Conditioned {
        let SmoothingConfig {
            strength_alpha,
            motion_alpha,
            rate_clamp,
        } = self.smoothing;

        let rate = match self.entities.get_mut(id) {
            Some(state) => {
                state.strength = strength_alpha * strength + (1.0 - strength_alpha) * state.strength;
                state.motion = motion_alpha * motion + (1.0 - motion_alpha) * state.motion;
                let elapsed = now.saturating_duration_since(state.last_seen).max(MIN_ELAPSED);
                let rate = (strength - state.last_strength) / elapsed.as_secs_f64();
                state.last_seen = now;
                state.last_strength = strength;
                rate
            }
            None => {
                self.make_room();
                self.entities.insert(
                    id.to_string(),
                    EntityState {
                        strength,
                        motion,
                        last_seen: now,
                        last_strength: strength,
                    },
                );
                0.0
            }
        };

        let state = &self.entities[id];
        let motion_unit = state.motion.max(0.0);
        let rate_unit = rate.abs().min(rate_clamp) / rate_clamp;
        let samples = sample_count(&self.deposit, motion_unit, rate_unit);
        let ink = self.deposit.presence_weight
            + self.deposit.motion_weight * motion_unit
            + self.deposit.rate_weight * rate_unit;

        Conditioned {
            strength: state.strength,
            motion_unit,
            rate_unit,
            samples,
            ink_per_sample: ink / samples.max(1) as f64,
        }
    }

    /// Evict the least recently observed entity when the map is full.
    fn make_room(&mut self) {
        let Some(cap) = self.max_entities else { return };
        while self.entities.len() >= cap.max(1) {
            let oldest = self
                .entities
                .iter()
                .min_by_key(|(_, state)| state.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    debug!(entity = %id, "evicting least recently seen entity");
                    self.entities.remove(&id);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditioner() -> Conditioner {
        Conditioner::new(SmoothingConfig::default(), DepositConfig::default(), None)
    }

    #[test]
    fn test_first_observation_seeds_state() {
        let mut c = conditioner();
        let now = Instant::now();
        let out = c.observe("aa", -50.0, 0.5, now);

        assert_eq!(out.strength, -50.0);
        assert_eq!(out.motion_unit, 0.5);
        assert_eq!(out.rate_unit, 0.0);
        let state = c.entity("aa").unwrap();
        assert_eq!(state.last_strength, -50.0);
        assert_eq!(state.last_seen, now);
    }

    #[test]
    fn test_exponential_smoothing() {
        let mut c = conditioner();
        let t0 = Instant::now();
        c.observe("aa", -50.0, 1.0, t0);
        let out = c.observe("aa", -40.0, 0.0, t0 + Duration::from_secs(10));

        assert!((out.strength - (0.35 * -40.0 + 0.65 * -50.0)).abs() < 1e-9);
        assert!((out.motion_unit - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_rate_of_change() {
        let mut c = conditioner();
        let t0 = Instant::now();
        c.observe("aa", -50.0, 0.0, t0);
        // 2 dB over 1 s against a clamp of 8
        let out = c.observe("aa", -48.0, 0.0, t0 + Duration::from_secs(1));
        assert!((out.rate_unit - 0.25).abs() < 1e-9);

        // same instant: elapsed floors at 1 ms and the rate saturates
        let out = c.observe("aa", -60.0, 0.0, t0 + Duration::from_secs(1));
        assert_eq!(out.rate_unit, 1.0);
    }

    #[test]
    fn test_negative_motion_floors_at_zero() {
        let mut c = conditioner();
        let out = c.observe("aa", -50.0, -3.0, Instant::now());
        assert_eq!(out.motion_unit, 0.0);
        assert_eq!(out.samples, DepositConfig::default().base_samples);
    }

    #[test]
    fn test_sample_count_bounds() {
        let deposit = DepositConfig::default();
        for &(m, r) in &[
            (0.0, 0.0),
            (-5.0, -1.0),
            (1.0, 1.0),
            (1e6, 1.0),
            (f64::MAX, f64::MAX),
            (f64::INFINITY, 0.0),
            (f64::NAN, f64::NAN),
        ] {
            let k = sample_count(&deposit, m, r);
            assert!(k >= deposit.base_samples, "k={k} for ({m}, {r})");
            assert!(k <= deposit.max_samples, "k={k} for ({m}, {r})");
        }
        assert_eq!(sample_count(&deposit, 1.0, 1.0), 24 + 10 + 30);
    }

    #[test]
    fn test_total_ink_independent_of_sample_count() {
        let mut few = DepositConfig::default();
        few.base_samples = 4;
        let mut many = DepositConfig::default();
        many.base_samples = 400;

        let t0 = Instant::now();
        let mut a = Conditioner::new(SmoothingConfig::default(), few, None);
        let mut b = Conditioner::new(SmoothingConfig::default(), many, None);
        let out_a = a.observe("aa", -50.0, 2.0, t0);
        let out_b = b.observe("aa", -50.0, 2.0, t0);

        assert!(out_a.samples < out_b.samples);
        assert!((out_a.total_ink() - out_b.total_ink()).abs() < 1e-9);
        assert!((out_a.total_ink() - (1.0 + 0.9 * 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut c = conditioner();
        let t0 = Instant::now();
        for i in 0..100 {
            c.observe(&format!("id{i}"), -50.0, 0.0, t0);
        }
        assert_eq!(c.len(), 100);
    }

    #[test]
    fn test_evicts_least_recently_seen() {
        let mut c = Conditioner::new(SmoothingConfig::default(), DepositConfig::default(), Some(2));
        let t0 = Instant::now();
        c.observe("a", -50.0, 0.0, t0);
        c.observe("b", -50.0, 0.0, t0 + Duration::from_secs(1));
        c.observe("a", -50.0, 0.0, t0 + Duration::from_secs(2));
        c.observe("c", -50.0, 0.0, t0 + Duration::from_secs(3));

        assert_eq!(c.len(), 2);
        assert!(c.entity("a").is_some());
        assert!(c.entity("b").is_none());
        assert!(c.entity("c").is_some());
    }
}
