//! Subpixel accumulation canvas.
//!
//! Two decaying layers share one grid: `fast` is the short-memory motion
//! trail, `slow` the long-memory structure. A per-subpixel hit counter
//! records congestion so repeated deposits spread to quieter neighbours
//! instead of piling onto one point. The counter decays with the fast layer
//! and is kept fractional; only comparisons round it down. Nothing outside
//! the inscribed circle is ever written.

use std::time::Instant;

use rand::Rng;

use super::conditioner::Conditioned;
use super::grid::SubpixelGrid;
use super::viewport::{Viewport, SUB_X, SUB_Y};
use crate::config::{DecayConfig, DepositConfig};

/// Gap between the canvas edge and the active circle, in subpixels.
const RIM: i64 = 4;
/// Rays start this far out so the centre does not over-bloom.
const RAY_START_FRAC: f64 = 0.2;
/// Neighbourhood searched for a less congested subpixel.
const SEARCH_RADIUS: i64 = 1;

/// The circular active region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Disc {
    pub cx: i64,
    pub cy: i64,
    pub radius: i64,
}

impl Disc {
    pub fn contains(&self, x: i64, y: i64) -> bool {
        let dx = x - self.cx;
        let dy = y - self.cy;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

/// Choose where a deposit aimed at `(x, y)` actually lands.
///
/// Probes up to `probes` random neighbours within the search radius and
/// keeps the one with the fewest whole hits, stopping early on one with
/// none. Returns `None` when `(x, y)` itself is off the grid or outside the disc.
pub fn pick_target<R: Rng + ?Sized>(
    x: i64,
    y: i64,
    hits: &SubpixelGrid<f64>,
    disc: &Disc,
    probes: usize,
    rng: &mut R,
) -> Option<(usize, usize)> {
    if !hits.contains(x, y) || !disc.contains(x, y) {
        return None;
    }
    let mut best = (x as usize, y as usize);
    let mut best_hits = hits.get(best.0, best.1)?.floor();

    for _ in 0..probes {
        let nx = x + rng.gen_range(-SEARCH_RADIUS..=SEARCH_RADIUS);
        let ny = y + rng.gen_range(-SEARCH_RADIUS..=SEARCH_RADIUS);
        if !hits.contains(nx, ny) || !disc.contains(nx, ny) {
            continue;
        }
        let Some(h) = hits.get(nx as usize, ny as usize) else { continue };
        let h = h.floor();
        if h < best_hits {
            best = (nx as usize, ny as usize);
            best_hits = h;
            if h == 0.0 {
                break;
            }
        }
    }
    Some(best)
}

pub struct Canvas {
    fast: SubpixelGrid<f64>,
    slow: SubpixelGrid<f64>,
    hits: SubpixelGrid<f64>,
    disc: Disc,
    cell_cols: usize,
    cell_rows: usize,
    decay: DecayConfig,
    deposit: DepositConfig,
    last_fast: Instant,
    last_slow: Instant,
}

impl Canvas {
    pub fn new(viewport: &Viewport, decay: DecayConfig, deposit: DepositConfig, now: Instant) -> Self {
        let width = viewport.sub_width();
        let height = viewport.sub_height();
        let cx = (width / 2) as i64;
        let cy = (height / 2) as i64;
        Self {
            fast: SubpixelGrid::new(width, height),
            slow: SubpixelGrid::new(width, height),
            hits: SubpixelGrid::new(width, height),
            disc: Disc {
                cx,
                cy,
                radius: (cx.min(cy) - RIM).max(0),
            },
            cell_cols: viewport.cell_cols,
            cell_rows: viewport.cell_rows,
            decay,
            deposit,
            last_fast: now,
            last_slow: now,
        }
    }

    pub fn width(&self) -> usize {
        self.fast.width()
    }

    pub fn height(&self) -> usize {
        self.fast.height()
    }

    pub fn cell_cols(&self) -> usize {
        self.cell_cols
    }

    pub fn cell_rows(&self) -> usize {
        self.cell_rows
    }

    pub fn disc(&self) -> Disc {
        self.disc
    }

    /// Active radius in subpixels.
    pub fn radius(&self) -> f64 {
        self.disc.radius as f64
    }

    pub fn in_circle(&self, x: i64, y: i64) -> bool {
        self.fast.contains(x, y) && self.disc.contains(x, y)
    }

    /// A character cell is drawn when its centre subpixel is inside the disc.
    pub fn cell_visible(&self, col: usize, row: usize) -> bool {
        let x = (col * SUB_X + 1) as i64;
        let y = (row * SUB_Y + 2) as i64;
        col < self.cell_cols && row < self.cell_rows && self.disc.contains(x, y)
    }

    pub fn fast_at(&self, x: usize, y: usize) -> f64 {
        self.fast.get(x, y).unwrap_or(0.0)
    }

    pub fn slow_at(&self, x: usize, y: usize) -> f64 {
        self.slow.get(x, y).unwrap_or(0.0)
    }

    pub fn hits_at(&self, x: usize, y: usize) -> f64 {
        self.hits.get(x, y).unwrap_or(0.0)
    }

    /// `fast + slow` on the same subpixel grid.
    pub fn merged(&self) -> SubpixelGrid<f64> {
        let mut merged = self.fast.clone();
        for (m, s) in merged.values_mut().iter_mut().zip(self.slow.values()) {
            *m += s;
        }
        merged
    }

    /// Apply exponential decay for the time since each layer was last decayed.
    /// Elapsed time drives the factor, so the call cadence does not matter.
    pub fn decay(&mut self, now: Instant) {
        let dt_fast = now.saturating_duration_since(self.last_fast).as_secs_f64();
        if dt_fast > 0.0 {
            let f = self.decay.fast_per_sec.powf(dt_fast);
            for v in self.fast.values_mut() {
                *v *= f;
            }
            for h in self.hits.values_mut() {
                *h *= f;
            }
            self.last_fast = now;
        }

        let dt_slow = now.saturating_duration_since(self.last_slow).as_secs_f64();
        if dt_slow > 0.0 {
            let g = self.decay.slow_per_sec.powf(dt_slow);
            for v in self.slow.values_mut() {
                *v *= g;
            }
            self.last_slow = now;
        }
    }

    pub fn splat<R: Rng + ?Sized>(&mut self, x: i64, y: i64, ink: f64, rng: &mut R) {
        let Some((tx, ty)) = pick_target(x, y, &self.hits, &self.disc, self.deposit.splat_probes, rng)
        else {
            return;
        };
        let slow_gain = self.decay.slow_gain;
        if let Some(v) = self.fast.get_mut(tx, ty) {
            *v += ink;
        }
        if let Some(v) = self.slow.get_mut(tx, ty) {
            *v += ink * slow_gain;
        }
        if let Some(h) = self.hits.get_mut(tx, ty) {
            *h += 1.0;
        }
    }

    /// March from 20% of `r_pix` out to `r_pix`, jittering every step.
    /// Step spacing is fixed in subpixels, so short rays near the centre get
    /// few deposits and long ones many.
    pub fn deposit_ray<R: Rng + ?Sized>(&mut self, theta: f64, r_pix: f64, ink: f64, rng: &mut R) {
        let start = (RAY_START_FRAC * r_pix).floor();
        let steps = (((r_pix - start) * (self.deposit.ray_steps_per_unit / 8.0)) as usize).max(1);
        let arc = self.deposit.jitter_arc_deg;
        let frac = self.deposit.jitter_radius_frac;

        for s in 0..steps {
            let t = s as f64 / (steps.saturating_sub(1)).max(1) as f64;
            let r = start + t * (r_pix - start);
            let th = theta + jitter(rng, arc).to_radians();
            let rr = r * (1.0 + jitter(rng, frac));
            let x = (self.disc.cx as f64 + rr * th.cos()).round() as i64;
            let y = (self.disc.cy as f64 + rr * th.sin()).round() as i64;
            if self.in_circle(x, y) {
                self.splat(x, y, ink, rng);
            }
        }
    }

    /// Spread one observation over `samples` individually jittered rays.
    pub fn deposit<R: Rng + ?Sized>(&mut self, theta: f64, r_pix: f64, obs: &Conditioned, rng: &mut R) {
        let arc = self.deposit.jitter_arc_deg;
        let frac = self.deposit.jitter_radius_frac;
        for _ in 0..obs.samples {
            let th = theta + jitter(rng, arc).to_radians();
            let rr = r_pix * (1.0 + jitter(rng, frac));
            self.deposit_ray(th, rr, obs.ink_per_sample, rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn canvas(now: Instant) -> Canvas {
        let viewport = Viewport::new(120, 40, &RenderConfig::default());
        Canvas::new(&viewport, DecayConfig::default(), DepositConfig::default(), now)
    }

    fn layer_sums(c: &Canvas) -> (f64, f64, f64) {
        let mut fast = 0.0;
        let mut slow = 0.0;
        let mut hits = 0.0;
        for y in 0..c.height() {
            for x in 0..c.width() {
                fast += c.fast_at(x, y);
                slow += c.slow_at(x, y);
                hits += c.hits_at(x, y);
            }
        }
        (fast, slow, hits)
    }

    #[test]
    fn test_geometry() {
        let c = canvas(Instant::now());
        assert_eq!((c.width(), c.height()), (236, 144));
        assert_eq!(c.disc(), Disc { cx: 118, cy: 72, radius: 68 });
        assert!(c.cell_visible(59, 18));
        assert!(!c.cell_visible(0, 0));
        assert!(!c.cell_visible(500, 18));
    }

    #[test]
    fn test_splat_deposits_at_center() {
        let mut c = canvas(Instant::now());
        let mut rng = StdRng::seed_from_u64(1);
        c.splat(118, 72, 1.0, &mut rng);

        let (fast, slow, hits) = layer_sums(&c);
        assert!((fast - 1.0).abs() < 1e-12);
        assert!((slow - 0.25).abs() < 1e-12);
        assert_eq!(hits, 1.0);
        // fresh canvas: the aimed subpixel itself has zero hits and wins
        assert_eq!(c.fast_at(118, 72), 1.0);
    }

    #[test]
    fn test_merged_adds_layers_on_the_grid() {
        let mut c = canvas(Instant::now());
        let mut rng = StdRng::seed_from_u64(14);
        c.splat(118, 72, 1.0, &mut rng);
        let merged = c.merged();
        assert_eq!((merged.width(), merged.height()), (c.width(), c.height()));
        assert_eq!(merged.get(118, 72), Some(1.25));
        assert_eq!(merged.get(117, 72), Some(0.0));
        assert_eq!(merged.get(c.width(), 0), None);
    }

    #[test]
    fn test_splat_outside_circle_is_noop() {
        let mut c = canvas(Instant::now());
        let mut rng = StdRng::seed_from_u64(2);
        for &(x, y) in &[(0, 0), (235, 143), (-3, 72), (118, -1), (400, 72), (118, 72 + 69), (118 + 69, 72)] {
            c.splat(x, y, 1.0, &mut rng);
        }
        assert_eq!(layer_sums(&c), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_congestion_spreads_deposits() {
        let mut c = canvas(Instant::now());
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            c.splat(118, 72, 0.01, &mut rng);
        }

        let mut touched = 0;
        let mut max_hits: f64 = 0.0;
        for y in 70..=74 {
            for x in 116..=120 {
                let h = c.hits_at(x, y);
                if h > 0.0 {
                    touched += 1;
                    assert!((x as i64 - 118).abs() <= 1 && (y as i64 - 72).abs() <= 1);
                }
                max_hits = max_hits.max(h);
            }
        }
        assert!(touched >= 5, "only {touched} subpixels touched");
        assert!(max_hits < 100.0, "max hits {max_hits}");
        assert_eq!(layer_sums(&c).2, 200.0);
    }

    #[test]
    fn test_pick_target_prefers_empty_neighbour() {
        let c = canvas(Instant::now());
        let mut hits = c.hits.clone();
        *hits.get_mut(118, 72).unwrap() = 50.0;
        let mut rng = StdRng::seed_from_u64(4);
        let mut moved = 0;
        for _ in 0..50 {
            let (x, y) = pick_target(118, 72, &hits, &c.disc, 4, &mut rng).unwrap();
            if (x, y) != (118, 72) {
                assert_eq!(hits.get(x, y), Some(0.0));
                moved += 1;
            }
        }
        // four probes of nine offsets miss the neighbours only rarely
        assert!(moved > 40);
        assert_eq!(pick_target(0, 0, &hits, &c.disc, 4, &mut rng), None);
    }

    #[test]
    fn test_pick_target_is_reproducible() {
        let c = canvas(Instant::now());
        let mut hits = c.hits.clone();
        *hits.get_mut(100, 60).unwrap() = 3.0;
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            assert_eq!(
                pick_target(100, 60, &hits, &c.disc, 4, &mut a),
                pick_target(100, 60, &hits, &c.disc, 4, &mut b)
            );
        }
    }

    #[test]
    fn test_decay_rates() {
        let t0 = Instant::now();
        let mut c = canvas(t0);
        let mut rng = StdRng::seed_from_u64(5);
        c.splat(118, 72, 1.0, &mut rng);

        c.decay(t0 + Duration::from_secs(3));
        let expected_fast = 0.88f64.powi(3);
        let expected_slow = 0.25 * 0.995f64.powi(3);
        assert!((c.fast_at(118, 72) - expected_fast).abs() < 1e-9);
        assert!((c.slow_at(118, 72) - expected_slow).abs() < 1e-9);
    }

    #[test]
    fn test_decay_splits_commute() {
        let t0 = Instant::now();
        let mut once = canvas(t0);
        let mut split = canvas(t0);
        let mut rng = StdRng::seed_from_u64(6);
        once.splat(118, 72, 2.0, &mut rng);
        split.splat(118, 72, 2.0, &mut rng);

        once.decay(t0 + Duration::from_millis(4_000));
        split.decay(t0 + Duration::from_millis(1_250));
        split.decay(t0 + Duration::from_millis(1_250));
        split.decay(t0 + Duration::from_millis(2_600));
        split.decay(t0 + Duration::from_millis(4_000));

        assert!((once.fast_at(118, 72) - split.fast_at(118, 72)).abs() < 1e-9);
        assert!((once.slow_at(118, 72) - split.slow_at(118, 72)).abs() < 1e-9);
        assert!((once.hits_at(118, 72) - split.hits_at(118, 72)).abs() < 1e-9);
    }

    #[test]
    fn test_congestion_survives_frequent_decay() {
        let t0 = Instant::now();
        let mut once = canvas(t0);
        let mut split = canvas(t0);
        *once.hits.get_mut(118, 72).unwrap() = 40.0;
        *split.hits.get_mut(118, 72).unwrap() = 40.0;

        once.decay(t0 + Duration::from_secs(1));
        for i in 1..=50 {
            split.decay(t0 + Duration::from_millis(20 * i));
        }

        let expected = 40.0 * 0.88;
        assert!((once.hits_at(118, 72) - expected).abs() < 1e-9);
        assert!((split.hits_at(118, 72) - expected).abs() < 1e-9);

        // still congested, so a deposit aimed here moves to a neighbour
        let mut rng = StdRng::seed_from_u64(12);
        let target = pick_target(118, 72, &split.hits, &split.disc, 8, &mut rng);
        assert_ne!(target, Some((118, 72)));
    }

    #[test]
    fn test_pick_target_rounds_hits_down() {
        let c = canvas(Instant::now());
        let mut hits = c.hits.clone();
        // every candidate has fewer than one whole hit, so the aimed subpixel keeps it
        for y in 71..=73 {
            for x in 117..=119 {
                *hits.get_mut(x, y).unwrap() = 0.5;
            }
        }
        *hits.get_mut(118, 72).unwrap() = 0.9;
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..20 {
            assert_eq!(pick_target(118, 72, &hits, &c.disc, 4, &mut rng), Some((118, 72)));
        }
    }

    #[test]
    fn test_decay_ignores_clock_going_backwards() {
        let t0 = Instant::now() + Duration::from_secs(10);
        let mut c = canvas(t0);
        let mut rng = StdRng::seed_from_u64(7);
        c.splat(118, 72, 1.0, &mut rng);
        c.decay(t0 - Duration::from_secs(5));
        assert_eq!(c.fast_at(118, 72), 1.0);
    }

    #[test]
    fn test_congestion_relaxes_with_fast_layer() {
        let t0 = Instant::now();
        let mut c = canvas(t0);
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..20 {
            c.splat(118, 72, 0.1, &mut rng);
        }
        c.decay(t0 + Duration::from_secs(60));
        assert!(layer_sums(&c).2 < 0.05);
        for y in 70..=74 {
            for x in 116..=120 {
                assert_eq!(c.hits_at(x, y).floor(), 0.0);
            }
        }
    }

    #[test]
    fn test_rays_stay_inside_circle() {
        let mut c = canvas(Instant::now());
        let mut rng = StdRng::seed_from_u64(10);
        for i in 0..36 {
            let theta = (i as f64 * 10.0).to_radians();
            c.deposit_ray(theta, 90.0, 0.5, &mut rng);
        }
        let disc = c.disc();
        let mut lit = 0;
        for y in 0..c.height() {
            for x in 0..c.width() {
                if c.fast_at(x, y) > 0.0 {
                    lit += 1;
                    assert!(disc.contains(x as i64, y as i64));
                }
            }
        }
        assert!(lit > 0);
    }

    #[test]
    fn test_deposit_follows_angle() {
        let mut c = canvas(Instant::now());
        let mut rng = StdRng::seed_from_u64(11);
        let obs = Conditioned {
            strength: -60.0,
            motion_unit: 1.0,
            rate_unit: 0.0,
            samples: 30,
            ink_per_sample: 0.1,
        };
        // pointing right (+x)
        c.deposit(0.0, 40.0, &obs, &mut rng);
        let mut left = 0.0;
        let mut right = 0.0;
        for y in 0..c.height() {
            for x in 0..c.width() {
                let v = c.fast_at(x, y) + c.slow_at(x, y);
                if x < 118 {
                    left += v;
                } else {
                    right += v;
                }
            }
        }
        assert!(right > 0.0);
        assert_eq!(left, 0.0);
    }
}
