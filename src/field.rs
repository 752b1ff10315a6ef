use crate::color::{remap, Gradient, Rgb};
use crate::config::{FadeConfig, FieldConfig, HighlightStyle};
use crate::histogram::Histogram;
use crate::sampler::{NormalSampler, Variation};
use rand::Rng;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Point {
    pub(crate) x: f64,
    pub(crate) y: f64,
}

impl Point {
    pub(crate) fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
    pub(crate) fn dist(self, o: Point) -> f64 {
        ((self.x - o.x).powi(2) + (self.y - o.y).powi(2)).sqrt()
    }
    pub(crate) fn lerp(self, o: Point, t: f64) -> Point {
        Point {
            x: self.x + (o.x - self.x) * t,
            y: self.y + (o.y - self.y) * t,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Particle {
    pub(crate) pos: Point,
    pub(crate) target: Point,
    pub(crate) bin: usize,
    pub(crate) arrived: bool,
    pub(crate) arrival_time: f64,
    pub(crate) in_constellation: bool,
}

/// Render-side factors derived from a particle's timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Visual {
    pub(crate) alpha: f64,
    pub(crate) size: f64,
}

/// Arena of particles, indexed by position in the run's `Vec`.
pub(crate) struct ParticleField {
    cfg: FieldConfig,
    gradient: Gradient,
    histogram: Histogram,
    particles: Vec<Particle>,
    variation: Variation,
    average_x: f64,
}

impl ParticleField {
    pub(crate) fn new(cfg: FieldConfig) -> Self {
        let histogram = Histogram::new(cfg.bin_count, cfg.width);
        let gradient = Gradient::for_field(cfg.width, cfg.margin);
        Self {
            cfg,
            gradient,
            histogram,
            particles: Vec::new(),
            variation: Variation::IDENTITY,
            average_x: 0.0,
        }
    }

    pub(crate) fn initialize<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) {
        let c = &self.cfg;
        self.histogram.reset();
        self.variation = Variation::draw(rng, c.spread, c.skew);
        let sampler = NormalSampler::new(self.variation);

        let (lo_x, hi_x) = (c.margin, c.width - c.margin);
        let (lo_y, hi_y) = (c.margin, c.height - c.margin);

        let mut particles = Vec::with_capacity(n);
        for _ in 0..n {
            let z = sampler.sample(rng);
            let tx = remap(z, -c.sigma_range, c.sigma_range, lo_x, hi_x).clamp(lo_x, hi_x);
            let (bin, count) = self.histogram.place_and_bin(tx);
            let ty = (hi_y - count as f64 * c.stack_step).clamp(lo_y, hi_y);
            let pos = Point::new(rng.gen_range(0.0..c.width), rng.gen_range(0.0..c.height));
            particles.push(Particle {
                pos,
                target: Point::new(tx, ty),
                bin,
                arrived: false,
                arrival_time: 0.0,
                in_constellation: false,
            });
        }

        self.average_x = if particles.is_empty() {
            c.width / 2.0
        } else {
            particles.iter().map(|p| p.target.x).sum::<f64>() / particles.len() as f64
        };
        self.particles = particles;
        debug_assert_eq!(self.histogram.total(), n as u64);

        log::info!(
            "field reset: {} particles, spread {:.3}, skew {:+.3}, average x {:.1}, tallest bin {}",
            n,
            self.variation.spread,
            self.variation.skew,
            self.average_x,
            self.histogram.tallest()
        );
    }

    /// One frame of easing; returns how many particles arrived this frame.
    pub(crate) fn advance(&mut self, now: f64) -> usize {
        let k = self.cfg.ease_factor;
        let eps = self.cfg.arrival_epsilon;
        let mut arrivals = 0;
        for p in self.particles.iter_mut().filter(|p| !p.arrived) {
            p.pos = p.pos.lerp(p.target, k);
            if p.pos.dist(p.target) < eps {
                p.arrived = true;
                p.arrival_time = now;
                arrivals += 1;
            }
        }
        arrivals
    }

    pub(crate) fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub(crate) fn get(&self, i: usize) -> Option<&Particle> {
        self.particles.get(i)
    }

    pub(crate) fn len(&self) -> usize {
        self.particles.len()
    }

    pub(crate) fn arrived_count(&self) -> usize {
        self.particles.iter().filter(|p| p.arrived).count()
    }

    pub(crate) fn mark_in_constellation(&mut self, i: usize) {
        if let Some(p) = self.particles.get_mut(i) {
            p.in_constellation = true;
        }
    }

    pub(crate) fn clear_constellation_marks(&mut self) {
        for p in &mut self.particles {
            p.in_constellation = false;
        }
    }

    pub(crate) fn config(&self) -> &FieldConfig {
        &self.cfg
    }

    pub(crate) fn gradient(&self) -> Gradient {
        self.gradient
    }

    #[cfg(test)]
    pub(crate) fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Mean resting x of the current run.
    pub(crate) fn average_x(&self) -> f64 {
        self.average_x
    }

    pub(crate) fn color_of(&self, p: &Particle) -> Rgb {
        self.gradient.color_at(p.target.x)
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn progress(elapsed: f64, duration: f64) -> f64 {
    (elapsed / duration).clamp(0.0, 1.0)
}

/// Alpha in `[0, 255]` and size factor in `[0, peak_size]`.
///
/// `shown_since` is the time the current constellation appeared, if any.
pub(crate) fn visual_state(
    p: &Particle,
    now: f64,
    shown_since: Option<f64>,
    fade: &FadeConfig,
) -> Visual {
    let (alpha, size) = match shown_since {
        Some(start) => {
            let t = now - start;
            if p.in_constellation {
                let h = progress(t, fade.highlight_ms);
                match fade.highlight {
                    HighlightStyle::Burst => (lerp(255.0, 0.0, h), lerp(1.0, fade.peak_size, h * h)),
                    HighlightStyle::Pulse => {
                        let size = if h < 0.5 {
                            let g = h / 0.5;
                            lerp(1.0, fade.peak_size, g * g)
                        } else {
                            lerp(fade.peak_size, fade.hold_size, (h - 0.5) / 0.5)
                        };
                        (255.0, size)
                    }
                }
            } else {
                let d = progress(t, fade.dim_duration_ms);
                (lerp(255.0, fade.dim_alpha, d), 1.0)
            }
        }
        None if p.arrived => {
            let since = now - p.arrival_time;
            if since > fade.fade_delay_ms {
                let f = progress(since - fade.fade_delay_ms, fade.fade_duration_ms);
                (255.0 * (1.0 - f), 1.0 + f)
            } else {
                (255.0, 1.0)
            }
        }
        None => (255.0, 1.0),
    };
    Visual {
        alpha: alpha.clamp(0.0, 255.0),
        size: size.clamp(0.0, fade.peak_size.max(1.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn small_field() -> FieldConfig {
        FieldConfig {
            particle_count: 1000,
            ..FieldConfig::default()
        }
    }

    fn settle(field: &mut ParticleField) -> usize {
        let mut frames = 0;
        while field.arrived_count() < field.len() && frames < 2000 {
            frames += 1;
            field.advance(frames as f64 * 16.0);
        }
        frames
    }

    #[test]
    fn initialize_places_everything_inside_margins() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut field = ParticleField::new(small_field());
        field.initialize(1000, &mut rng);

        let c = field.config().clone();
        assert_eq!(field.len(), 1000);
        assert_eq!(field.histogram().total(), 1000);
        for p in field.particles() {
            assert!(p.bin < c.bin_count);
            assert!(p.target.x >= c.margin && p.target.x <= c.width - c.margin);
            assert!(p.target.y >= c.margin && p.target.y <= c.height - c.margin);
            assert!(!p.arrived);
        }
    }

    #[test]
    fn stacking_follows_generation_order() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut field = ParticleField::new(small_field());
        field.initialize(1000, &mut rng);

        let bins = field.config().bin_count;
        let mut last_y = vec![f64::INFINITY; bins];
        for p in field.particles() {
            assert!(p.target.y <= last_y[p.bin]);
            last_y[p.bin] = p.target.y;
        }
    }

    #[test]
    fn reinitialize_replaces_the_run() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut field = ParticleField::new(small_field());
        field.initialize(400, &mut rng);
        field.initialize(250, &mut rng);
        assert_eq!(field.len(), 250);
        assert_eq!(field.histogram().total(), 250);
    }

    #[test]
    fn easing_closes_distance_and_never_overshoots() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut field = ParticleField::new(small_field());
        field.initialize(300, &mut rng);

        let mut remaining: Vec<f64> = field
            .particles()
            .iter()
            .map(|p| p.pos.dist(p.target))
            .collect();
        for frame in 1..=400 {
            field.advance(frame as f64 * 16.0);
            for (p, r) in field.particles().iter().zip(remaining.iter_mut()) {
                let d = p.pos.dist(p.target);
                assert!(d <= *r + 1e-9);
                *r = d;
            }
        }
        assert_eq!(field.arrived_count(), 300);
    }

    #[test]
    fn arrival_is_sticky_and_timestamped() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut field = ParticleField::new(small_field());
        field.initialize(200, &mut rng);

        let mut seen = vec![false; 200];
        for frame in 1..=300 {
            let now = frame as f64 * 10.0;
            field.advance(now);
            for (i, p) in field.particles().iter().enumerate() {
                if seen[i] {
                    assert!(p.arrived);
                } else if p.arrived {
                    seen[i] = true;
                    assert_eq!(p.arrival_time, now);
                    assert!(p.pos.dist(p.target) < 1.0);
                }
            }
        }
    }

    #[test]
    fn average_x_matches_targets() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut field = ParticleField::new(small_field());
        field.initialize(500, &mut rng);
        let mean =
            field.particles().iter().map(|p| p.target.x).sum::<f64>() / field.len() as f64;
        assert!((field.average_x() - mean).abs() < 1e-9);
        assert!(settle(&mut field) < 2000);
    }

    fn arrived_at(t: f64) -> Particle {
        Particle {
            pos: Point::default(),
            target: Point::default(),
            bin: 0,
            arrived: true,
            arrival_time: t,
            in_constellation: false,
        }
    }

    #[test]
    fn arrived_particles_fade_after_delay() {
        let fade = FadeConfig::default();
        let p = arrived_at(1000.0);
        assert_eq!(visual_state(&p, 2500.0, None, &fade).alpha, 255.0);
        let mid = visual_state(&p, 1000.0 + 2000.0 + 15_000.0, None, &fade);
        assert!((mid.alpha - 127.5).abs() < 1e-9);
        assert!((mid.size - 1.5).abs() < 1e-9);
        let done = visual_state(&p, 1e9, None, &fade);
        assert_eq!(done.alpha, 0.0);
        assert_eq!(done.size, 2.0);
    }

    #[test]
    fn constellation_dims_others_and_bursts_members() {
        let fade = FadeConfig::default();
        let other = arrived_at(0.0);
        let mut member = arrived_at(0.0);
        member.in_constellation = true;

        let v = visual_state(&other, 10_000.0 + 3000.0, Some(10_000.0), &fade);
        assert_eq!(v.alpha, fade.dim_alpha);

        let v = visual_state(&member, 10_000.0, Some(10_000.0), &fade);
        assert_eq!((v.alpha, v.size), (255.0, 1.0));
        let v = visual_state(&member, 20_000.0, Some(10_000.0), &fade);
        assert_eq!((v.alpha, v.size), (0.0, fade.peak_size));
    }

    #[test]
    fn pulse_members_settle_at_hold_size() {
        let fade = FadeConfig {
            highlight: HighlightStyle::Pulse,
            ..FadeConfig::default()
        };
        let mut member = arrived_at(0.0);
        member.in_constellation = true;
        let peak = visual_state(&member, 500.0, Some(0.0), &fade);
        assert!((peak.size - fade.peak_size).abs() < 1e-9);
        let held = visual_state(&member, 5000.0, Some(0.0), &fade);
        assert_eq!(held.size, fade.hold_size);
        assert_eq!(held.alpha, 255.0);
    }

    #[test]
    fn visuals_are_clamped_for_wild_clocks() {
        let fade = FadeConfig::default();
        let p = arrived_at(5000.0);
        let v = visual_state(&p, -1e12, Some(1e12), &fade);
        assert!((0.0..=255.0).contains(&v.alpha));
        assert!(v.size >= 0.0 && v.size <= fade.peak_size);
    }
}
