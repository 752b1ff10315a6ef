use rand::Rng;
use std::f64::consts::TAU;

/// One standard normal draw via Box–Muller.
///
/// `u1` is re-drawn while it is zero so `ln(u1)` stays finite.
pub(crate) fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let mut u1: f64 = rng.gen();
    while u1 <= 0.0 {
        u1 = rng.gen();
    }
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Uniform draw over `[a, b]` in either order; a degenerate range yields `a`.
pub(crate) fn uniform_between<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if hi - lo <= f64::EPSILON {
        return lo;
    }
    rng.gen_range(lo..hi)
}

/// Per-run affine variation applied to every sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Variation {
    pub(crate) spread: f64,
    pub(crate) skew: f64,
}

impl Variation {
    pub(crate) const IDENTITY: Variation = Variation {
        spread: 1.0,
        skew: 0.0,
    };

    pub(crate) fn draw<R: Rng + ?Sized>(
        rng: &mut R,
        spread: (f64, f64),
        skew: (f64, f64),
    ) -> Self {
        Self {
            spread: uniform_between(rng, spread.0, spread.1),
            skew: uniform_between(rng, skew.0, skew.1),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct NormalSampler {
    variation: Variation,
}

impl NormalSampler {
    pub(crate) fn new(variation: Variation) -> Self {
        Self { variation }
    }

    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        standard_normal(rng) * self.variation.spread + self.variation.skew
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    /// Yields a scripted sequence of `u64`s so the zero guard can be hit.
    struct Scripted {
        vals: Vec<u64>,
        i: usize,
    }

    impl RngCore for Scripted {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }
        fn next_u64(&mut self) -> u64 {
            let v = self.vals[self.i % self.vals.len()];
            self.i += 1;
            v
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for b in dest {
                *b = self.next_u64() as u8;
            }
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn zero_first_draw_is_resampled() {
        // u64 0 maps to 0.0, u64::MAX >> 1 maps to ~0.5
        let mut rng = Scripted {
            vals: vec![0, 0, u64::MAX >> 1, u64::MAX >> 2],
            i: 0,
        };
        let z = standard_normal(&mut rng);
        assert!(z.is_finite());
        assert_eq!(rng.i, 4);
    }

    #[test]
    fn moments_look_standard() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let xs: Vec<f64> = (0..n).map(|_| standard_normal(&mut rng)).collect();
        let mean = xs.iter().sum::<f64>() / n as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "var {var}");
    }

    #[test]
    fn variation_shifts_and_scales() {
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        let s = NormalSampler::new(Variation {
            spread: 2.0,
            skew: 0.5,
        });
        let z = standard_normal(&mut a);
        assert!((s.sample(&mut b) - (z * 2.0 + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn variation_draw_stays_in_ranges() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let v = Variation::draw(&mut rng, (0.8, 1.2), (-0.3, 0.3));
            assert!((0.8..=1.2).contains(&v.spread));
            assert!((-0.3..=0.3).contains(&v.skew));
        }
    }

    #[test]
    fn uniform_between_accepts_reversed_and_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(uniform_between(&mut rng, 4.0, 4.0), 4.0);
        for _ in 0..100 {
            let v = uniform_between(&mut rng, 10.0, 2.0);
            assert!((2.0..=10.0).contains(&v));
        }
    }
}
