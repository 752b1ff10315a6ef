use crate::color::Rgb;
use crate::config::ConstellationConfig;
use crate::field::{ParticleField, Point};
use crate::sampler::{standard_normal, uniform_between};
use rand::Rng;
use std::collections::BTreeSet;

/// A chain of particles threaded through one horizontal section.
///
/// Members are arena indices into the field that built it; the path is only
/// meaningful until that field is re-initialized.
#[derive(Clone, Debug, Default)]
pub(crate) struct Constellation {
    members: Vec<usize>,
    segments: Vec<(usize, usize)>,
    color: Option<Rgb>,
    total_length: f64,
    section: (f64, f64),
    width_percent: Option<f64>,
}

impl Constellation {
    fn empty(section: (f64, f64)) -> Self {
        Self {
            section,
            ..Self::default()
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in path order.
    pub(crate) fn members(&self) -> &[usize] {
        &self.members
    }

    pub(crate) fn segments(&self) -> &[(usize, usize)] {
        &self.segments
    }

    pub(crate) fn color(&self) -> Option<Rgb> {
        self.color
    }

    pub(crate) fn total_length(&self) -> f64 {
        self.total_length
    }

    pub(crate) fn section(&self) -> (f64, f64) {
        self.section
    }

    /// Horizontal extent of the members as a share of the usable width.
    pub(crate) fn width_percent(&self) -> Option<f64> {
        self.width_percent
    }

    /// Polyline covering `progress` of the path length, measured from the start.
    pub(crate) fn reveal(&self, field: &ParticleField, progress: f64) -> Vec<Point> {
        let pos = |i: usize| field.get(i).map(|p| p.pos).unwrap_or_default();
        let Some(&(first, _)) = self.segments.first() else {
            return Vec::new();
        };

        let shown = self.total_length * progress.clamp(0.0, 1.0);
        let mut out = Vec::with_capacity(self.segments.len() + 1);
        out.push(pos(first));

        let mut so_far = 0.0;
        for &(a, b) in &self.segments {
            let (pa, pb) = (pos(a), pos(b));
            let d = pa.dist(pb);
            if so_far + d <= shown {
                out.push(pb);
                so_far += d;
            } else {
                let left = shown - so_far;
                if left > 0.0 && d > 0.0 {
                    out.push(pa.lerp(pb, left / d));
                }
                break;
            }
        }
        out
    }
}

pub(crate) struct ConstellationBuilder {
    cfg: ConstellationConfig,
}

impl ConstellationBuilder {
    pub(crate) fn new(cfg: ConstellationConfig) -> Self {
        Self { cfg }
    }

    fn choose_section<R: Rng + ?Sized>(&self, width: f64, margin: f64, rng: &mut R) -> (f64, f64) {
        let c = &self.cfg;
        let z = standard_normal(rng);
        let section = (width * c.section_mean_frac + z * width * c.section_sd_frac)
            .clamp(width * c.section_min_frac, width * c.section_max_frac);

        let lo = margin;
        let hi = (width - margin - section).max(lo);
        let mut start = uniform_between(rng, lo, hi).clamp(lo, hi);
        if rng.gen_bool(c.central_bias) {
            start = uniform_between(rng, width / 2.0 - section / 2.0, hi).clamp(lo, hi);
        }
        (start, start + section)
    }

    /// Threads a new path through arrived particles not yet in `used`.
    ///
    /// Too few candidates in the chosen section yields an empty constellation
    /// and leaves both `field` and `used` untouched.
    pub(crate) fn build<R: Rng + ?Sized>(
        &self,
        field: &mut ParticleField,
        used: &mut BTreeSet<usize>,
        rng: &mut R,
    ) -> Constellation {
        let (width, margin) = (field.config().width, field.config().margin);
        let section = self.choose_section(width, margin, rng);

        let candidates: Vec<usize> = field
            .particles()
            .iter()
            .enumerate()
            .filter(|(i, p)| p.arrived && !used.contains(i))
            .filter(|(_, p)| p.pos.x >= section.0 && p.pos.x <= section.1)
            .map(|(i, _)| i)
            .collect();

        if candidates.len() < self.cfg.min_candidates || candidates.is_empty() {
            log::debug!(
                "constellation skipped: {} candidates in [{:.0}, {:.0}]",
                candidates.len(),
                section.0,
                section.1
            );
            return Constellation::empty(section);
        }

        let pos = |f: &ParticleField, i: usize| f.particles()[i].pos;
        let min_distance = self.cfg.min_distance(width);
        let target = self.cfg.path_length;

        let mut members = Vec::with_capacity(target);
        let mut segments = Vec::with_capacity(target.saturating_sub(1));
        let mut current = candidates[rng.gen_range(0..candidates.len())];

        for step in 0..target {
            members.push(current);
            used.insert(current);
            if step + 1 == target {
                break;
            }
            let here = pos(field, current);
            let next: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|j| !used.contains(j) && here.dist(pos(field, *j)) > min_distance)
                .collect();
            if next.is_empty() {
                break;
            }
            let chosen = next[rng.gen_range(0..next.len())];
            segments.push((current, chosen));
            current = chosen;
        }

        field.clear_constellation_marks();
        for &i in &members {
            field.mark_in_constellation(i);
        }

        let color = Rgb::average(members.iter().map(|&i| field.color_of(&field.particles()[i])));
        let total_length = segments
            .iter()
            .map(|&(a, b)| pos(field, a).dist(pos(field, b)))
            .sum();

        let (left, right) = members.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &i| {
            let x = pos(field, i).x;
            (acc.0.min(x), acc.1.max(x))
        });
        let usable = (width - 2.0 * margin).max(f64::EPSILON);
        let width_percent = Some((right - left) / usable * 100.0);

        log::debug!(
            "constellation built: {} members, length {:.1}, section [{:.0}, {:.0}]",
            members.len(),
            total_length,
            section.0,
            section.1
        );

        Constellation {
            members,
            segments,
            color,
            total_length,
            section,
            width_percent,
        }
    }
}

/// Running mean of constellation widths over a session.
#[derive(Clone, Debug, Default)]
pub(crate) struct WidthStats {
    widths: Vec<f64>,
}

impl WidthStats {
    pub(crate) fn record(&mut self, c: &Constellation) {
        if let Some(w) = c.width_percent() {
            self.widths.push(w);
        }
    }

    pub(crate) fn average(&self) -> f64 {
        if self.widths.is_empty() {
            0.0
        } else {
            self.widths.iter().sum::<f64>() / self.widths.len() as f64
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.widths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;
    use rand::{rngs::StdRng, SeedableRng};

    fn settled(seed: u64, n: usize) -> (ParticleField, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut field = ParticleField::new(FieldConfig::default());
        field.initialize(n, &mut rng);
        let mut frame = 0;
        while field.arrived_count() < n {
            frame += 1;
            field.advance(frame as f64 * 16.0);
        }
        (field, rng)
    }

    fn builder() -> ConstellationBuilder {
        ConstellationBuilder::new(ConstellationConfig::default())
    }

    fn polyline_length(pts: &[Point]) -> f64 {
        pts.windows(2).map(|w| w[0].dist(w[1])).sum()
    }

    #[test]
    fn path_respects_length_and_spacing() {
        let (mut field, mut rng) = settled(1000, 1000);
        let b = builder();
        let mut used = BTreeSet::new();
        let c = b.build(&mut field, &mut used, &mut rng);

        let min_d = 3200.0 / 15.0;
        assert!(c.members().len() <= 30);
        assert_eq!(c.segments().len(), c.members().len().saturating_sub(1));
        for &(a, z) in c.segments() {
            assert!(field.particles()[a].pos.dist(field.particles()[z].pos) > min_d);
        }

        // Short paths only end because nothing unused is far enough away.
        if !c.is_empty() && c.members().len() < 30 {
            let (lo, hi) = c.section();
            let last = field.particles()[*c.members().last().unwrap()].pos;
            let stranded = field.particles().iter().enumerate().all(|(i, p)| {
                !p.arrived
                    || used.contains(&i)
                    || p.pos.x < lo
                    || p.pos.x > hi
                    || p.pos.dist(last) <= min_d
            });
            assert!(stranded);
        }
    }

    #[test]
    fn members_are_marked_and_used() {
        let (mut field, mut rng) = settled(7, 1500);
        let mut used = BTreeSet::new();
        let c = builder().build(&mut field, &mut used, &mut rng);
        for &i in c.members() {
            assert!(used.contains(&i));
            assert!(field.particles()[i].in_constellation);
        }
        let marked = field.particles().iter().filter(|p| p.in_constellation).count();
        assert_eq!(marked, c.members().len());
        assert_eq!(used.len(), c.members().len());
    }

    #[test]
    fn repeated_builds_never_reuse_particles() {
        let (mut field, mut rng) = settled(21, 2000);
        let b = builder();
        let mut used = BTreeSet::new();
        let mut seen = BTreeSet::new();
        for _ in 0..12 {
            let before = used.clone();
            let c = b.build(&mut field, &mut used, &mut rng);
            for &i in c.members() {
                assert!(!before.contains(&i));
                assert!(seen.insert(i));
            }
        }
    }

    #[test]
    fn too_few_candidates_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut field = ParticleField::new(FieldConfig::default());
        field.initialize(500, &mut rng);
        // nothing has arrived yet
        let mut used = BTreeSet::new();
        let c = builder().build(&mut field, &mut used, &mut rng);
        assert!(c.is_empty());
        assert!(c.segments().is_empty());
        assert_eq!(c.total_length(), 0.0);
        assert_eq!(c.color(), None);
        assert_eq!(c.width_percent(), None);
        assert!(used.is_empty());
        assert!(field.particles().iter().all(|p| !p.in_constellation));
    }

    #[test]
    fn exhausted_field_leaves_used_set_alone() {
        let (mut field, mut rng) = settled(9, 40);
        let mut used: BTreeSet<usize> = (0..20).collect();
        let snapshot = used.clone();
        let c = builder().build(&mut field, &mut used, &mut rng);
        assert!(c.is_empty());
        assert_eq!(used, snapshot);
    }

    #[test]
    fn total_length_is_the_sum_of_segments() {
        let (mut field, mut rng) = settled(33, 1200);
        let c = builder().build(&mut field, &mut BTreeSet::new(), &mut rng);
        let sum: f64 = c
            .segments()
            .iter()
            .map(|&(a, b)| field.particles()[a].pos.dist(field.particles()[b].pos))
            .sum();
        assert!((c.total_length() - sum).abs() < 1e-6);
    }

    #[test]
    fn color_and_width_summarise_members() {
        let (mut field, mut rng) = settled(44, 1500);
        let mut stats = WidthStats::default();
        let c = builder().build(&mut field, &mut BTreeSet::new(), &mut rng);
        if c.is_empty() {
            return;
        }
        let expect = Rgb::average(
            c.members()
                .iter()
                .map(|&i| field.color_of(&field.particles()[i])),
        );
        assert_eq!(c.color(), expect);
        assert_eq!(c.color().map(|c| c.b), Some(0));

        let w = c.width_percent().unwrap();
        assert!((0.0..=100.0).contains(&w));
        stats.record(&c);
        assert_eq!(stats.count(), 1);
        assert!((stats.average() - w).abs() < 1e-9);
    }

    #[test]
    fn section_stays_inside_margins() {
        let b = builder();
        let mut rng = StdRng::seed_from_u64(77);
        for _ in 0..500 {
            let (lo, hi) = b.choose_section(3200.0, 100.0, &mut rng);
            assert!(lo >= 100.0 - 1e-9);
            assert!(hi <= 3100.0 + 1e-9);
            let w = hi - lo;
            assert!(w >= 640.0 - 1e-9 && w <= 2880.0 + 1e-9);
        }
    }

    #[test]
    fn reveal_grows_from_start_to_full_path() {
        let (mut field, mut rng) = settled(55, 1500);
        let c = builder().build(&mut field, &mut BTreeSet::new(), &mut rng);
        if c.segments().is_empty() {
            return;
        }
        let start = field.particles()[c.members()[0]].pos;

        let none = c.reveal(&field, 0.0);
        assert_eq!(none, vec![start]);

        let full = c.reveal(&field, 1.0);
        let expect: Vec<Point> = c.members().iter().map(|&i| field.particles()[i].pos).collect();
        assert_eq!(full.len(), expect.len());
        assert!((polyline_length(&full) - c.total_length()).abs() < 1e-6);

        let half = c.reveal(&field, 0.5);
        assert!((polyline_length(&half) - c.total_length() / 2.0).abs() < 1e-6);

        // out of range progress is clamped
        assert_eq!(c.reveal(&field, 7.0).len(), full.len());
    }

    #[test]
    fn empty_stats_average_zero() {
        let mut stats = WidthStats::default();
        stats.record(&Constellation::empty((0.0, 1.0)));
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.average(), 0.0);
    }
}
