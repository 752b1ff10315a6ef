#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
    pub(crate) const YELLOW: Rgb = Rgb { r: 255, g: 255, b: 0 };
    pub(crate) const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };

    pub(crate) fn lerp(self, o: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb {
            r: lerp_u8(self.r, o.r, t),
            g: lerp_u8(self.g, o.g, t),
            b: lerp_u8(self.b, o.b, t),
        }
    }

    /// Channel-wise mean; `None` for an empty input.
    pub(crate) fn average<I: IntoIterator<Item = Rgb>>(colors: I) -> Option<Rgb> {
        let (mut r, mut g, mut b, mut n) = (0.0f64, 0.0f64, 0.0f64, 0usize);
        for c in colors {
            r += c.r as f64;
            g += c.g as f64;
            b += c.b as f64;
            n += 1;
        }
        if n == 0 {
            return None;
        }
        let n = n as f64;
        Some(Rgb {
            r: (r / n).round().clamp(0.0, 255.0) as u8,
            g: (g / n).round().clamp(0.0, 255.0) as u8,
            b: (b / n).round().clamp(0.0, 255.0) as u8,
        })
    }
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    let (a, b) = (a as f64, b as f64);
    (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
}

/// `v` mapped from `[a0, a1]` onto `[b0, b1]`, unclamped.
pub(crate) fn remap(v: f64, a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    if (a1 - a0).abs() <= f64::EPSILON {
        return b0;
    }
    b0 + (v - a0) / (a1 - a0) * (b1 - b0)
}

/// Red → yellow → green across the usable width of the field.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Gradient {
    pub(crate) start: f64,
    pub(crate) mid: f64,
    pub(crate) end: f64,
}

impl Gradient {
    pub(crate) fn for_field(width: f64, margin: f64) -> Self {
        Self {
            start: margin,
            mid: width / 2.0,
            end: width - margin,
        }
    }

    pub(crate) fn color_at(&self, x: f64) -> Rgb {
        if x < self.mid {
            Rgb::RED.lerp(Rgb::YELLOW, remap(x, self.start, self.mid, 0.0, 1.0))
        } else {
            Rgb::YELLOW.lerp(Rgb::GREEN, remap(x, self.mid, self.end, 0.0, 1.0))
        }
    }

    /// Horizontal position whose gradient colour best matches `c`.
    pub(crate) fn position_of(&self, c: Rgb) -> f64 {
        if c.r == 255 {
            remap(c.g as f64, 0.0, 255.0, self.start, self.mid)
        } else {
            remap(c.r as f64, 255.0, 0.0, self.mid, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_endpoints() {
        let g = Gradient::for_field(3200.0, 100.0);
        assert_eq!(g.color_at(100.0), Rgb::RED);
        assert_eq!(g.color_at(1600.0), Rgb::YELLOW);
        assert_eq!(g.color_at(3100.0), Rgb::GREEN);
        // beyond the margins the colour saturates
        assert_eq!(g.color_at(0.0), Rgb::RED);
        assert_eq!(g.color_at(3200.0), Rgb::GREEN);
    }

    #[test]
    fn position_inverts_color() {
        let g = Gradient::for_field(3200.0, 100.0);
        for x in [400.0, 1000.0, 2000.0, 2900.0] {
            let back = g.position_of(g.color_at(x));
            assert!((back - x).abs() < 12.0, "{x} -> {back}");
        }
    }

    #[test]
    fn average_of_nothing() {
        assert_eq!(Rgb::average(Vec::new()), None);
        assert_eq!(
            Rgb::average([Rgb::RED, Rgb::GREEN]),
            Some(Rgb { r: 128, g: 128, b: 0 })
        );
    }
}
