/// Per-bin running counts used to stack particles into bars.
#[derive(Clone, Debug)]
pub(crate) struct Histogram {
    width: f64,
    bins: Vec<u32>,
}

impl Histogram {
    /// `bin_count` must be non-zero; settings validation guarantees it.
    pub(crate) fn new(bin_count: usize, width: f64) -> Self {
        Self {
            width,
            bins: vec![0; bin_count.max(1)],
        }
    }

    pub(crate) fn bin_of(&self, x: f64) -> usize {
        let n = self.bins.len();
        let scaled = (x / self.width * n as f64).floor();
        if !scaled.is_finite() || scaled < 0.0 {
            0
        } else {
            (scaled as usize).min(n - 1)
        }
    }

    /// Returns the bin `x` falls into and that bin's count after this placement.
    pub(crate) fn place_and_bin(&mut self, x: f64) -> (usize, u32) {
        let bin = self.bin_of(x);
        self.bins[bin] += 1;
        (bin, self.bins[bin])
    }

    /// Height of the tallest bar.
    pub(crate) fn tallest(&self) -> u32 {
        self.bins.iter().copied().max().unwrap_or(0)
    }

    pub(crate) fn total(&self) -> u64 {
        self.bins.iter().map(|&c| c as u64).sum()
    }

    pub(crate) fn reset(&mut self) {
        self.bins.fill(0);
    }
}
