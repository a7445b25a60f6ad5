//! Fixed-bucket latency histogram
//!
//! 100 equal-width buckets starting at zero. When a value lands past the
//! last bucket the bucket width grows to the next power of two and existing
//! counts are folded into their new buckets. Folding is approximate: a
//! bucket's whole count moves to the bucket holding its lower bound.
//!
//! ```text
//! bin_size = 8:   [0,8) [8,16) ... [792,800)
//! add(1000) -> bin_size = 16: [0,16) [16,32) ... [1584,1600)
//! ```

/// Number of buckets
pub const NUM_BINS: usize = 100;

/// Initial bucket width
pub const INITIAL_BIN_SIZE: u64 = 8;

/// Latency histogram for percentile estimates
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bins: [u64; NUM_BINS],
    bin_size: u64,
    min: f64,
    max: f64,
    sum: f64,
    num: u64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            bins: [0; NUM_BINS],
            bin_size: INITIAL_BIN_SIZE,
            min: 0.0,
            max: 0.0,
            sum: 0.0,
            num: 0,
        }
    }

    /// Current bucket width
    #[inline]
    pub fn bin_size(&self) -> u64 {
        self.bin_size
    }

    /// Number of recorded values
    #[inline]
    pub fn count(&self) -> u64 {
        self.num
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Raw bucket counts
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Bucket index for `value`; negative values map to bucket 0
    #[inline]
    fn bin_for(&self, value: f64) -> usize {
        if value <= 0.0 || value.is_nan() {
            return 0;
        }
        // float-to-int casts saturate
        (value / self.bin_size as f64) as usize
    }

    /// Record one value, widening the buckets first if needed
    pub fn add_value(&mut self, value: f64) {
        let mut bin = self.bin_for(value);
        if bin >= NUM_BINS {
            self.resize(value);
            bin = self.bin_for(value).min(NUM_BINS - 1);
        }
        self.bins[bin] += 1;

        if self.num == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.num += 1;
    }

    /// Widen buckets so that `value` fits, folding existing counts
    pub fn resize(&mut self, value: f64) {
        let required = (value / NUM_BINS as f64).ceil().max(1.0);
        let mut new_size = if required >= (1u64 << 63) as f64 {
            1u64 << 63
        } else {
            (required as u64).next_power_of_two()
        };
        // a value exactly on the upper edge still needs one more doubling
        while (value / new_size as f64) as usize >= NUM_BINS {
            match new_size.checked_mul(2) {
                Some(size) => new_size = size,
                None => break,
            }
        }
        if new_size <= self.bin_size {
            return;
        }

        let old_size = self.bin_size;
        for i in 1..NUM_BINS {
            let new_bin = ((i as u64 * old_size) / new_size) as usize;
            if new_bin == i {
                continue;
            }
            self.bins[new_bin] += self.bins[i];
            self.bins[i] = 0;
        }
        self.bin_size = new_size;

        tracing::trace!(old_size, new_size, "histogram resized");
    }

    /// Estimate the `percent`-th percentile
    ///
    /// Returns 0 for an empty histogram or `percent` outside [0, 100].
    pub fn percentile(&self, percent: f64) -> f64 {
        if !(0.0..=100.0).contains(&percent) || self.num == 0 {
            return 0.0;
        }

        let total = self.num as f64;
        let mut cumulative = 0.0;
        let mut upper_pct = 0.0;
        let mut lower_pct = 0.0;

        let mut reached = None;
        for (i, &count) in self.bins.iter().enumerate() {
            lower_pct = upper_pct;
            cumulative += count as f64;
            upper_pct = 100.0 * (cumulative / total);
            if upper_pct >= percent {
                reached = Some(i);
                break;
            }
        }

        let Some(i) = reached else {
            return 0.0;
        };
        if upper_pct.abs() < 0.01 {
            return 0.0;
        }

        let width = self.bin_size as f64;
        let lower_val = i as f64 * width;
        let upper_val = (i + 1) as f64 * width;

        ((upper_pct - percent) * lower_val + (percent - lower_pct) * upper_val)
            / (upper_pct - lower_pct)
    }

    /// Clear all counts; the bucket width is kept
    pub fn reset(&mut self) {
        self.bins = [0; NUM_BINS];
        self.min = 0.0;
        self.max = 0.0;
        self.sum = 0.0;
        self.num = 0;
    }
}
