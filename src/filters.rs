// StrainLog - Statistical Read Filters
//
// Noise rejection built purely from repeated raw conversions. The filters
// never touch device registers; anything that can produce one raw reading at
// a time gets all three for free.

/// A source of single raw ADC conversions.
pub trait RawSource {
    /// One conversion. Sources absorb their own failures and return 0.
    fn read_raw(&mut self) -> i32;

    /// Whether the source is ready to produce real conversions.
    fn is_running(&self) -> bool {
        true
    }
}

pub const AVERAGE_MIN_SAMPLES: usize = 1;
pub const AVERAGE_MAX_SAMPLES: usize = 50;
pub const MEDIAN_MIN_SAMPLES: usize = 3;
pub const MEDIAN_MAX_SAMPLES: usize = 25;
pub const FILTERED_MIN_SAMPLES: usize = 5;
pub const FILTERED_MAX_SAMPLES: usize = 50;

pub trait ReadFilters: RawSource {
    /// Arithmetic mean of `samples` reads, `samples` clamped to 1..=50.
    fn read_average(&mut self, samples: usize) -> i32 {
        let n = samples.clamp(AVERAGE_MIN_SAMPLES, AVERAGE_MAX_SAMPLES);
        let sum: i64 = (0..n).map(|_| i64::from(self.read_raw())).sum();
        (sum / n as i64) as i32
    }

    /// Median of `samples` reads, `samples` clamped to 3..=25.
    ///
    /// Returns the element at index `n / 2` of the sorted readings for every
    /// `n`, so even counts pick one of the two middle values rather than
    /// averaging them.
    fn read_median(&mut self, samples: usize) -> i32 {
        let n = samples.clamp(MEDIAN_MIN_SAMPLES, MEDIAN_MAX_SAMPLES);
        let mut readings = [0i32; MEDIAN_MAX_SAMPLES];
        for slot in readings.iter_mut().take(n) {
            *slot = self.read_raw();
        }
        let readings = &mut readings[..n];
        readings.sort_unstable();
        readings[n / 2]
    }

    /// Outlier-rejecting mean: `samples` reads (clamped to 5..=50), drop one
    /// minimum and one maximum instance, average the remaining `n - 2`.
    fn read_filtered(&mut self, samples: usize) -> i32 {
        let n = samples.clamp(FILTERED_MIN_SAMPLES, FILTERED_MAX_SAMPLES);
        let mut sum: i64 = 0;
        let mut min = i32::MAX;
        let mut max = i32::MIN;

        for _ in 0..n {
            let value = self.read_raw();
            sum += i64::from(value);
            min = min.min(value);
            max = max.max(value);
        }

        sum -= i64::from(min) + i64::from(max);
        (sum / (n as i64 - 2)) as i32
    }
}

impl<T: RawSource + ?Sized> ReadFilters for T {}
