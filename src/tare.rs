// StrainLog - Calibration / Tare Unit
//
// Holds the zero-load baseline. The offset is only ever replaced by an
// explicit operator tare; drift between tares is accepted.

use crate::filters::{RawSource, ReadFilters};

#[derive(Debug, thiserror::Error)]
#[error("ADC is not running")]
pub struct NotRunning;

#[derive(Debug, Default)]
pub struct ZeroCalibration {
    zero_offset: i32,
}

impl ZeroCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zero_offset(&self) -> i32 {
        self.zero_offset
    }

    /// Capture a new baseline from an outlier-rejecting average.
    pub fn tare<S>(&mut self, source: &mut S, samples: usize) -> Result<i32, NotRunning>
    where
        S: RawSource + ?Sized,
    {
        if !source.is_running() {
            log::warn!("Tare skipped: ADC not initialized");
            return Err(NotRunning);
        }
        log::info!("Taring with {samples} samples (outliers removed)...");
        self.zero_offset = source.read_filtered(samples);
        log::info!("Zero offset set to {}", self.zero_offset);
        Ok(self.zero_offset)
    }

    /// One fresh conversion relative to the baseline.
    pub fn reading<S>(&self, source: &mut S) -> i32
    where
        S: RawSource + ?Sized,
    {
        self.zeroed(source.read_raw())
    }

    pub fn zeroed(&self, raw: i32) -> i32 {
        raw - self.zero_offset
    }
}
