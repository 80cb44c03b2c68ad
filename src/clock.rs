// StrainLog - Time sources

use std::time::{Instant, SystemTime};

use chrono::{DateTime, Datelike, FixedOffset, Utc};

use crate::config::{CLOCK_VALID_FROM_YEAR, TIMEZONE_LABEL, UTC_OFFSET_SECS};

pub const TIME_NOT_SET: &str = "Time not set";

/// Monotonic and wall-clock time as seen by the event pipeline.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin (boot).
    fn monotonic_ms(&self) -> u64;

    fn wall_time(&self) -> SystemTime;

    /// Wall time formatted for event headers.
    fn timestamp(&self) -> String {
        format_timestamp(self.wall_time())
    }
}

/// `std::time` backed clock. On the device `SystemTime` is the newlib clock,
/// set externally by time sync.
pub struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    fn wall_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// `YYYY-MM-DD HH:MM:SS EST`, or [`TIME_NOT_SET`] while the clock still
/// reports a year before it could have been synced.
pub fn format_timestamp(time: SystemTime) -> String {
    let Some(offset) = FixedOffset::east_opt(UTC_OFFSET_SECS) else {
        return TIME_NOT_SET.into();
    };
    let local = DateTime::<Utc>::from(time).with_timezone(&offset);
    if local.year() < CLOCK_VALID_FROM_YEAR {
        return TIME_NOT_SET.into();
    }
    format!("{} {TIMEZONE_LABEL}", local.format("%Y-%m-%d %H:%M:%S"))
}
