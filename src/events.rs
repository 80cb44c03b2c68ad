// StrainLog - System Events & Data Types

use core::fmt;

use heapless::Vec;

use crate::config::EVENT_SAMPLE_COUNT;

// ---------------------------------------------------------------------------
// Acceleration (3-axis reading from the LIS3DH, milli-g)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Acceleration {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Acceleration {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Largest absolute axis value, the quantity compared against the
    /// event threshold.
    pub fn peak(&self) -> i32 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }
}

/// One timestamped accelerometer reading. Axis values are signed milli-g.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelSample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub timestamp_ms: u64,
}

impl AccelSample {
    pub fn new(accel: Acceleration, timestamp_ms: u64) -> Self {
        Self {
            x: accel.x,
            y: accel.y,
            z: accel.z,
            timestamp_ms,
        }
    }

    pub fn acceleration(&self) -> Acceleration {
        Acceleration::new(self.x, self.y, self.z)
    }

    pub fn peak(&self) -> i32 {
        self.acceleration().peak()
    }
}

// ---------------------------------------------------------------------------
// Ambient conditions (SHT45)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Climate {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

// ---------------------------------------------------------------------------
// Persisted event record
// ---------------------------------------------------------------------------

/// Burst captured after a threshold crossing. Built once after the burst
/// completes and written as a single file.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub sequence: u32,
    pub timestamp: String,
    pub climate: Option<Climate>,
    /// Entry 0 is the triggering sample.
    pub samples: Vec<AccelSample, EVENT_SAMPLE_COUNT>,
    /// Slots whose read kept failing and repeat the previous sample.
    pub held_samples: usize,
}

/// Milli-g as g with exactly three decimals, without float rounding.
pub struct MilliG(pub i32);

impl fmt::Display for MilliG {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:03}", abs / 1000, abs % 1000)
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EVENT {}", self.sequence)?;
        writeln!(f, "Timestamp: {}", self.timestamp)?;
        match self.climate {
            Some(c) => {
                writeln!(f, "Temperature: {:.2} C", c.temperature_c)?;
                writeln!(f, "Humidity: {:.2} %", c.humidity_pct)?;
            }
            None => {
                writeln!(f, "Temperature: n/a")?;
                writeln!(f, "Humidity: n/a")?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Sample, X(g), Y(g), Z(g)")?;
        for (i, s) in self.samples.iter().enumerate() {
            writeln!(f, "{}, {}, {}, {}", i + 1, MilliG(s.x), MilliG(s.y), MilliG(s.z))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Console Commands (console reader -> monitor loop)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tare,
    RestartConversions,
    ReadRaw,
    ReadAverage,
    ReadMedian,
    ReadFiltered,
    WatchStrain,
    BridgeBalance,
    GainSweep,
    DisplayEvents,
    ClearEvents,
    ShowTime,
    Help,
}

impl Command {
    /// Map a single console key (case-insensitive) to a command.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'z' => Some(Self::Tare),
            'x' => Some(Self::RestartConversions),
            'r' => Some(Self::ReadRaw),
            'a' => Some(Self::ReadAverage),
            'm' => Some(Self::ReadMedian),
            'f' => Some(Self::ReadFiltered),
            'w' => Some(Self::WatchStrain),
            'b' => Some(Self::BridgeBalance),
            'g' => Some(Self::GainSweep),
            'd' => Some(Self::DisplayEvents),
            'c' => Some(Self::ClearEvents),
            't' => Some(Self::ShowTime),
            'h' | '?' => Some(Self::Help),
            _ => None,
        }
    }
}

pub const HELP_TEXT: &str = "\
--- Serial Commands ---
  z - Tare (zero) the strain gauge
  x - Restart stalled ADC conversions
  r - Single raw reading
  a - Averaged reading
  m - Median reading
  f - Filtered reading (outliers removed)
  w - Watch strain continuously (any key stops)
  b - Bridge balance diagnostic
  g - Gain sweep (1x/2x/4x/8x, back to 128x)
  d - Display all stored events
  c - Clear all events from SD card
  t - Display current time
  h - This help
-----------------------";
