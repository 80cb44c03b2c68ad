// StrainLog - Hardware & System Configuration
// Target: Heltec WiFi LoRa 32 V3 (ESP32-S3) receiver board

use crate::drivers::nau7802::{Gain, SampleRate};

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
pub const PIN_I2C_SENSOR_SDA: i32 = 41; // Secondary I2C bus for external sensors
pub const PIN_I2C_SENSOR_SCL: i32 = 42;
pub const PIN_SD_MOSI: i32 = 34;
pub const PIN_SD_MISO: i32 = 33;
pub const PIN_SD_SCK: i32 = 35;
pub const PIN_SD_CS: i32 = 36;

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_SENSOR_FREQ_KHZ: u32 = 400;
pub const I2C_ADDR_NAU7802: u8 = 0x2A;
pub const I2C_ADDR_LIS3DH: u8 = 0x18;
pub const I2C_ADDR_SHT45: u8 = 0x44;

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_CONSOLE: usize = 4096;

// ---------------------------------------------------------------------------
// Motion Monitoring
// ---------------------------------------------------------------------------
pub const SENSOR_READ_INTERVAL_MS: u64 = 100; // Normal polling cadence
pub const ACCEL_THRESHOLD_MG: i32 = 2000; // 2.0 g on any axis
pub const HISTORY_CAPACITY: usize = 20; // Pre-trigger ring
pub const EVENT_SAMPLE_COUNT: usize = 20; // Samples per burst, trigger included
pub const BURST_INTERVAL_MS: u32 = 10; // 100 Hz burst cadence
pub const BURST_READ_ATTEMPTS: u8 = 3; // Per-slot attempts before holding the last sample

// ---------------------------------------------------------------------------
// NAU7802 ADC Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const ADC_DEFAULT_GAIN: Gain = Gain::X128;
pub const ADC_DEFAULT_RATE: SampleRate = SampleRate::Sps10;
pub const ADC_RESET_PULSE_MS: u32 = 10;
pub const ADC_POWER_UP_TIMEOUT_MS: u32 = 200;
pub const ADC_LDO_SETTLE_MS: u32 = 100;
pub const ADC_CALIBRATION_SETTLE_MS: u32 = 500; // Self-calibration takes ~350 ms
pub const ADC_GAIN_SETTLE_MS: u32 = 50;
pub const ADC_RESTART_WAIT_MS: u32 = 100;
pub const ADC_CLEAR_SETTLE_MS: u32 = 2; // Before watching CR drop after a read
pub const ADC_POLL_INTERVAL_MS: u32 = 1;

// ---------------------------------------------------------------------------
// Strain Gauge Bridge
// ---------------------------------------------------------------------------
pub const BRIDGE_REFERENCE_VOLTAGE: f32 = 3.3;
pub const BRIDGE_EXCITATION_VOLTAGE: f32 = 3.3;
pub const GAUGE_FACTOR: f32 = 2.0;
pub const TARE_SAMPLES: usize = 10;
pub const REPORT_SAMPLES: usize = 10;
pub const BRIDGE_SATURATION_PERCENT: f32 = 90.0;
pub const STRAIN_WATCH_INTERVAL_MS: u32 = 200;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------
pub const SD_MOUNT_POINT: &str = "/sdcard";
pub const SD_MAX_OPEN_FILES: usize = 5;
pub const EVENTS_DIR: &str = "/events";
pub const EVENT_FILE_PREFIX: &str = "event ";

// ---------------------------------------------------------------------------
// Wall Clock
// ---------------------------------------------------------------------------
pub const UTC_OFFSET_SECS: i32 = -5 * 3600; // EST
pub const TIMEZONE_LABEL: &str = "EST";
pub const CLOCK_VALID_FROM_YEAR: i32 = 2016; // Earlier years mean the clock was never set

// ---------------------------------------------------------------------------
// Runtime-tunable groups
// ---------------------------------------------------------------------------

/// Motion event trigger and persistence settings.
#[derive(Debug, Clone)]
pub struct MotionConfig {
    pub threshold_mg: i32,
    pub burst_interval_ms: u32,
    pub burst_read_attempts: u8,
    pub events_dir: String,
    pub event_prefix: String,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold_mg: ACCEL_THRESHOLD_MG,
            burst_interval_ms: BURST_INTERVAL_MS,
            burst_read_attempts: BURST_READ_ATTEMPTS,
            events_dir: EVENTS_DIR.into(),
            event_prefix: EVENT_FILE_PREFIX.into(),
        }
    }
}

/// Electrical constants of the strain-gauge bridge.
#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig {
    pub reference_voltage: f32,
    pub excitation_voltage: f32,
    pub gauge_factor: f32,
    pub tare_samples: usize,
    pub report_samples: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            reference_voltage: BRIDGE_REFERENCE_VOLTAGE,
            excitation_voltage: BRIDGE_EXCITATION_VOLTAGE,
            gauge_factor: GAUGE_FACTOR,
            tare_samples: TARE_SAMPLES,
            report_samples: REPORT_SAMPLES,
        }
    }
}
