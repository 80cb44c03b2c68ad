// StrainLog - NAU7802 Register Map
//
// Each control register is a `Copy` bitfield with named accessors. Builders
// return a new value so every update is an explicit read-modify-write through
// `RegisterBus::modify`.

use core::fmt;

use crate::drivers::registers::Register;

pub const REG_ADCO_B2: u8 = 0x12; // Conversion result, MSB first
pub const REG_REVISION_ID: u8 = 0x1F;
pub const REVISION_ID_EXPECTED: u8 = 0x0F; // Low nibble

const fn with_bit(bits: u8, mask: u8, on: bool) -> u8 {
    if on {
        bits | mask
    } else {
        bits & !mask
    }
}

// ---------------------------------------------------------------------------
// PU_CTRL (0x00): reset, power rails, cycle start, conversion ready
// ---------------------------------------------------------------------------
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct PuCtrl(u8);

impl PuCtrl {
    const RR: u8 = 1 << 0;
    const PUD: u8 = 1 << 1;
    const PUA: u8 = 1 << 2;
    const PUR: u8 = 1 << 3;
    const CS: u8 = 1 << 4;
    const CR: u8 = 1 << 5;
    const AVDDS: u8 = 1 << 7;

    pub fn register_reset(self) -> bool {
        self.0 & Self::RR != 0
    }

    pub fn digital_powered(self) -> bool {
        self.0 & Self::PUD != 0
    }

    pub fn analog_powered(self) -> bool {
        self.0 & Self::PUA != 0
    }

    /// Power-up ready, set by the device once both rails are stable.
    pub fn power_ready(self) -> bool {
        self.0 & Self::PUR != 0
    }

    pub fn cycle_start(self) -> bool {
        self.0 & Self::CS != 0
    }

    /// Conversion-ready flag.
    pub fn conversion_ready(self) -> bool {
        self.0 & Self::CR != 0
    }

    pub fn internal_ldo(self) -> bool {
        self.0 & Self::AVDDS != 0
    }

    pub fn with_register_reset(self, on: bool) -> Self {
        Self(with_bit(self.0, Self::RR, on))
    }

    pub fn with_power(self, on: bool) -> Self {
        Self(with_bit(self.0, Self::PUD | Self::PUA, on))
    }

    pub fn with_cycle_start(self, on: bool) -> Self {
        Self(with_bit(self.0, Self::CS, on))
    }

    pub fn with_internal_ldo(self, on: bool) -> Self {
        Self(with_bit(self.0, Self::AVDDS, on))
    }
}

impl Register for PuCtrl {
    const ADDR: u8 = 0x00;

    fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    fn bits(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PuCtrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:02X} (CS={}, CR={}, PUA={}, PUD={})",
            self.0,
            u8::from(self.cycle_start()),
            u8::from(self.conversion_ready()),
            u8::from(self.analog_powered()),
            u8::from(self.digital_powered()),
        )
    }
}

impl fmt::Debug for PuCtrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PuCtrl({self})")
    }
}

// ---------------------------------------------------------------------------
// CTRL1 (0x01): PGA gain, LDO voltage
// ---------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ctrl1(u8);

impl Ctrl1 {
    const GAIN_MASK: u8 = 0b0000_0111;
    const VLDO_MASK: u8 = 0b0011_1000;
    const VLDO_SHIFT: u8 = 3;

    pub fn gain(self) -> Gain {
        Gain::from_code(self.0 & Self::GAIN_MASK)
    }

    pub fn ldo(self) -> LdoVoltage {
        LdoVoltage::from_code((self.0 & Self::VLDO_MASK) >> Self::VLDO_SHIFT)
    }

    pub fn with_gain(self, gain: Gain) -> Self {
        Self((self.0 & !Self::GAIN_MASK) | gain.code())
    }

    pub fn with_ldo(self, ldo: LdoVoltage) -> Self {
        Self((self.0 & !Self::VLDO_MASK) | (ldo.code() << Self::VLDO_SHIFT))
    }
}

impl Register for Ctrl1 {
    const ADDR: u8 = 0x01;

    fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    fn bits(self) -> u8 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// CTRL2 (0x02): calibration start/error, conversion rate
// ---------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ctrl2(u8);

impl Ctrl2 {
    const CALS: u8 = 1 << 2;
    const CAL_ERR: u8 = 1 << 3;
    const CRS_MASK: u8 = 0b0111_0000;
    const CRS_SHIFT: u8 = 4;

    pub fn calibration_running(self) -> bool {
        self.0 & Self::CALS != 0
    }

    pub fn calibration_error(self) -> bool {
        self.0 & Self::CAL_ERR != 0
    }

    pub fn sample_rate(self) -> Option<SampleRate> {
        SampleRate::from_code((self.0 & Self::CRS_MASK) >> Self::CRS_SHIFT)
    }

    pub fn with_calibration_start(self) -> Self {
        Self(self.0 | Self::CALS)
    }

    pub fn with_sample_rate(self, rate: SampleRate) -> Self {
        Self((self.0 & !Self::CRS_MASK) | (rate.code() << Self::CRS_SHIFT))
    }
}

impl Register for Ctrl2 {
    const ADDR: u8 = 0x02;

    fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    fn bits(self) -> u8 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// POWER (0x1C): PGA output bypass capacitor / LDO mode
// ---------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PowerCtrl(u8);

impl PowerCtrl {
    const PGA_CAP_EN: u8 = 1 << 7;

    pub fn pga_cap_enabled(self) -> bool {
        self.0 & Self::PGA_CAP_EN != 0
    }

    pub fn with_pga_cap(self, on: bool) -> Self {
        Self(with_bit(self.0, Self::PGA_CAP_EN, on))
    }
}

impl Register for PowerCtrl {
    const ADDR: u8 = 0x1C;

    fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    fn bits(self) -> u8 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// Programmable gain. The discriminant is the gain exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Gain {
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
    X32 = 5,
    X64 = 6,
    X128 = 7,
}

impl Gain {
    pub const ALL: [Gain; 8] = [
        Gain::X1,
        Gain::X2,
        Gain::X4,
        Gain::X8,
        Gain::X16,
        Gain::X32,
        Gain::X64,
        Gain::X128,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn exponent(self) -> u32 {
        self as u32
    }

    pub fn multiplier(self) -> u32 {
        1 << self.exponent()
    }

    pub fn from_code(code: u8) -> Self {
        Self::ALL[usize::from(code & 0x07)]
    }
}

/// Conversion rate. 320 SPS uses code 0b111; 160 SPS is not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Sps10,
    Sps20,
    Sps40,
    Sps80,
    Sps320,
}

impl SampleRate {
    pub fn code(self) -> u8 {
        match self {
            Self::Sps10 => 0,
            Self::Sps20 => 1,
            Self::Sps40 => 2,
            Self::Sps80 => 3,
            Self::Sps320 => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Sps10),
            1 => Some(Self::Sps20),
            2 => Some(Self::Sps40),
            3 => Some(Self::Sps80),
            7 => Some(Self::Sps320),
            _ => None,
        }
    }

    pub fn hz(self) -> u32 {
        match self {
            Self::Sps10 => 10,
            Self::Sps20 => 20,
            Self::Sps40 => 40,
            Self::Sps80 => 80,
            Self::Sps320 => 320,
        }
    }

    /// Time between conversion-ready events, rounded up.
    pub fn period_ms(self) -> u32 {
        1000u32.div_ceil(self.hz())
    }

    /// How long a reader waits for conversion-ready before declaring a stall.
    pub fn ready_timeout_ms(self) -> u32 {
        self.period_ms() * 5
    }

    /// How long a reader watches for the ready flag to drop after a read.
    pub fn clear_window_ms(self) -> u32 {
        self.period_ms() + self.period_ms() / 2
    }
}

/// Internal LDO output, which also serves as the bridge excitation and
/// ADC reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdoVoltage {
    V4_5,
    V4_2,
    V3_9,
    V3_6,
    V3_3,
    V3_0,
    V2_7,
    V2_4,
}

impl LdoVoltage {
    const ALL: [LdoVoltage; 8] = [
        LdoVoltage::V4_5,
        LdoVoltage::V4_2,
        LdoVoltage::V3_9,
        LdoVoltage::V3_6,
        LdoVoltage::V3_3,
        LdoVoltage::V3_0,
        LdoVoltage::V2_7,
        LdoVoltage::V2_4,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Self {
        Self::ALL[usize::from(code & 0x07)]
    }

    pub fn volts(self) -> f32 {
        4.5 - 0.3 * f32::from(self.code())
    }
}
