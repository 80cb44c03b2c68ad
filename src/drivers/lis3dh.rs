// StrainLog - LIS3DH Accelerometer Driver
//
// Register-level driver over the shared sensor bus. 100 Hz, all axes,
// +/-2 g high-resolution mode; samples are reported in milli-g.

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorType, I2c};

use crate::drivers::registers::RegisterBus;
use crate::events::Acceleration;
use crate::motion::AccelSource;

// LIS3DH register addresses
const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL_REG1: u8 = 0x20;
const REG_CTRL_REG4: u8 = 0x23;
const REG_OUT_X_L: u8 = 0x28;
const AUTO_INCREMENT: u8 = 0x80;
const WHO_AM_I_EXPECTED: u8 = 0x33;

const CTRL_REG1_100HZ_XYZ: u8 = 0x57; // ODR 100 Hz, normal mode, X/Y/Z enabled
const CTRL_REG4_2G_HR: u8 = 0x08; // +/-2 g, high resolution
const CONFIG_SETTLE_MS: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum Lis3dhError<E: Debug> {
    #[error("I2C bus error: {0:?}")]
    Bus(E),
    #[error("accelerometer not found on the bus")]
    DeviceAbsent,
    #[error("unexpected WHO_AM_I value 0x{0:02X}")]
    WrongDevice(u8),
    #[error("accelerometer not initialized")]
    NotInitialized,
}

pub type Error<I2C> = Lis3dhError<<I2C as ErrorType>::Error>;

pub struct Lis3dh<I2C> {
    bus: RegisterBus<I2C>,
    initialized: bool,
}

impl<I2C: I2c> Lis3dh<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
            initialized: false,
        }
    }

    /// Verify the device is reachable and identifies as a LIS3DH.
    pub fn is_connected(&mut self) -> bool {
        matches!(self.bus.read_byte(REG_WHO_AM_I), Ok(WHO_AM_I_EXPECTED))
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn begin(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<I2C>> {
        self.initialized = false;
        let who_am_i = self
            .bus
            .read_byte(REG_WHO_AM_I)
            .map_err(|_| Lis3dhError::DeviceAbsent)?;
        if who_am_i != WHO_AM_I_EXPECTED {
            log::error!("LIS3DH: wrong WHO_AM_I value 0x{who_am_i:02X}");
            return Err(Lis3dhError::WrongDevice(who_am_i));
        }

        self.bus
            .write_byte(REG_CTRL_REG1, CTRL_REG1_100HZ_XYZ)
            .map_err(Lis3dhError::Bus)?;
        self.bus
            .write_byte(REG_CTRL_REG4, CTRL_REG4_2G_HR)
            .map_err(Lis3dhError::Bus)?;
        delay.delay_ms(CONFIG_SETTLE_MS);

        self.initialized = true;
        log::info!("LIS3DH initialised (100 Hz, +/-2 g, high resolution)");
        Ok(())
    }

    /// Burst-read all three axes.
    pub fn read(&mut self) -> Result<Acceleration, Error<I2C>> {
        if !self.initialized {
            return Err(Lis3dhError::NotInitialized);
        }
        let mut raw = [0u8; 6];
        self.bus
            .read_many(REG_OUT_X_L | AUTO_INCREMENT, &mut raw)
            .map_err(Lis3dhError::Bus)?;

        Ok(Acceleration::new(
            to_milli_g(raw[0], raw[1]),
            to_milli_g(raw[2], raw[3]),
            to_milli_g(raw[4], raw[5]),
        ))
    }
}

/// Left-aligned 12-bit output, 1 mg/LSB in high-resolution +/-2 g mode.
fn to_milli_g(lo: u8, hi: u8) -> i32 {
    i32::from(i16::from_le_bytes([lo, hi]) >> 4)
}

impl<I2C> AccelSource for Lis3dh<I2C>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
{
    fn read_accel(&mut self) -> anyhow::Result<Acceleration> {
        Ok(self.read()?)
    }
}
