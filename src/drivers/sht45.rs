// StrainLog - SHT45 Temperature/Humidity Driver
//
// Command-style device: no register pointer, each measurement is a command
// write followed by a 6-byte read (two CRC-protected words).

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorType, I2c};

use crate::drivers::registers::RegisterBus;
use crate::events::Climate;
use crate::motion::ClimateSource;

const CMD_SOFT_RESET: u8 = 0x94;
const CMD_MEASURE_HIGH_PRECISION: u8 = 0xFD;
const RESET_MS: u32 = 10;
const MEASURE_MS: u32 = 10;

const CRC_POLYNOMIAL: u8 = 0x31;
const CRC_INIT: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    Temperature,
    Humidity,
}

#[derive(Debug, thiserror::Error)]
pub enum Sht45Error<E: Debug> {
    #[error("I2C bus error: {0:?}")]
    Bus(E),
    #[error("sensor not found on the bus")]
    DeviceAbsent,
    #[error("{0:?} CRC mismatch")]
    Crc(Word),
    #[error("sensor not initialized")]
    NotInitialized,
}

pub type Error<I2C> = Sht45Error<<I2C as ErrorType>::Error>;

/// Sensirion CRC-8: polynomial x^8 + x^5 + x^4 + 1, init 0xFF.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC_INIT;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC_POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}

pub struct Sht45<I2C, D> {
    bus: RegisterBus<I2C>,
    delay: D,
    initialized: bool,
    last: Option<Climate>,
}

impl<I2C, D> Sht45<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, address: u8, delay: D) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
            delay,
            initialized: false,
            last: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Values from the last successful measurement.
    pub fn last(&self) -> Option<Climate> {
        self.last
    }

    pub fn begin(&mut self) -> Result<(), Error<I2C>> {
        self.initialized = false;
        self.bus
            .write_raw(&[CMD_SOFT_RESET])
            .map_err(|_| Sht45Error::DeviceAbsent)?;
        self.delay.delay_ms(RESET_MS);
        self.initialized = true;
        log::info!("SHT45 initialised");
        Ok(())
    }

    /// One high-precision measurement. A CRC mismatch rejects the whole
    /// transfer and the previous values are kept.
    pub fn measure(&mut self) -> Result<Climate, Error<I2C>> {
        if !self.initialized {
            return Err(Sht45Error::NotInitialized);
        }
        self.bus
            .write_raw(&[CMD_MEASURE_HIGH_PRECISION])
            .map_err(Sht45Error::Bus)?;
        self.delay.delay_ms(MEASURE_MS);

        let mut data = [0u8; 6];
        self.bus.read_raw(&mut data).map_err(Sht45Error::Bus)?;

        if crc8(&data[0..2]) != data[2] {
            log::warn!("SHT45: temperature CRC error");
            return Err(Sht45Error::Crc(Word::Temperature));
        }
        if crc8(&data[3..5]) != data[5] {
            log::warn!("SHT45: humidity CRC error");
            return Err(Sht45Error::Crc(Word::Humidity));
        }

        let raw_t = f32::from(u16::from_be_bytes([data[0], data[1]]));
        let raw_rh = f32::from(u16::from_be_bytes([data[3], data[4]]));
        let climate = Climate {
            temperature_c: -45.0 + 175.0 * raw_t / 65535.0,
            humidity_pct: 100.0 * raw_rh / 65535.0,
        };
        self.last = Some(climate);
        Ok(climate)
    }
}

impl<I2C, D> ClimateSource for Sht45<I2C, D>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
    D: DelayNs,
{
    /// A corrupted transfer falls back to the previous reading, if any.
    fn read_climate(&mut self) -> anyhow::Result<Climate> {
        match self.measure() {
            Ok(climate) => Ok(climate),
            Err(Sht45Error::Crc(word)) => match self.last {
                Some(previous) => {
                    log::warn!("SHT45: {word:?} CRC error, reusing previous reading");
                    Ok(previous)
                }
                None => Err(Sht45Error::<I2C::Error>::Crc(word).into()),
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    const ADDR: u8 = 0x44;

    fn measurement(payload: [u8; 6]) -> [Transaction; 2] {
        [
            Transaction::write(ADDR, vec![CMD_MEASURE_HIGH_PRECISION]),
            Transaction::read(ADDR, payload.to_vec()),
        ]
    }

    #[test]
    fn crc_reference_value() {
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
    }

    #[test]
    fn measure_converts_both_words() {
        let mut expectations = vec![Transaction::write(ADDR, vec![CMD_SOFT_RESET])];
        expectations.extend(measurement([0x66, 0x66, 0x93, 0x80, 0x00, 0xA2]));
        let mut i2c = I2cMock::new(&expectations);
        let mut sht = Sht45::new(i2c.clone(), ADDR, NoopDelay::new());

        sht.begin().unwrap();
        let climate = sht.measure().unwrap();
        assert!((climate.temperature_c - 25.0).abs() < 0.01);
        assert!((climate.humidity_pct - 50.0).abs() < 0.01);
        i2c.done();
    }

    #[test]
    fn crc_mismatch_keeps_previous_values() {
        let mut expectations = vec![Transaction::write(ADDR, vec![CMD_SOFT_RESET])];
        expectations.extend(measurement([0x66, 0x66, 0x93, 0x80, 0x00, 0xA2]));
        expectations.extend(measurement([0x00, 0x00, 0x00, 0x80, 0x00, 0xA2]));
        expectations.extend(measurement([0x66, 0x66, 0x93, 0x80, 0x00, 0x00]));
        let mut i2c = I2cMock::new(&expectations);
        let mut sht = Sht45::new(i2c.clone(), ADDR, NoopDelay::new());

        sht.begin().unwrap();
        let good = sht.measure().unwrap();
        assert!(matches!(sht.measure(), Err(Sht45Error::Crc(Word::Temperature))));
        assert!(matches!(sht.measure(), Err(Sht45Error::Crc(Word::Humidity))));
        assert_eq!(sht.last(), Some(good));
        i2c.done();
    }

    #[test]
    fn measure_requires_begin() {
        let expectations: [Transaction; 0] = [];
        let mut i2c = I2cMock::new(&expectations);
        let mut sht = Sht45::new(i2c.clone(), ADDR, NoopDelay::new());
        assert!(matches!(sht.measure(), Err(Sht45Error::NotInitialized)));
        i2c.done();
    }

    #[test]
    fn climate_source_reuses_previous_reading_on_crc_error() {
        let mut expectations = vec![Transaction::write(ADDR, vec![CMD_SOFT_RESET])];
        expectations.extend(measurement([0x00, 0x00, 0x00, 0x80, 0x00, 0xA2]));
        expectations.extend(measurement([0x66, 0x66, 0x93, 0x80, 0x00, 0xA2]));
        expectations.extend(measurement([0x66, 0x66, 0x93, 0x80, 0x00, 0x00]));
        let mut i2c = I2cMock::new(&expectations);
        let mut sht = Sht45::new(i2c.clone(), ADDR, NoopDelay::new());

        sht.begin().unwrap();
        assert!(sht.read_climate().is_err());
        let good = sht.read_climate().unwrap();
        assert_eq!(sht.read_climate().unwrap(), good);
        i2c.done();
    }
}
