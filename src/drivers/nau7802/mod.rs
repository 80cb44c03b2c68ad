// StrainLog - NAU7802 24-bit ADC Driver
//
// Register-level driver for the strain-gauge bridge ADC. Conversions complete
// on the device's own clock; readers wait for the conversion-ready flag with a
// bounded poll, recover once from a stalled converter, and always leave the
// device in a state where the next read sees a fresh conversion.
//
// Lifecycle: Uninitialized -> PoweringUp -> Configuring -> Calibrating -> Running.

mod regs;

pub use regs::{Ctrl1, Ctrl2, Gain, LdoVoltage, PowerCtrl, PuCtrl, SampleRate};

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorType, I2c};

use crate::config::*;
use crate::drivers::poll::poll_until;
use crate::drivers::registers::RegisterBus;
use crate::filters::RawSource;
use crate::strain;

use regs::{REG_ADCO_B2, REG_REVISION_ID, REVISION_ID_EXPECTED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcState {
    Uninitialized,
    PoweringUp,
    Configuring,
    Calibrating,
    Running,
}

#[derive(Debug, thiserror::Error)]
pub enum Nau7802Error<E: Debug> {
    #[error("I2C bus error: {0:?}")]
    Bus(E),
    #[error("device not found on the bus")]
    DeviceAbsent,
    #[error("power rails not ready after {0} ms")]
    PowerUpTimeout(u32),
    #[error("AFE self-calibration reported an error")]
    CalibrationFailed,
    #[error("no conversion ready within {0} ms")]
    ConversionTimeout(u32),
    #[error("driver is not running")]
    NotRunning,
}

pub type Error<I2C> = Nau7802Error<<I2C as ErrorType>::Error>;

/// Sign-extend a 24-bit two's-complement conversion result.
pub fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}

pub struct Nau7802<I2C, D> {
    bus: RegisterBus<I2C>,
    delay: D,
    state: AdcState,
    gain: Gain,
    rate: SampleRate,
    ldo: LdoVoltage,
}

impl<I2C, D> Nau7802<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, address: u8, delay: D) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
            delay,
            state: AdcState::Uninitialized,
            gain: ADC_DEFAULT_GAIN,
            rate: ADC_DEFAULT_RATE,
            ldo: LdoVoltage::V3_3,
        }
    }

    pub fn state(&self) -> AdcState {
        self.state
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.rate
    }

    /// Bring the device from any state to `Running`.
    ///
    /// Any failure leaves the driver `Uninitialized`; readers then get the
    /// zero sentinel and the rest of the system carries on without the ADC.
    pub fn begin(&mut self) -> Result<(), Error<I2C>> {
        self.state = AdcState::Uninitialized;
        match self.bring_up() {
            Ok(()) => {
                self.state = AdcState::Running;
                log::info!(
                    "NAU7802: running (gain {}x, {} SPS)",
                    self.gain.multiplier(),
                    self.rate.hz()
                );
                Ok(())
            }
            Err(e) => {
                self.state = AdcState::Uninitialized;
                log::error!("NAU7802: initialisation failed: {e}");
                Err(e)
            }
        }
    }

    fn bring_up(&mut self) -> Result<(), Error<I2C>> {
        if !self.is_connected() {
            return Err(Nau7802Error::DeviceAbsent);
        }
        log::debug!("NAU7802: device detected, resetting");

        // Register reset pulse
        self.bus
            .modify(|r: PuCtrl| r.with_register_reset(true))
            .map_err(Nau7802Error::Bus)?;
        self.delay.delay_ms(ADC_RESET_PULSE_MS);
        self.bus
            .modify(|r: PuCtrl| r.with_register_reset(false))
            .map_err(Nau7802Error::Bus)?;
        self.delay.delay_ms(ADC_RESET_PULSE_MS);

        self.state = AdcState::PoweringUp;
        self.bus
            .modify(|r: PuCtrl| r.with_power(true))
            .map_err(Nau7802Error::Bus)?;
        let bus = &mut self.bus;
        let powered = poll_until(
            &mut self.delay,
            ADC_POWER_UP_TIMEOUT_MS,
            ADC_POLL_INTERVAL_MS,
            || bus.read::<PuCtrl>().map(PuCtrl::power_ready),
        )
        .map_err(Nau7802Error::Bus)?;
        if !powered {
            return Err(Nau7802Error::PowerUpTimeout(ADC_POWER_UP_TIMEOUT_MS));
        }

        self.state = AdcState::Configuring;
        self.bus
            .modify(|r: PowerCtrl| r.with_pga_cap(true))
            .map_err(Nau7802Error::Bus)?;
        let ldo = self.ldo;
        self.bus
            .modify(|r: Ctrl1| r.with_ldo(ldo))
            .map_err(Nau7802Error::Bus)?;
        self.bus
            .modify(|r: PuCtrl| r.with_internal_ldo(true))
            .map_err(Nau7802Error::Bus)?;
        self.delay.delay_ms(ADC_LDO_SETTLE_MS);

        self.set_gain(ADC_DEFAULT_GAIN)?;
        self.set_sample_rate(ADC_DEFAULT_RATE)?;

        self.state = AdcState::Calibrating;
        self.calibrate_afe()?;

        self.bus
            .modify(|r: PuCtrl| r.with_cycle_start(true))
            .map_err(Nau7802Error::Bus)?;
        let status = self.bus.read::<PuCtrl>().map_err(Nau7802Error::Bus)?;
        log::debug!("NAU7802: conversions started, PU_CTRL = {status}");
        Ok(())
    }

    /// Presence check: the revision register answers with the expected ID.
    pub fn is_connected(&mut self) -> bool {
        match self.bus.read_byte(REG_REVISION_ID) {
            Ok(id) => id & 0x0F == REVISION_ID_EXPECTED,
            Err(_) => false,
        }
    }

    pub fn is_data_ready(&mut self) -> Result<bool, Error<I2C>> {
        self.bus
            .read::<PuCtrl>()
            .map(PuCtrl::conversion_ready)
            .map_err(Nau7802Error::Bus)
    }

    pub fn status(&mut self) -> Result<PuCtrl, Error<I2C>> {
        self.bus.read::<PuCtrl>().map_err(Nau7802Error::Bus)
    }

    /// Select the PGA gain. Blocks for the settle period so the next read
    /// already reflects the new gain.
    ///
    /// Configuration only: taking `&mut self` means no reader can be waiting
    /// on a conversion while this runs.
    pub fn set_gain(&mut self, gain: Gain) -> Result<(), Error<I2C>> {
        self.bus
            .modify(|r: Ctrl1| r.with_gain(gain))
            .map_err(Nau7802Error::Bus)?;
        self.gain = gain;
        self.delay.delay_ms(ADC_GAIN_SETTLE_MS);
        Ok(())
    }

    pub fn set_sample_rate(&mut self, rate: SampleRate) -> Result<(), Error<I2C>> {
        self.bus
            .modify(|r: Ctrl2| r.with_sample_rate(rate))
            .map_err(Nau7802Error::Bus)?;
        self.rate = rate;
        Ok(())
    }

    /// Run the internal offset calibration of the analog front end.
    pub fn calibrate_afe(&mut self) -> Result<(), Error<I2C>> {
        self.bus
            .modify(|r: Ctrl2| r.with_calibration_start())
            .map_err(Nau7802Error::Bus)?;
        self.delay.delay_ms(ADC_CALIBRATION_SETTLE_MS);

        let ctrl2 = self.bus.read::<Ctrl2>().map_err(Nau7802Error::Bus)?;
        if ctrl2.calibration_error() {
            return Err(Nau7802Error::CalibrationFailed);
        }
        Ok(())
    }

    /// Wait for one conversion and return it.
    ///
    /// On timeout the converter is kicked once (cycle start re-asserted) and
    /// `ConversionTimeout` is returned without waiting any further.
    pub fn try_read_raw(&mut self) -> Result<i32, Error<I2C>> {
        if self.state != AdcState::Running {
            return Err(Nau7802Error::NotRunning);
        }

        let timeout = self.rate.ready_timeout_ms();
        let bus = &mut self.bus;
        let ready = poll_until(&mut self.delay, timeout, ADC_POLL_INTERVAL_MS, || {
            bus.read::<PuCtrl>().map(PuCtrl::conversion_ready)
        })
        .map_err(Nau7802Error::Bus)?;

        if !ready {
            let status = self.status()?;
            log::warn!("NAU7802: data timeout, PU_CTRL = {status}");
            self.kick_conversions()?;
            return Err(Nau7802Error::ConversionTimeout(timeout));
        }

        let mut data = [0u8; 3];
        self.bus
            .read_many(REG_ADCO_B2, &mut data)
            .map_err(Nau7802Error::Bus)?;
        let value = sign_extend_24(u32::from_be_bytes([0, data[0], data[1], data[2]]));

        self.await_next_cycle()?;
        Ok(value)
    }

    /// Wait for the ready flag to drop so the next reader gets a new
    /// conversion. Fast rates may re-assert before we look; that is logged,
    /// not treated as an error.
    fn await_next_cycle(&mut self) -> Result<(), Error<I2C>> {
        self.delay.delay_ms(ADC_CLEAR_SETTLE_MS);

        let bus = &mut self.bus;
        let cleared = poll_until(
            &mut self.delay,
            self.rate.clear_window_ms(),
            ADC_POLL_INTERVAL_MS,
            || bus.read::<PuCtrl>().map(|r| !r.conversion_ready()),
        )
        .map_err(Nau7802Error::Bus)?;

        if !cleared {
            log::debug!("NAU7802: conversion-ready never dropped after read");
        }
        Ok(())
    }

    fn kick_conversions(&mut self) -> Result<bool, Error<I2C>> {
        log::info!("NAU7802: attempting to restart conversions");
        self.bus
            .modify(|r: PuCtrl| r.with_cycle_start(true))
            .map_err(Nau7802Error::Bus)?;
        self.delay.delay_ms(ADC_RESTART_WAIT_MS);

        let ready = self.is_data_ready()?;
        if ready {
            log::info!("NAU7802: conversions restarted");
        } else {
            log::warn!("NAU7802: still no data ready");
        }
        Ok(ready)
    }

    /// Operator diagnostic: report the conversion status bits, restart the
    /// converter if cycle start has dropped, and say whether data is ready.
    pub fn restart_conversions(&mut self) -> Result<bool, Error<I2C>> {
        let status = self.status()?;
        log::info!("NAU7802: PU_CTRL = {status}");

        if !status.cycle_start() {
            log::info!("NAU7802: cycle start not set, starting conversions");
            self.bus
                .modify(|r: PuCtrl| r.with_cycle_start(true))
                .map_err(Nau7802Error::Bus)?;
            self.delay.delay_ms(ADC_RESTART_WAIT_MS);
        }

        let ready = self.is_data_ready()?;
        if ready {
            log::info!("NAU7802: data ready");
        } else {
            log::warn!("NAU7802: still no data ready");
        }
        Ok(ready)
    }

    /// Bridge output voltage for `raw` at the current gain.
    pub fn calculate_voltage(&self, raw: i32, reference_voltage: f32) -> f32 {
        strain::raw_to_voltage(raw, reference_voltage, self.gain)
    }

    /// Quarter-bridge strain for `raw`, referenced to the LDO voltage.
    pub fn calculate_strain(&self, raw: i32, excitation: f32, gauge_factor: f32) -> f32 {
        let vout = self.calculate_voltage(raw, self.ldo.volts());
        strain::voltage_to_strain(vout, excitation, gauge_factor)
    }

    pub fn release(self) -> (I2C, D) {
        (self.bus.release(), self.delay)
    }
}

impl<I2C, D> RawSource for Nau7802<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// One conversion, or the zero sentinel when none could be read.
    fn read_raw(&mut self) -> i32 {
        match self.try_read_raw() {
            Ok(value) => value,
            Err(Nau7802Error::NotRunning) => {
                log::warn!("NAU7802: not initialized");
                0
            }
            Err(e) => {
                log::warn!("NAU7802: read failed: {e}");
                0
            }
        }
    }

    fn is_running(&self) -> bool {
        self.state == AdcState::Running
    }
}
