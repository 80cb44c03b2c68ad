// StrainLog - Strain Bench Operator Commands
//
// Every command is synchronous: it runs to completion (bounded by the ADC
// timeouts) before the monitor loop resumes polling.

use core::fmt;

use anyhow::{ensure, Context};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::{BridgeConfig, ADC_DEFAULT_GAIN, BRIDGE_SATURATION_PERCENT};
use crate::drivers::nau7802::{Gain, Nau7802};
use crate::filters::{RawSource, ReadFilters};
use crate::strain;
use crate::tare::ZeroCalibration;

/// Gains visited by the sweep before returning to the default.
pub const SWEEP_GAINS: [Gain; 4] = [Gain::X1, Gain::X2, Gain::X4, Gain::X8];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    Single,
    Average,
    Median,
    Filtered,
}

impl ReadKind {
    pub fn label(self) -> &'static str {
        match self {
            ReadKind::Single => "Raw",
            ReadKind::Average => "Average",
            ReadKind::Median => "Median",
            ReadKind::Filtered => "Filtered",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StrainReport {
    pub kind: ReadKind,
    pub raw: i32,
    pub zeroed: i32,
    pub voltage: f32,
    pub microstrain: f32,
}

impl fmt::Display for StrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} | Zeroed: {} | Voltage: {:.6} V | Strain: {:.1} ue",
            self.kind.label(),
            self.raw,
            self.zeroed,
            self.voltage,
            self.microstrain
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BridgeReport {
    pub gain: Gain,
    pub raw: i32,
    pub voltage: f32,
    pub full_scale_percent: f32,
    pub saturated: bool,
}

impl fmt::Display for BridgeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bridge balance at gain {}x", self.gain.multiplier())?;
        writeln!(f, "  Raw (filtered): {}", self.raw)?;
        writeln!(f, "  Voltage:        {:.6} V", self.voltage)?;
        write!(f, "  Full scale:     {:.1} %", self.full_scale_percent)?;
        if self.saturated {
            write!(f, "\n  WARNING: near saturation, check bridge wiring or lower the gain")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GainStep {
    pub gain: Gain,
    pub raw: i32,
    pub voltage: f32,
}

pub struct StrainBench<I2C, D> {
    adc: Nau7802<I2C, D>,
    zero: ZeroCalibration,
    bridge: BridgeConfig,
}

impl<I2C, D> StrainBench<I2C, D>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
    D: DelayNs,
{
    pub fn new(adc: Nau7802<I2C, D>, bridge: BridgeConfig) -> Self {
        Self {
            adc,
            zero: ZeroCalibration::new(),
            bridge,
        }
    }

    pub fn adc(&self) -> &Nau7802<I2C, D> {
        &self.adc
    }

    pub fn zero(&self) -> &ZeroCalibration {
        &self.zero
    }

    fn ensure_running(&self) -> anyhow::Result<()> {
        ensure!(self.adc.is_running(), "ADC not initialized");
        Ok(())
    }

    pub fn tare(&mut self) -> anyhow::Result<i32> {
        Ok(self.zero.tare(&mut self.adc, self.bridge.tare_samples)?)
    }

    /// Diagnose and, if needed, restart stalled conversions.
    pub fn restart(&mut self) -> anyhow::Result<bool> {
        self.adc
            .restart_conversions()
            .context("restarting conversions")
    }

    pub fn report(&mut self, kind: ReadKind) -> anyhow::Result<StrainReport> {
        self.ensure_running()?;
        let n = self.bridge.report_samples;
        let raw = match kind {
            ReadKind::Single => self.adc.read_raw(),
            ReadKind::Average => self.adc.read_average(n),
            ReadKind::Median => self.adc.read_median(n),
            ReadKind::Filtered => self.adc.read_filtered(n),
        };
        Ok(self.describe(kind, raw))
    }

    fn describe(&self, kind: ReadKind, raw: i32) -> StrainReport {
        let zeroed = self.zero.zeroed(raw);
        let strain =
            self.adc
                .calculate_strain(zeroed, self.bridge.excitation_voltage, self.bridge.gauge_factor);
        StrainReport {
            kind,
            raw,
            zeroed,
            voltage: self.adc.calculate_voltage(zeroed, self.bridge.reference_voltage),
            microstrain: strain::microstrain(strain),
        }
    }

    /// Single reads every `interval_ms` until `stop` says so. Returns the
    /// number of readings emitted.
    pub fn watch<P, S, E>(
        &mut self,
        pause: &mut P,
        interval_ms: u32,
        mut stop: S,
        mut emit: E,
    ) -> anyhow::Result<usize>
    where
        P: DelayNs,
        S: FnMut() -> bool,
        E: FnMut(&StrainReport),
    {
        self.ensure_running()?;
        let mut count = 0;
        while !stop() {
            let report = self.report(ReadKind::Single)?;
            emit(&report);
            count += 1;
            pause.delay_ms(interval_ms);
        }
        Ok(count)
    }

    /// Filtered reading at the current gain, as a fraction of full scale.
    pub fn bridge_balance(&mut self) -> anyhow::Result<BridgeReport> {
        self.ensure_running()?;
        let raw = self.adc.read_filtered(self.bridge.report_samples);
        let full_scale_percent = strain::full_scale_percent(raw);
        let saturated = full_scale_percent > BRIDGE_SATURATION_PERCENT;
        if saturated {
            log::warn!("Bridge output at {full_scale_percent:.1} % of full scale");
        }
        Ok(BridgeReport {
            gain: self.adc.gain(),
            raw,
            voltage: self.adc.calculate_voltage(raw, self.bridge.reference_voltage),
            full_scale_percent,
            saturated,
        })
    }

    /// Filtered readings at 1x, 2x, 4x and 8x. The default gain is restored
    /// afterwards even when a step fails.
    pub fn gain_sweep(&mut self) -> anyhow::Result<Vec<GainStep>> {
        self.ensure_running()?;
        let steps = self.sweep_steps();
        self.adc
            .set_gain(ADC_DEFAULT_GAIN)
            .context("restoring default gain")?;
        steps
    }

    fn sweep_steps(&mut self) -> anyhow::Result<Vec<GainStep>> {
        let mut steps = Vec::with_capacity(SWEEP_GAINS.len());
        for gain in SWEEP_GAINS {
            self.adc
                .set_gain(gain)
                .with_context(|| format!("setting gain {}x", gain.multiplier()))?;
            let raw = self.adc.read_filtered(self.bridge.report_samples);
            steps.push(GainStep {
                gain,
                raw,
                voltage: self.adc.calculate_voltage(raw, self.bridge.reference_voltage),
            });
        }
        Ok(steps)
    }
}
