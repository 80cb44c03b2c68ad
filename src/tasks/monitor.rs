// StrainLog - Monitor Task
//
// The single thread of control. Each 100 ms tick first runs any queued
// console commands, then polls the motion controller, then sleeps for the
// rest of the interval.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::clock::Clock;
use crate::commands::{ReadKind, StrainBench};
use crate::config::*;
use crate::events::{Command, HELP_TEXT};
use crate::input::ConsoleInput;
use crate::motion::{AccelSource, ClimateSource, MotionController, Tick};
use crate::storage::{clear_events, playback_events, EventStore};

/// Thread sleep as a `DelayNs`, for pauses that are not timing-critical.
struct ThreadSleep;

impl DelayNs for ThreadSleep {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

pub struct Monitor<A, C, S, K, D, I2C, BD, W> {
    controller: MotionController<A, C, S, K, D>,
    bench: Option<StrainBench<I2C, BD>>,
    input: ConsoleInput,
    out: W,
}

impl<A, C, S, K, D, I2C, BD, W> Monitor<A, C, S, K, D, I2C, BD, W>
where
    A: AccelSource,
    C: ClimateSource,
    S: EventStore,
    K: Clock,
    D: DelayNs,
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
    BD: DelayNs,
    W: Write,
{
    pub fn new(
        controller: MotionController<A, C, S, K, D>,
        bench: Option<StrainBench<I2C, BD>>,
        input: ConsoleInput,
        out: W,
    ) -> Self {
        Self {
            controller,
            bench,
            input,
            out,
        }
    }

    pub fn controller(&self) -> &MotionController<A, C, S, K, D> {
        &self.controller
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Never returns; the firmware runs until reset.
    pub fn run(mut self) -> ! {
        log::info!("Monitor task started");
        let interval = Duration::from_millis(SENSOR_READ_INTERVAL_MS);
        loop {
            let tick_start = Instant::now();
            self.step();

            // Sleep for the remainder of the polling interval.
            let elapsed = tick_start.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
    }

    /// One tick: queued commands first, then one motion poll.
    pub fn step(&mut self) -> Tick {
        while let Some(command) = self.input.next_command() {
            if let Err(e) = self.handle(command) {
                log::warn!("{command:?} failed: {e:#}");
                let _ = writeln!(self.out, "Error: {e:#}");
            }
        }
        self.controller.poll()
    }

    pub fn handle(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Tare => {
                let offset = self.bench()?.tare()?;
                writeln!(self.out, "Zero offset set to {offset}")?;
            }
            Command::RestartConversions => {
                let ready = self.bench()?.restart()?;
                let status = if ready { "Data ready" } else { "Still no data ready" };
                writeln!(self.out, "{status}")?;
            }
            Command::ReadRaw => self.print_report(ReadKind::Single)?,
            Command::ReadAverage => self.print_report(ReadKind::Average)?,
            Command::ReadMedian => self.print_report(ReadKind::Median)?,
            Command::ReadFiltered => self.print_report(ReadKind::Filtered)?,
            Command::WatchStrain => self.watch()?,
            Command::BridgeBalance => {
                let report = self.bench()?.bridge_balance()?;
                writeln!(self.out, "{report}")?;
            }
            Command::GainSweep => {
                let steps = self.bench()?.gain_sweep()?;
                for step in steps {
                    writeln!(
                        self.out,
                        "Gain {:>3}x: raw {:>9} | {:.6} V",
                        step.gain.multiplier(),
                        step.raw,
                        step.voltage
                    )?;
                }
                writeln!(self.out, "Gain restored to {}x", ADC_DEFAULT_GAIN.multiplier())?;
            }
            Command::DisplayEvents => {
                let config = self.controller.config().clone();
                playback_events(
                    self.controller.store_mut(),
                    &config.events_dir,
                    &config.event_prefix,
                    &mut self.out,
                )?;
            }
            Command::ClearEvents => {
                writeln!(self.out, "\n=== CLEARING SD CARD ===")?;
                let dir = self.controller.config().events_dir.clone();
                let removed = clear_events(self.controller.store_mut(), &dir)?;
                writeln!(self.out, "=== SD CARD CLEARED ({removed} files) ===\n")?;
            }
            Command::ShowTime => {
                writeln!(self.out, "Current time: {}", self.controller.clock().timestamp())?;
            }
            Command::Help => writeln!(self.out, "{HELP_TEXT}")?,
        }
        Ok(())
    }

    fn bench(&mut self) -> anyhow::Result<&mut StrainBench<I2C, BD>> {
        self.bench.as_mut().ok_or_else(|| anyhow!("ADC unavailable"))
    }

    fn print_report(&mut self, kind: ReadKind) -> anyhow::Result<()> {
        let report = self.bench()?.report(kind)?;
        writeln!(self.out, "{report}")?;
        Ok(())
    }

    fn watch(&mut self) -> anyhow::Result<()> {
        let Self {
            bench, input, out, ..
        } = self;
        let bench = bench.as_mut().ok_or_else(|| anyhow!("ADC unavailable"))?;

        writeln!(out, "Watching strain, press any key to stop...")?;
        let count = bench.watch(
            &mut ThreadSleep,
            STRAIN_WATCH_INTERVAL_MS,
            || input.key_pressed(),
            |report| {
                let _ = writeln!(out, "{report}");
            },
        )?;
        log::debug!("Strain watch stopped after {count} readings");
        Ok(())
    }
}
