// StrainLog - Motion Event Controller
//
// Per tick: read the accelerometer, remember the sample, compare the peak
// axis against the threshold. A crossing runs a two-phase capture:
//   fast - fixed-cadence burst into a pre-sized buffer, no I/O, no logging
//   slow - sequence number, climate, formatting, one storage write

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::clock::Clock;
use crate::config::{MotionConfig, EVENT_SAMPLE_COUNT, HISTORY_CAPACITY};
use crate::events::{AccelSample, Acceleration, Climate, EventRecord};
use crate::history::CircularHistory;
use crate::storage::{event_path, EventStore, WriteMode};

pub trait AccelSource {
    fn read_accel(&mut self) -> anyhow::Result<Acceleration>;
}

pub trait ClimateSource {
    fn read_climate(&mut self) -> anyhow::Result<Climate>;
}

impl<T: AccelSource + ?Sized> AccelSource for &mut T {
    fn read_accel(&mut self) -> anyhow::Result<Acceleration> {
        (**self).read_accel()
    }
}

impl<T: ClimateSource + ?Sized> ClimateSource for &mut T {
    fn read_climate(&mut self) -> anyhow::Result<Climate> {
        (**self).read_climate()
    }
}

/// Outcome of one polling tick.
#[derive(Debug)]
pub enum Tick {
    Quiet(AccelSample),
    ReadFailed,
    Event(EventReport),
}

#[derive(Debug)]
pub struct EventReport {
    pub record: EventRecord,
    pub path: String,
    pub saved: bool,
    pub capture_ms: u64,
}

pub struct MotionController<A, C, S, K, D> {
    accel: A,
    climate: C,
    store: S,
    clock: K,
    delay: D,
    config: MotionConfig,
    history: CircularHistory<AccelSample, HISTORY_CAPACITY>,
    burst: Vec<AccelSample, EVENT_SAMPLE_COUNT>,
    events_saved: u32,
    events_lost: u32,
}

impl<A, C, S, K, D> MotionController<A, C, S, K, D>
where
    A: AccelSource,
    C: ClimateSource,
    S: EventStore,
    K: Clock,
    D: DelayNs,
{
    pub fn new(accel: A, climate: C, store: S, clock: K, delay: D, config: MotionConfig) -> Self {
        Self {
            accel,
            climate,
            store,
            clock,
            delay,
            config,
            history: CircularHistory::new(),
            burst: Vec::new(),
            events_saved: 0,
            events_lost: 0,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn history(&self) -> &CircularHistory<AccelSample, HISTORY_CAPACITY> {
        &self.history
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn events_saved(&self) -> u32 {
        self.events_saved
    }

    /// Events captured but not persisted.
    pub fn events_lost(&self) -> u32 {
        self.events_lost
    }

    pub fn poll(&mut self) -> Tick {
        let accel = match self.accel.read_accel() {
            Ok(accel) => accel,
            Err(e) => {
                log::debug!("Accelerometer read failed: {e:#}");
                return Tick::ReadFailed;
            }
        };

        let sample = AccelSample::new(accel, self.clock.monotonic_ms());
        self.history.push(sample);

        if sample.peak() <= self.config.threshold_mg {
            return Tick::Quiet(sample);
        }

        let capture = self.capture_burst(sample);
        Tick::Event(self.persist_burst(capture))
    }

    /// Fast phase. Slot `i` is read at `trigger + i * interval`; a slot that
    /// keeps failing repeats the previous sample.
    fn capture_burst(&mut self, trigger: AccelSample) -> BurstCapture {
        let started = trigger.timestamp_ms;
        let interval = u64::from(self.config.burst_interval_ms);
        let mut capture = BurstCapture::default();

        self.burst.clear();
        let mut last = trigger;
        if self.burst.push(trigger).is_err() {
            return capture;
        }

        for slot in 1..EVENT_SAMPLE_COUNT as u64 {
            self.sleep_until(started + slot * interval);

            let sample = match self.read_slot(&mut capture) {
                Some(accel) => AccelSample::new(accel, self.clock.monotonic_ms()),
                None => {
                    capture.held += 1;
                    AccelSample {
                        timestamp_ms: self.clock.monotonic_ms(),
                        ..last
                    }
                }
            };
            if self.burst.push(sample).is_err() {
                break;
            }
            last = sample;
        }

        capture.elapsed_ms = self.clock.monotonic_ms().saturating_sub(started);
        capture
    }

    fn read_slot(&mut self, capture: &mut BurstCapture) -> Option<Acceleration> {
        for _ in 0..self.config.burst_read_attempts.max(1) {
            match self.accel.read_accel() {
                Ok(accel) => return Some(accel),
                Err(e) => {
                    capture.failed_reads += 1;
                    capture.last_error = Some(e);
                }
            }
        }
        None
    }

    fn sleep_until(&mut self, deadline_ms: u64) {
        let now = self.clock.monotonic_ms();
        if deadline_ms > now {
            self.delay.delay_ms((deadline_ms - now) as u32);
        }
    }

    /// Slow phase. Runs strictly after the burst.
    fn persist_burst(&mut self, capture: BurstCapture) -> EventReport {
        let trigger_peak = self.burst.first().map(AccelSample::peak).unwrap_or(0);
        log::info!(
            "EVENT TRIGGERED: peak {trigger_peak} mg, captured {} samples in {} ms",
            self.burst.len(),
            capture.elapsed_ms
        );
        if let Some(e) = &capture.last_error {
            log::warn!(
                "Burst had {} failed reads, {} samples held (last error: {e:#})",
                capture.failed_reads,
                capture.held
            );
        }

        let dir = self.config.events_dir.clone();
        let sequence = self.store.next_sequence_number(&dir, &self.config.event_prefix);
        let path = event_path(&dir, &self.config.event_prefix, sequence);

        let climate = match self.climate.read_climate() {
            Ok(climate) => Some(climate),
            Err(e) => {
                log::warn!("Climate reading unavailable: {e:#}");
                None
            }
        };

        let record = EventRecord {
            sequence,
            timestamp: self.clock.timestamp(),
            climate,
            samples: self.burst.clone(),
            held_samples: capture.held,
        };

        let save_started = self.clock.monotonic_ms();
        let saved = match self.store.write(&path, &record.to_string(), WriteMode::Overwrite) {
            Ok(()) => {
                self.events_saved += 1;
                log::info!(
                    "Saved to: {path} ({} ms)",
                    self.clock.monotonic_ms().saturating_sub(save_started)
                );
                true
            }
            Err(e) => {
                self.events_lost += 1;
                log::error!("Failed to save event {sequence} to {path}: {e:#}");
                false
            }
        };

        EventReport {
            record,
            path,
            saved,
            capture_ms: capture.elapsed_ms,
        }
    }
}

#[derive(Default)]
struct BurstCapture {
    held: usize,
    failed_reads: u32,
    last_error: Option<anyhow::Error>,
    elapsed_ms: u64,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    /// Clock and delay over one virtual nanosecond counter; clones share it.
    #[derive(Clone, Default)]
    pub(crate) struct FakeTime(Rc<Cell<u64>>);

    impl Clock for FakeTime {
        fn monotonic_ms(&self) -> u64 {
            self.0.get() / 1_000_000
        }

        fn wall_time(&self) -> SystemTime {
            UNIX_EPOCH + Duration::from_secs(1_768_573_800)
        }
    }

    impl DelayNs for FakeTime {
        fn delay_ns(&mut self, ns: u32) {
            self.0.set(self.0.get() + u64::from(ns));
        }
    }

    /// Scripted readings; `None` is a failed read. Empty script reads calm.
    struct ScriptedAccel(VecDeque<Option<Acceleration>>);

    impl ScriptedAccel {
        fn new(script: impl IntoIterator<Item = Option<Acceleration>>) -> Self {
            Self(script.into_iter().collect())
        }
    }

    impl AccelSource for ScriptedAccel {
        fn read_accel(&mut self) -> anyhow::Result<Acceleration> {
            match self.0.pop_front() {
                Some(Some(a)) => Ok(a),
                Some(None) => anyhow::bail!("bus error"),
                None => Ok(calm()),
            }
        }
    }

    struct FixedClimate(Option<Climate>);

    impl ClimateSource for FixedClimate {
        fn read_climate(&mut self) -> anyhow::Result<Climate> {
            self.0.ok_or_else(|| anyhow::anyhow!("sensor absent"))
        }
    }

    fn calm() -> Acceleration {
        Acceleration::new(10, -20, 1000)
    }

    fn controller(
        script: impl IntoIterator<Item = Option<Acceleration>>,
    ) -> MotionController<ScriptedAccel, FixedClimate, MemoryStore, FakeTime, FakeTime> {
        let time = FakeTime::default();
        MotionController::new(
            ScriptedAccel::new(script),
            FixedClimate(Some(Climate {
                temperature_c: 22.0,
                humidity_pct: 45.0,
            })),
            MemoryStore::new(),
            time.clone(),
            time,
            MotionConfig::default(),
        )
    }

    fn expect_event(tick: Tick) -> EventReport {
        match tick {
            Tick::Event(report) => report,
            other => panic!("expected an event, got {other:?}"),
        }
    }

    #[test]
    fn threshold_is_strict() {
        let mut ctl = controller([Some(Acceleration::new(0, 2000, 0))]);
        assert!(matches!(ctl.poll(), Tick::Quiet(_)));
        assert!(ctl.store().files().is_empty());
    }

    #[test]
    fn negative_axis_triggers() {
        let mut ctl = controller([Some(Acceleration::new(0, 0, -2001))]);
        let report = expect_event(ctl.poll());
        assert!(report.saved);
        assert_eq!(report.record.samples[0].z, -2001);
    }

    #[test]
    fn burst_follows_fixed_cadence() {
        let mut ctl = controller([Some(Acceleration::new(2500, 0, 0))]);
        let report = expect_event(ctl.poll());

        let samples = &report.record.samples;
        assert_eq!(samples.len(), EVENT_SAMPLE_COUNT);
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(s.timestamp_ms, i as u64 * 10);
        }
        assert_eq!(report.capture_ms, 190);
        assert_eq!(report.path, "/events/event 1.txt");
    }

    #[test]
    fn failed_slot_is_retried() {
        let trigger = Acceleration::new(2500, 0, 0);
        let mut ctl = controller([Some(trigger), None, None, Some(Acceleration::new(7, 8, 9))]);
        let report = expect_event(ctl.poll());

        assert_eq!(report.record.held_samples, 0);
        assert_eq!(report.record.samples[1].acceleration(), Acceleration::new(7, 8, 9));
    }

    #[test]
    fn exhausted_slot_holds_previous_sample() {
        let trigger = Acceleration::new(2500, 0, 0);
        let mut ctl = controller([Some(trigger), None, None, None]);
        let report = expect_event(ctl.poll());

        let samples = &report.record.samples;
        assert_eq!(samples.len(), EVENT_SAMPLE_COUNT);
        assert_eq!(report.record.held_samples, 1);
        assert_eq!(samples[1].acceleration(), trigger);
        assert_eq!(samples[1].timestamp_ms, 10);
        assert_eq!(samples[2].acceleration(), calm());
    }

    #[test]
    fn sequence_numbers_continue_from_store() {
        let mut ctl = controller([
            Some(Acceleration::new(3000, 0, 0)),
            None,
            Some(Acceleration::new(0, 3000, 0)),
        ]);
        ctl.store_mut()
            .write("/events/event 4.txt", "old", WriteMode::Overwrite)
            .unwrap();

        let first = expect_event(ctl.poll());
        assert_eq!(first.record.sequence, 5);
        assert_eq!(first.record.samples[1].acceleration(), Acceleration::new(0, 3000, 0));

        assert!(matches!(ctl.poll(), Tick::Quiet(_)));
        assert_eq!(ctl.store().files().len(), 2);
        assert_eq!(ctl.events_saved(), 1);
    }

    #[test]
    fn failed_tick_is_reported() {
        let mut ctl = controller([None]);
        assert!(matches!(ctl.poll(), Tick::ReadFailed));
        assert!(ctl.history().is_empty());
    }

    #[test]
    fn storage_failure_counts_event_as_lost() {
        let mut ctl = controller([Some(Acceleration::new(2100, 0, 0))]);
        ctl.store_mut().set_fail_writes(true);

        let report = expect_event(ctl.poll());
        assert!(!report.saved);
        assert_eq!(ctl.events_lost(), 1);
        assert_eq!(ctl.events_saved(), 0);

        // polling carries on normally
        assert!(matches!(ctl.poll(), Tick::Quiet(_)));
    }

    #[test]
    fn missing_climate_still_saves() {
        let mut ctl = controller([Some(Acceleration::new(2100, 0, 0))]);
        ctl.climate = FixedClimate(None);

        let report = expect_event(ctl.poll());
        assert!(report.saved);
        let text = ctl.store().files().get(&report.path).unwrap();
        assert!(text.contains("Temperature: n/a"));
        assert!(text.starts_with("EVENT 1\nTimestamp: 2026-01-16 09:30:00 EST\n"));
    }

    #[test]
    fn history_tracks_every_tick() {
        let mut ctl = controller(std::iter::empty());
        for _ in 0..25 {
            assert!(matches!(ctl.poll(), Tick::Quiet(_)));
        }
        assert!(ctl.history().is_filled());
        assert_eq!(ctl.history().len(), HISTORY_CAPACITY);
    }
}
