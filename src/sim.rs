// StrainLog - Simulated NAU7802 (test support)
//
// A register file plus a virtual clock standing in for the ADC on the bus.
// `SimBus` implements the I2C trait and `SimDelay` advances the virtual clock,
// so driver waits become deterministic: "ready after k status polls", "never
// ready", a ready flag that never drops, failed calibration, dead power
// rail, absent device.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

pub const SIM_ADDRESS: u8 = 0x2A;

const PU_CTRL: usize = 0x00;
const CTRL2: usize = 0x02;
const ADCO_B2: usize = 0x12;
const ADCO_B0: usize = 0x14;
const REVISION_ID: usize = 0x1F;

const RR: u8 = 1 << 0;
const PUD: u8 = 1 << 1;
const PUA: u8 = 1 << 2;
const PUR: u8 = 1 << 3;
const CS: u8 = 1 << 4;
const CR: u8 = 1 << 5;
const CALS: u8 = 1 << 2;
const CAL_ERR: u8 = 1 << 3;

struct State {
    regs: [u8; 0x20],
    pointer: usize,
    present: bool,
    power_ready: bool,
    calibration_error: bool,
    sticky_ready: bool,
    calibration_runs: u32,
    cycle_start_writes: u32,
    ready_after_polls: u32,
    countdown: u32,
    samples: VecDeque<i32>,
    now_ns: u64,
}

impl State {
    fn new() -> Self {
        let mut regs = [0u8; 0x20];
        regs[REVISION_ID] = 0x0F;
        Self {
            regs,
            pointer: 0,
            present: true,
            power_ready: true,
            calibration_error: false,
            sticky_ready: false,
            calibration_runs: 0,
            cycle_start_writes: 0,
            ready_after_polls: 2,
            countdown: 2,
            samples: VecDeque::new(),
            now_ns: 0,
        }
    }

    fn read(&mut self, reg: usize) -> u8 {
        match reg {
            PU_CTRL => {
                let pu = self.regs[PU_CTRL];
                if pu & CS != 0 && pu & CR == 0 && !self.samples.is_empty() {
                    if self.countdown == 0 {
                        self.latch_next();
                    } else {
                        self.countdown -= 1;
                    }
                }
                self.regs[PU_CTRL]
            }
            ADCO_B0 => {
                let value = self.regs[ADCO_B0];
                if !self.sticky_ready {
                    self.regs[PU_CTRL] &= !CR;
                }
                self.countdown = self.ready_after_polls;
                value
            }
            _ => self.regs[reg],
        }
    }

    fn latch_next(&mut self) {
        if let Some(sample) = self.samples.pop_front() {
            let bytes = (sample as u32 & 0x00FF_FFFF).to_be_bytes();
            self.regs[ADCO_B2..=ADCO_B0].copy_from_slice(&bytes[1..]);
            self.regs[PU_CTRL] |= CR;
        }
    }

    fn write(&mut self, reg: usize, value: u8) {
        match reg {
            PU_CTRL => {
                if value & RR != 0 {
                    let revision = self.regs[REVISION_ID];
                    self.regs = [0u8; 0x20];
                    self.regs[REVISION_ID] = revision;
                    self.regs[PU_CTRL] = RR;
                    return;
                }
                // PUR and CR are read-only
                let mut next = (value & !(PUR | CR)) | (self.regs[PU_CTRL] & CR);
                if next & PUD != 0 && next & PUA != 0 && self.power_ready {
                    next |= PUR;
                }
                if next & CS != 0 {
                    self.cycle_start_writes += 1;
                }
                self.regs[PU_CTRL] = next;
            }
            CTRL2 => {
                let mut next = value & !CAL_ERR;
                if next & CALS != 0 {
                    self.calibration_runs += 1;
                    next &= !CALS;
                    if self.calibration_error {
                        next |= CAL_ERR;
                    }
                }
                self.regs[CTRL2] = next;
            }
            _ => self.regs[reg] = value,
        }
    }
}

/// Handle to a simulated device; clones share the same state.
#[derive(Clone)]
pub struct Nau7802Sim {
    state: Rc<RefCell<State>>,
}

impl Nau7802Sim {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::new())),
        }
    }

    pub fn bus(&self) -> SimBus {
        SimBus {
            state: Rc::clone(&self.state),
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            state: Rc::clone(&self.state),
        }
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.state.borrow().regs[usize::from(reg)]
    }

    pub fn set_register(&self, reg: u8, value: u8) {
        self.state.borrow_mut().regs[usize::from(reg)] = value;
    }

    pub fn set_present(&self, present: bool) {
        self.state.borrow_mut().present = present;
    }

    pub fn set_power_ready(&self, ready: bool) {
        self.state.borrow_mut().power_ready = ready;
    }

    pub fn set_calibration_error(&self, error: bool) {
        self.state.borrow_mut().calibration_error = error;
    }

    /// Keep the conversion-ready flag set after the data bytes are read.
    pub fn set_sticky_ready(&self, sticky: bool) {
        self.state.borrow_mut().sticky_ready = sticky;
    }

    pub fn set_ready_after_polls(&self, polls: u32) {
        let mut state = self.state.borrow_mut();
        state.ready_after_polls = polls;
        state.countdown = polls;
    }

    pub fn queue_samples(&self, samples: &[i32]) {
        self.state.borrow_mut().samples.extend(samples.iter().copied());
    }

    pub fn pending_samples(&self) -> usize {
        self.state.borrow().samples.len()
    }

    pub fn calibration_runs(&self) -> u32 {
        self.state.borrow().calibration_runs
    }

    pub fn cycle_start_writes(&self) -> u32 {
        self.state.borrow().cycle_start_writes
    }

    pub fn now_ms(&self) -> u64 {
        self.state.borrow().now_ns / 1_000_000
    }
}

pub struct SimBus {
    state: Rc<RefCell<State>>,
}

impl ErrorType for SimBus {
    type Error = ErrorKind;
}

impl I2c for SimBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if address != SIM_ADDRESS || !state.present {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    state.pointer = usize::from(reg);
                    for &value in data {
                        let reg = state.pointer;
                        state.write(reg, value);
                        state.pointer = (reg + 1) % 0x20;
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        let reg = state.pointer;
                        *byte = state.read(reg);
                        state.pointer = (reg + 1) % 0x20;
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct SimDelay {
    state: Rc<RefCell<State>>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.state.borrow_mut().now_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.state.borrow_mut().now_ns += u64::from(ms) * 1_000_000;
    }
}
