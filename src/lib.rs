// StrainLog - strain and vibration field logger
//
// Library half of the firmware: drivers, the acquisition and event-capture
// pipeline and the operator console. Everything here is generic over the
// embedded-hal traits so it also builds and tests on the host.

pub mod clock;
pub mod commands;
pub mod config;
pub mod drivers;
pub mod events;
pub mod filters;
pub mod history;
pub mod input;
pub mod motion;
pub mod storage;
pub mod strain;
pub mod tare;
pub mod tasks;

#[cfg(test)]
mod sim;
