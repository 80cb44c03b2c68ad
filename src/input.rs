// StrainLog - Console Input
//
// A reader thread forwards console bytes over a channel so that keys typed
// while a command or a capture is running are queued, not lost. The monitor
// loop drains the queue between operations.

use std::io::{ErrorKind, Read};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::STACK_CONSOLE;
use crate::events::Command;

const IDLE_POLL: Duration = Duration::from_millis(10);

/// Spawn the console reader over `source` (stdin on the device).
pub fn spawn_reader<R>(mut source: R, keys: Sender<char>) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("console".into())
        .stack_size(STACK_CONSOLE)
        .spawn(move || {
            log::info!("Console reader started");
            let mut byte = [0u8; 1];
            loop {
                match source.read(&mut byte) {
                    Ok(0) => thread::sleep(IDLE_POLL),
                    Ok(_) => {
                        if keys.send(char::from(byte[0])).is_err() {
                            log::warn!("Console channel closed, exiting console reader");
                            return;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                        thread::sleep(IDLE_POLL)
                    }
                    Err(e) => {
                        log::warn!("Console read error: {e}");
                        thread::sleep(IDLE_POLL);
                    }
                }
            }
        })
}

/// Receiving end of the console queue.
pub struct ConsoleInput {
    keys: Receiver<char>,
}

impl ConsoleInput {
    pub fn new(keys: Receiver<char>) -> Self {
        Self { keys }
    }

    /// Next recognised command, skipping line endings and unknown keys.
    pub fn next_command(&self) -> Option<Command> {
        while let Ok(key) = self.keys.try_recv() {
            if key.is_whitespace() {
                continue;
            }
            match Command::from_key(key) {
                Some(command) => return Some(command),
                None => log::info!("Unknown command '{key}' (h for help)"),
            }
        }
        None
    }

    /// True if anything was typed since the last call. Consumes the input.
    pub fn key_pressed(&self) -> bool {
        let mut pressed = false;
        while self.keys.try_recv().is_ok() {
            pressed = true;
        }
        pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;

    #[test]
    fn commands_are_queued_in_order() {
        let (tx, rx) = mpsc::channel();
        let input = ConsoleInput::new(rx);
        for key in ['r', '\r', '\n', 'q', 'G'] {
            tx.send(key).unwrap();
        }

        assert_eq!(input.next_command(), Some(Command::ReadRaw));
        assert_eq!(input.next_command(), Some(Command::GainSweep));
        assert_eq!(input.next_command(), None);
    }

    #[test]
    fn key_pressed_drains_queue() {
        let (tx, rx) = mpsc::channel();
        let input = ConsoleInput::new(rx);
        assert!(!input.key_pressed());
        tx.send('x').unwrap();
        tx.send('\n').unwrap();
        assert!(input.key_pressed());
        assert!(!input.key_pressed());
    }

    #[test]
    fn reader_forwards_bytes() {
        let (tx, rx) = mpsc::channel();
        spawn_reader(Cursor::new(b"za".to_vec()), tx).unwrap();

        let timeout = Duration::from_secs(2);
        assert_eq!(rx.recv_timeout(timeout), Ok('z'));
        assert_eq!(rx.recv_timeout(timeout), Ok('a'));
    }
}
