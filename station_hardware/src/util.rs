use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use station_traits::Clock;

use crate::error::{HwError, Result};

/// Enforces a minimum gap between consecutive device commands.
#[derive(Debug)]
pub struct Pacer<C: Clock> {
    clock: C,
    gap: Duration,
    last: Option<Instant>,
}

impl<C: Clock> Pacer<C> {
    pub fn new(clock: C, gap: Duration) -> Self {
        Self {
            clock,
            gap,
            last: None,
        }
    }

    /// Sleep until `gap` has passed since the last `mark`. Returns at once
    /// before the first command.
    pub fn wait(&self) {
        if let Some(last) = self.last {
            self.clock.sleep_until(last + self.gap);
        }
    }

    /// Record that a command just finished.
    pub fn mark(&mut self) {
        self.last = Some(self.clock.now());
    }
}

/// Read one `\n`-terminated line, without the terminator.
///
/// Gives up with `HwError::Serial` after `max_len` bytes or at end of stream.
/// A read timeout configured on the link surfaces as `HwError::Timeout`.
pub fn read_line<R: Read + ?Sized>(reader: &mut R, max_len: usize) -> Result<String> {
    let mut line = Vec::with_capacity(32);
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Err(HwError::Serial("link closed mid-line".into())),
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => {
                if line.len() == max_len {
                    return Err(HwError::Serial(format!("line longer than {max_len} bytes")));
                }
                line.push(byte[0]);
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                return Err(HwError::Timeout);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(HwError::Io(e)),
        }
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}
