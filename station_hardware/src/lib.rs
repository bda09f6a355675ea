pub mod error;
pub mod ranging;
pub mod scale;
pub mod util;

#[cfg(feature = "hardware")]
pub mod serial;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod lights;

pub use ranging::DistanceSensor;
pub use scale::SerialScale;

use station_traits::{
    BoxError, Clock, Device, Lights, MonotonicClock, PhotoCamera, Ranger, ScalePort,
};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

/// Time the simulated scale takes to answer one request.
pub const SIM_SCALE_LATENCY: Duration = Duration::from_millis(50);

/// Simulated serial link of a scale carrying a fixed weight.
///
/// Answers every `r` with one `"<kg>,kg,\r\n"` line after `latency`, like a
/// scale weighing before it replies. Reading with nothing pending times out,
/// like a real link with a read timeout.
#[derive(Debug)]
pub struct SimulatedScalePort<C: Clock = MonotonicClock> {
    weight: f32,
    pending: VecDeque<u8>,
    requests: usize,
    latency: Duration,
    clock: C,
}

impl SimulatedScalePort {
    pub fn new(weight: f32) -> Self {
        Self::with_clock(weight, SIM_SCALE_LATENCY, MonotonicClock::new())
    }
}

impl<C: Clock> SimulatedScalePort<C> {
    pub fn with_clock(weight: f32, latency: Duration, clock: C) -> Self {
        Self {
            weight,
            pending: VecDeque::new(),
            requests: 0,
            latency,
            clock,
        }
    }

    /// Number of `r` commands received.
    pub fn requests(&self) -> usize {
        self.requests
    }
}

impl<C: Clock> Read for SimulatedScalePort<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no response"));
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl<C: Clock> Write for SimulatedScalePort<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for _ in buf.iter().filter(|b| **b == b'r') {
            self.clock.sleep(self.latency);
            self.requests += 1;
            self.pending
                .extend(format!("{:.3},kg,\r\n", self.weight).into_bytes());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: Clock> ScalePort for SimulatedScalePort<C> {
    fn clear_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        Ok(())
    }
}

/// Offsets (in sensor units) cycled through by `SimulatedRanger`.
const JITTER: [i32; 5] = [0, 3, -2, 1, -4];

/// Measurement time per ranging level. Longer range modes integrate longer.
fn timing_budget(level: u8) -> Duration {
    match level {
        1 => Duration::from_millis(33),
        2 => Duration::from_millis(66),
        _ => Duration::from_millis(200),
    }
}

/// Simulated ToF ranger: a fixed distance plus a small repeating jitter.
///
/// Each measurement blocks for the timing budget of the ranging level.
#[derive(Debug)]
pub struct SimulatedRanger<C: Clock = MonotonicClock> {
    units: u16,
    tick: usize,
    level: Option<u8>,
    clock: C,
}

impl SimulatedRanger {
    pub fn new(units: u16) -> Self {
        Self::with_clock(units, MonotonicClock::new())
    }
}

impl<C: Clock> SimulatedRanger<C> {
    pub fn with_clock(units: u16, clock: C) -> Self {
        Self {
            units,
            tick: 0,
            level: None,
            clock,
        }
    }

    /// Ranging level while ranging, `None` when stopped.
    pub fn level(&self) -> Option<u8> {
        self.level
    }
}

impl<C: Clock> Ranger for SimulatedRanger<C> {
    fn start_ranging(&mut self, level: u8) -> Result<(), BoxError> {
        if !(1..=3).contains(&level) {
            return Err(format!("unsupported ranging level {level}").into());
        }
        self.level = Some(level);
        Ok(())
    }

    fn distance_units(&mut self) -> Result<u16, BoxError> {
        let Some(level) = self.level else {
            return Err("sensor is not ranging".into());
        };
        self.clock.sleep(timing_budget(level));
        let offset = JITTER[self.tick % JITTER.len()];
        self.tick += 1;
        let units = (i32::from(self.units) + offset).clamp(0, i32::from(u16::MAX));
        Ok(u16::try_from(units).unwrap_or(u16::MAX))
    }

    fn stop_ranging(&mut self) -> Result<(), BoxError> {
        self.level = None;
        Ok(())
    }
}

/// Minimal JPEG: start-of-image and end-of-image markers only.
const PLACEHOLDER_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

/// Simulated tethered camera. Its serial number is derived from the port.
#[derive(Debug)]
pub struct SimulatedCamera {
    port: String,
    serial: String,
}

impl SimulatedCamera {
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            serial: format!("SIM-{}", port.replace(':', "")),
        }
    }
}

impl Device for SimulatedCamera {
    fn close(&mut self) -> Result<(), BoxError> {
        tracing::debug!(port = %self.port, "camera session closed");
        Ok(())
    }
}

impl PhotoCamera for SimulatedCamera {
    fn serial_number(&mut self) -> Result<String, BoxError> {
        Ok(self.serial.clone())
    }

    fn capture_to(&mut self, dest: &Path) -> Result<(), BoxError> {
        std::fs::write(dest, PLACEHOLDER_JPEG)?;
        tracing::debug!(port = %self.port, dest = %dest.display(), "photo captured");
        Ok(())
    }
}

/// Simulated ring lights; only remembers the level.
#[derive(Debug, Default)]
pub struct SimulatedLights {
    level: f32,
}

impl SimulatedLights {
    pub fn level(&self) -> f32 {
        self.level
    }
}

impl Lights for SimulatedLights {
    fn set_level(&mut self, level: f32) -> Result<(), BoxError> {
        self.level = level.clamp(0.0, 1.0);
        tracing::debug!(level = self.level, "lights level set (simulated)");
        Ok(())
    }
}
