//! Fake devices and factories for exercising the proxies without hardware.
//!
//! Every fake reports into a `Probe`, so tests can assert how often the
//! factory ran and how many device instances were open at once.
use station_traits::{BoxError, Device, Lights, PhotoCamera, Readable};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicU64,
    closes: AtomicU64,
    reads: AtomicU64,
    live: AtomicI64,
    max_live: AtomicI64,
}

/// Shared open/close/read counters.
#[derive(Debug, Clone, Default)]
pub struct Probe(Arc<Counters>);

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opens(&self) -> u64 {
        self.0.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.0.closes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.0.reads.load(Ordering::SeqCst)
    }

    /// Device instances currently open.
    pub fn live(&self) -> i64 {
        self.0.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open instances ever observed.
    pub fn max_live(&self) -> i64 {
        self.0.max_live.load(Ordering::SeqCst)
    }

    fn opened(&self) {
        self.0.opens.fetch_add(1, Ordering::SeqCst);
        let live = self.0.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_live.fetch_max(live, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Yields 1, 2, 3, ... from a counter shared by every instance a factory
/// opens, so values keep increasing across worker restarts.
#[derive(Debug)]
pub struct SequenceDevice {
    probe: Probe,
    next: Arc<AtomicU64>,
    delay: Duration,
    fail_every: Option<u64>,
}

impl Device for SequenceDevice {
    fn close(&mut self) -> Result<(), BoxError> {
        self.probe.closed();
        Ok(())
    }
}

impl Readable<u64> for SequenceDevice {
    fn read(&mut self) -> Result<u64, BoxError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.probe.0.reads.fetch_add(1, Ordering::SeqCst);
        let value = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(n) = self.fail_every
            && value % n == 0
        {
            return Err(format!("read {value} failed").into());
        }
        Ok(value)
    }
}

/// Factory for `SequenceDevice`s that sleep `delay` per read.
pub fn sequence_factory(
    probe: &Probe,
    delay: Duration,
) -> impl Fn() -> Result<SequenceDevice, BoxError> + Send + Sync + 'static {
    sequence_factory_failing(probe, delay, None)
}

/// Like `sequence_factory`, but every `fail_every`-th value is reported as a
/// read error instead.
pub fn sequence_factory_failing(
    probe: &Probe,
    delay: Duration,
    fail_every: Option<u64>,
) -> impl Fn() -> Result<SequenceDevice, BoxError> + Send + Sync + 'static {
    let probe = probe.clone();
    let next = Arc::new(AtomicU64::new(0));
    move || {
        probe.opened();
        Ok(SequenceDevice {
            probe: probe.clone(),
            next: Arc::clone(&next),
            delay,
            fail_every,
        })
    }
}

/// Always reads the same value.
#[derive(Debug, Clone)]
pub struct FixedDevice<T> {
    value: T,
    probe: Probe,
}

impl<T> Device for FixedDevice<T> {
    fn close(&mut self) -> Result<(), BoxError> {
        self.probe.closed();
        Ok(())
    }
}

impl<T: Clone> Readable<T> for FixedDevice<T> {
    fn read(&mut self) -> Result<T, BoxError> {
        self.probe.0.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

pub fn fixed_factory<T: Clone + Send + Sync + 'static>(
    probe: &Probe,
    value: T,
) -> impl Fn() -> Result<FixedDevice<T>, BoxError> + Send + Sync + 'static {
    let probe = probe.clone();
    move || {
        probe.opened();
        Ok(FixedDevice {
            value: value.clone(),
            probe: probe.clone(),
        })
    }
}

/// Panics on every read, like a driver bug.
#[derive(Debug)]
pub struct PanickingDevice {
    probe: Probe,
}

impl Device for PanickingDevice {
    fn close(&mut self) -> Result<(), BoxError> {
        self.probe.closed();
        Ok(())
    }
}

impl Readable<u64> for PanickingDevice {
    fn read(&mut self) -> Result<u64, BoxError> {
        self.probe.0.reads.fetch_add(1, Ordering::SeqCst);
        panic!("driver bug");
    }
}

pub fn panicking_factory(
    probe: &Probe,
) -> impl Fn() -> Result<PanickingDevice, BoxError> + Send + Sync + 'static {
    let probe = probe.clone();
    move || {
        probe.opened();
        Ok(PanickingDevice {
            probe: probe.clone(),
        })
    }
}

/// A device for action-based proxies; actions receive it mutably.
#[derive(Debug)]
pub struct ActionDevice {
    probe: Probe,
    /// Number of actions run against this instance.
    pub performed: u64,
}

impl ActionDevice {
    /// Record one action and return the running total for this instance.
    pub fn touch(&mut self) -> u64 {
        self.probe.0.reads.fetch_add(1, Ordering::SeqCst);
        self.performed += 1;
        self.performed
    }
}

impl Device for ActionDevice {
    fn close(&mut self) -> Result<(), BoxError> {
        self.probe.closed();
        Ok(())
    }
}

pub fn action_factory(
    probe: &Probe,
) -> impl Fn() -> Result<ActionDevice, BoxError> + Send + Sync + 'static {
    let probe = probe.clone();
    move || {
        probe.opened();
        Ok(ActionDevice {
            probe: probe.clone(),
            performed: 0,
        })
    }
}

/// A factory whose device never opens. Counts attempts in `probe.opens()`
/// without marking anything live.
pub fn failing_factory<D: 'static>(
    probe: &Probe,
    message: &'static str,
) -> impl Fn() -> Result<D, BoxError> + Send + Sync + 'static {
    let probe = probe.clone();
    move || {
        probe.0.opens.fetch_add(1, Ordering::SeqCst);
        Err(message.into())
    }
}

/// A camera that writes a placeholder file instead of taking a picture.
#[derive(Debug)]
pub struct FakeCamera {
    serial: String,
    probe: Probe,
    fail_capture: bool,
}

impl FakeCamera {
    pub fn new(serial: impl Into<String>, probe: &Probe) -> Self {
        probe.opened();
        Self {
            serial: serial.into(),
            probe: probe.clone(),
            fail_capture: false,
        }
    }

    /// A camera whose captures always fail.
    pub fn broken(serial: impl Into<String>, probe: &Probe) -> Self {
        Self {
            fail_capture: true,
            ..Self::new(serial, probe)
        }
    }
}

impl Device for FakeCamera {
    fn close(&mut self) -> Result<(), BoxError> {
        self.probe.closed();
        Ok(())
    }
}

impl PhotoCamera for FakeCamera {
    fn serial_number(&mut self) -> Result<String, BoxError> {
        Ok(self.serial.clone())
    }

    fn capture_to(&mut self, dest: &Path) -> Result<(), BoxError> {
        self.probe.0.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_capture {
            return Err("capture failed".into());
        }
        std::fs::write(dest, b"jpeg")?;
        Ok(())
    }
}

/// Lights that remember every level they were set to.
#[derive(Debug, Clone, Default)]
pub struct RecordingLights(Arc<Mutex<Vec<f32>>>);

impl RecordingLights {
    pub fn levels(&self) -> Vec<f32> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Lights for RecordingLights {
    fn set_level(&mut self, level: f32) -> Result<(), BoxError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(level);
        Ok(())
    }
}
