use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source used for device pacing.
///
/// - now(): returns a monotonic Instant
/// - sleep(): waits for the provided duration (implementations may simulate)
/// - sleep_until(): waits until `deadline`, returning immediately if it has passed
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    fn sleep_until(&self, deadline: Instant) {
        let now = self.now();
        if deadline > now {
            self.sleep(deadline - now);
        }
    }

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Real-time clock backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

/// Clock whose time only moves when told to. `sleep` advances it instead of
/// blocking and is recorded, so pacing logic can be asserted on.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    offset: Duration,
    slept: Vec<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            inner: Arc::new(Mutex::new(ManualState::default())),
        }
    }

    pub fn advance(&self, d: Duration) {
        let mut st = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        st.offset = st.offset.saturating_add(d);
    }

    /// Every duration passed to `sleep` so far, in call order.
    pub fn slept(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slept
            .clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let st = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + st.offset
    }

    fn sleep(&self, d: Duration) {
        let mut st = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        st.offset = st.offset.saturating_add(d);
        st.slept.push(d);
    }
}
