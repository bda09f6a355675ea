//! Lazy, idle-expiring polling proxy over a single readable device.
//!
//! A `ThreadedProxy` opens its device on the first `read()`, keeps a worker
//! thread polling it while callers are interested, and closes it again after
//! the configured idle timeout. Callers never touch the device; they only see
//! the most recently published reading.
//!
//! Known limitation: shutdown is cooperative. A device read that hangs delays
//! `stop()` until it returns, so devices should carry their own IO timeouts.
//!
//! A read that panics retires the worker with `DeviceUnavailable`; the device
//! is still closed.
use crate::config::ProxyCfg;
use crate::error::ProxyError;
use crate::refine::Refine;
use crate::worker::{self, Exit, Shared, State, Turn};
use station_traits::{BoxError, Readable};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Caller-facing capability: produce a fresh value.
pub trait Reader<T> {
    fn read(&self) -> Result<T, ProxyError>;
}

impl<T, R: Reader<T> + ?Sized> Reader<T> for &R {
    fn read(&self) -> Result<T, ProxyError> {
        (**self).read()
    }
}

impl<T, R: Reader<T> + ?Sized> Reader<T> for Arc<R> {
    fn read(&self) -> Result<T, ProxyError> {
        (**self).read()
    }
}

type Factory<T> = Arc<dyn Fn() -> Result<Box<dyn Readable<T> + Send>, BoxError> + Send + Sync>;
type SharedRefine<T> = Arc<Mutex<Box<dyn Refine<T>>>>;

struct Readings<T> {
    /// Latest outcome published by the serving generation; reset on spawn.
    latest: Option<Result<T, ProxyError>>,
    last_access: Instant,
}

pub struct ThreadedProxy<T> {
    name: String,
    cfg: ProxyCfg,
    factory: Factory<T>,
    refine: Option<SharedRefine<T>>,
    shared: Arc<Shared<Readings<T>>>,
}

impl<T> std::fmt::Debug for ThreadedProxy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedProxy")
            .field("name", &self.name)
            .field("cfg", &self.cfg)
            .field("refined", &self.refine.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> ThreadedProxy<T> {
    /// Build a proxy around `factory`. Nothing is opened until the first
    /// `read()` unless `cfg.eager` is set.
    pub fn new<D, F>(name: impl Into<String>, cfg: ProxyCfg, factory: F) -> Self
    where
        D: Readable<T> + Send + 'static,
        F: Fn() -> Result<D, BoxError> + Send + Sync + 'static,
    {
        Self::build(name.into(), cfg, boxed(factory), None)
    }

    /// Like `new`, with `refine` applied to every raw reading before it is
    /// published.
    pub fn refined<D, F, R>(name: impl Into<String>, cfg: ProxyCfg, factory: F, refine: R) -> Self
    where
        D: Readable<T> + Send + 'static,
        F: Fn() -> Result<D, BoxError> + Send + Sync + 'static,
        R: Refine<T> + 'static,
    {
        let refine: Box<dyn Refine<T>> = Box::new(refine);
        Self::build(
            name.into(),
            cfg,
            boxed(factory),
            Some(Arc::new(Mutex::new(refine))),
        )
    }

    fn build(
        name: String,
        cfg: ProxyCfg,
        factory: Factory<T>,
        refine: Option<SharedRefine<T>>,
    ) -> Self {
        let proxy = Self {
            name,
            cfg,
            factory,
            refine,
            shared: Arc::new(Shared::new(Readings {
                latest: None,
                last_access: Instant::now(),
            })),
        };
        if cfg.eager {
            let mut st = proxy.shared.lock();
            if let Err(e) = proxy.activate(&mut st) {
                tracing::warn!(proxy = %proxy.name, error = %e, "eager start failed");
            }
        }
        proxy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while a worker thread exists, including one that is closing its
    /// device after deciding to exit.
    pub fn is_running(&self) -> bool {
        self.shared.lock().life.is_running()
    }

    /// Number of worker generations started so far. Each one invoked the
    /// factory at most once.
    pub fn starts(&self) -> u64 {
        self.shared.lock().life.starts()
    }

    /// Block until the serving worker has published a reading and return it.
    ///
    /// Starts a worker when none is serving. A worker that is closing its
    /// device after an idle timeout is not waited on; its successor opens the
    /// device once the close has finished.
    pub fn read(&self) -> Result<T, ProxyError> {
        let mut st = self.shared.lock();
        st.data.last_access = Instant::now();
        let mut generation = match st.life.serving() {
            Some(g) => g,
            None => self.activate(&mut st)?,
        };

        loop {
            if let Some(outcome) = &st.data.latest {
                return outcome.clone();
            }
            if let Some(g) = st.life.serving() {
                generation = g;
                st = self.shared.wait(st);
                continue;
            }
            // The worker left without publishing anything.
            match st.life.exit_of(generation).cloned() {
                Some(Exit::Failed(e)) => return Err(e),
                Some(Exit::Stopped) => return Err(ProxyError::DeviceUnavailable),
                Some(Exit::Idle) | None => {
                    tracing::debug!(proxy = %self.name, generation, "worker gone before publishing; restarting");
                    generation = self.activate(&mut st)?;
                }
            }
        }
    }

    /// Stop the worker and wait until its device is closed. Idempotent.
    pub fn stop(&self) {
        worker::stop(&self.shared, &self.name);
    }

    fn activate(&self, st: &mut State<Readings<T>>) -> Result<u64, ProxyError> {
        st.data.latest = None;
        let name = self.name.clone();
        let cfg = self.cfg;
        let factory = Arc::clone(&self.factory);
        let refine = self.refine.clone();
        worker::spawn(&self.shared, st, &self.name, move |turn| {
            poll(turn, &name, cfg, &*factory, refine.as_deref());
        })
    }
}

impl<T: Clone + Send + 'static> Reader<T> for ThreadedProxy<T> {
    fn read(&self) -> Result<T, ProxyError> {
        ThreadedProxy::read(self)
    }
}

impl<T> Drop for ThreadedProxy<T> {
    fn drop(&mut self) {
        worker::stop(&self.shared, &self.name);
    }
}

fn boxed<T, D, F>(factory: F) -> Factory<T>
where
    T: 'static,
    D: Readable<T> + Send + 'static,
    F: Fn() -> Result<D, BoxError> + Send + Sync + 'static,
{
    Arc::new(move || factory().map(|d| Box::new(d) as Box<dyn Readable<T> + Send>))
}

/// Worker body: open, poll until stopped or idle, close.
fn poll<T>(
    turn: Turn<Readings<T>>,
    name: &str,
    cfg: ProxyCfg,
    factory: &(dyn Fn() -> Result<Box<dyn Readable<T> + Send>, BoxError> + Send + Sync),
    refine: Option<&Mutex<Box<dyn Refine<T>>>>,
) {
    let generation = turn.generation();
    let mut device = match factory() {
        Ok(device) => device,
        Err(e) => {
            tracing::warn!(proxy = name, generation, error = %e, "device open failed");
            let mut st = turn.lock();
            turn.retire(&mut st, Exit::Failed(ProxyError::DeviceOpen(e.to_string())));
            return;
        }
    };

    let mut published = false;
    loop {
        {
            let mut st = turn.lock();
            if turn.stop_requested(&st) {
                turn.retire(&mut st, Exit::Stopped);
                break;
            }
            // Checked only between reads, and never before the first publish.
            if published
                && let Some(idle) = cfg.idle_timeout
                && st.data.last_access.elapsed() > idle
            {
                tracing::debug!(proxy = name, generation, "idle timeout");
                turn.retire(&mut st, Exit::Idle);
                break;
            }
        }

        let Ok(read) = panic::catch_unwind(AssertUnwindSafe(|| device.read())) else {
            tracing::error!(proxy = name, generation, "device read panicked");
            let mut st = turn.lock();
            turn.retire(&mut st, Exit::Failed(ProxyError::DeviceUnavailable));
            break;
        };
        let outcome = match read {
            Ok(raw) => Ok(match refine {
                Some(stage) => stage
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .refine(raw),
                None => raw,
            }),
            Err(e) => {
                tracing::debug!(proxy = name, generation, error = %e, "device read failed");
                Err(ProxyError::DeviceRead(e.to_string()))
            }
        };

        turn.lock().data.latest = Some(outcome);
        turn.shared().notify();
        published = true;
    }

    if let Err(e) = device.close() {
        tracing::warn!(proxy = name, generation, error = %e, "device close failed");
    }
}
