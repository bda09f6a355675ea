//! Lazy, idle-expiring proxy that runs one-shot actions against a device.
//!
//! Callers submit an action with `request_action` and collect its outcome
//! with `get_result`. There is one pending slot: submitting while an earlier
//! action is still unclaimed replaces it, and the earlier result is dropped.
//! Concurrent submitters get no FIFO guarantee.
//!
//! An action that panics retires the worker; waiters see `WorkerTerminated`
//! and the device is still closed.
use crate::config::ProxyCfg;
use crate::error::ProxyError;
use crate::worker::{self, Exit, Shared, State, Turn};
use station_traits::{BoxError, Device};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Action<D, V> = Box<dyn FnOnce(&mut D) -> Result<V, BoxError> + Send>;
type Factory<D> = Arc<dyn Fn() -> Result<D, BoxError> + Send + Sync>;

struct Requests<D, V> {
    /// Sequence number of the most recent submission.
    requested: u64,
    pending: Option<(u64, Action<D, V>)>,
    /// Outcome of the action numbered `requested`, until claimed.
    result: Option<Result<V, ProxyError>>,
    /// Sequence number of the last result handed to a caller.
    claimed: u64,
}

/// Caller-side capability: run one action against a device and wait for it.
pub trait Actionable<D, V> {
    fn perform<F>(&self, action: F) -> Result<V, ProxyError>
    where
        F: FnOnce(&mut D) -> Result<V, BoxError> + Send + 'static;
}

pub struct RequestProxy<D, V> {
    name: String,
    cfg: ProxyCfg,
    factory: Factory<D>,
    shared: Arc<Shared<Requests<D, V>>>,
}

impl<D, V> std::fmt::Debug for RequestProxy<D, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestProxy")
            .field("name", &self.name)
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl<D, V> RequestProxy<D, V>
where
    D: Device + Send + 'static,
    V: Send + 'static,
{
    pub fn new<F>(name: impl Into<String>, cfg: ProxyCfg, factory: F) -> Self
    where
        F: Fn() -> Result<D, BoxError> + Send + Sync + 'static,
    {
        let proxy = Self {
            name: name.into(),
            cfg,
            factory: Arc::new(factory),
            shared: Arc::new(Shared::new(Requests {
                requested: 0,
                pending: None,
                result: None,
                claimed: 0,
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

    pub fn is_running(&self) -> bool {
        self.shared.lock().life.is_running()
    }

    pub fn starts(&self) -> u64 {
        self.shared.lock().life.starts()
    }

    /// Queue `action` for the worker, starting one if needed.
    ///
    /// Returns once the action is recorded. Any unclaimed result and any
    /// action not yet picked up are discarded.
    pub fn request_action<F>(&self, action: F) -> Result<(), ProxyError>
    where
        F: FnOnce(&mut D) -> Result<V, BoxError> + Send + 'static,
    {
        self.submit(Box::new(action)).map(|_| ())
    }

    /// Record `action` and return its sequence number.
    fn submit(&self, action: Action<D, V>) -> Result<u64, ProxyError> {
        let mut st = self.shared.lock();
        if st.life.serving().is_none() {
            self.activate(&mut st)?;
        }
        st.data.requested += 1;
        let seq = st.data.requested;
        if let Some((old, _)) = st.data.pending.replace((seq, action)) {
            tracing::debug!(proxy = %self.name, seq = old, "pending action replaced");
        }
        st.data.result = None;
        drop(st);
        self.shared.notify();
        Ok(seq)
    }

    /// Block until the latest submitted action has a result, and claim it.
    ///
    /// `grace` bounds each wait between liveness checks; wake-ups on worker
    /// exit are checked regardless. When the worker is gone with nothing
    /// published the call fails with `WorkerTerminated`, or with the open
    /// error if the device never opened.
    pub fn get_result(&self, grace: Option<Duration>) -> Result<V, ProxyError> {
        let mut st = self.shared.lock();
        loop {
            if let Some(outcome) = st.data.result.take() {
                st.data.claimed = st.data.requested;
                return outcome;
            }
            if let Some(e) = worker_gone(&st) {
                return Err(e);
            }
            st = match grace {
                Some(grace) => self.shared.wait_timeout(st, grace),
                None => self.shared.wait(st),
            };
        }
    }

    /// Submit `action` and wait for its own result.
    ///
    /// Fails with `Superseded` once a later submission replaces this one, or
    /// once another caller claimed the result through `get_result`.
    pub fn perform<F>(&self, action: F) -> Result<V, ProxyError>
    where
        F: FnOnce(&mut D) -> Result<V, BoxError> + Send + 'static,
    {
        let seq = self.submit(Box::new(action))?;
        let mut st = self.shared.lock();
        loop {
            if st.data.requested != seq || st.data.claimed >= seq {
                tracing::debug!(proxy = %self.name, seq, "action superseded");
                return Err(ProxyError::Superseded);
            }
            if let Some(outcome) = st.data.result.take() {
                st.data.claimed = seq;
                return outcome;
            }
            if let Some(e) = worker_gone(&st) {
                return Err(e);
            }
            st = self.shared.wait(st);
        }
    }

    /// Stop the worker and wait until its device is closed. Idempotent.
    pub fn stop(&self) {
        worker::stop(&self.shared, &self.name);
    }

    fn activate(&self, st: &mut State<Requests<D, V>>) -> Result<u64, ProxyError> {
        let name = self.name.clone();
        let idle = self.cfg.idle_timeout;
        let factory = Arc::clone(&self.factory);
        worker::spawn(&self.shared, st, &self.name, move |turn| {
            serve(turn, &name, idle, &*factory);
        })
    }
}

impl<D, V> Actionable<D, V> for RequestProxy<D, V>
where
    D: Device + Send + 'static,
    V: Send + 'static,
{
    fn perform<F>(&self, action: F) -> Result<V, ProxyError>
    where
        F: FnOnce(&mut D) -> Result<V, BoxError> + Send + 'static,
    {
        RequestProxy::perform(self, action)
    }
}

impl<D, V> Drop for RequestProxy<D, V> {
    fn drop(&mut self) {
        worker::stop(&self.shared, &self.name);
    }
}

/// Error for a waiter when no worker is serving: the open failure if the
/// device never opened, otherwise `WorkerTerminated`.
fn worker_gone<D, V>(st: &State<Requests<D, V>>) -> Option<ProxyError> {
    if st.life.serving().is_some() {
        return None;
    }
    Some(match st.life.last_exit() {
        Some(Exit::Failed(e @ ProxyError::DeviceOpen(_))) => e.clone(),
        _ => ProxyError::WorkerTerminated,
    })
}

/// Worker body: open, run actions until stopped or idle, close.
fn serve<D: Device, V>(
    turn: Turn<Requests<D, V>>,
    name: &str,
    idle: Option<Duration>,
    factory: &(dyn Fn() -> Result<D, BoxError> + Send + Sync),
) {
    let generation = turn.generation();
    let mut device = match factory() {
        Ok(device) => device,
        Err(e) => {
            tracing::warn!(proxy = name, generation, error = %e, "device open failed");
            let mut st = turn.lock();
            st.data.pending = None;
            turn.retire(&mut st, Exit::Failed(ProxyError::DeviceOpen(e.to_string())));
            return;
        }
    };

    // Idle time counts from the last completed action, or from open.
    let mut last_completed = Instant::now();
    while let Some((seq, action)) = next_action(&turn, name, idle, last_completed) {
        let Ok(outcome) = panic::catch_unwind(AssertUnwindSafe(|| action(&mut device))) else {
            tracing::error!(proxy = name, generation, seq, "action panicked");
            let mut st = turn.lock();
            st.data.pending = None;
            turn.retire(&mut st, Exit::Failed(ProxyError::WorkerTerminated));
            break;
        };
        let outcome = outcome.map_err(|e| {
            tracing::debug!(proxy = name, generation, seq, error = %e, "action failed");
            ProxyError::ActionFailed(e.to_string())
        });
        last_completed = Instant::now();

        let mut st = turn.lock();
        if st.data.requested == seq {
            st.data.result = Some(outcome);
        } else {
            tracing::debug!(proxy = name, generation, seq, "result of replaced action dropped");
        }
        drop(st);
        turn.shared().notify();
    }

    if let Err(e) = device.close() {
        tracing::warn!(proxy = name, generation, error = %e, "device close failed");
    }
}

/// Wait for the next action. Returns `None` after retiring the worker.
fn next_action<D, V>(
    turn: &Turn<Requests<D, V>>,
    name: &str,
    idle: Option<Duration>,
    last_completed: Instant,
) -> Option<(u64, Action<D, V>)> {
    let mut st = turn.lock();
    loop {
        if turn.stop_requested(&st) {
            // Not run by this generation and must not leak into the next one.
            st.data.pending = None;
            turn.retire(&mut st, Exit::Stopped);
            return None;
        }
        if let Some(next) = st.data.pending.take() {
            return Some(next);
        }
        st = match idle {
            None => turn.shared().wait(st),
            Some(idle) => {
                let elapsed = last_completed.elapsed();
                if elapsed >= idle {
                    tracing::debug!(proxy = name, generation = turn.generation(), "idle timeout");
                    turn.retire(&mut st, Exit::Idle);
                    return None;
                }
                turn.shared().wait_timeout(st, idle - elapsed)
            }
        };
    }
}
