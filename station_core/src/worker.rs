//! Worker lifecycle shared by `ThreadedProxy` and `RequestProxy`.
//!
//! Each proxy owns one `Mutex<State<P>>` and one `Condvar`. All cross-thread
//! state (the worker slot, the payload `P`, exit bookkeeping) lives behind
//! that single lock; no other lock is ever taken while holding it.
//!
//! Workers are numbered by generation. A worker that decides to exit marks
//! itself *retiring* before it closes its device, so callers can start the
//! next generation right away. The next generation does not invoke its
//! factory until every earlier generation has released its device, which
//! keeps at most one device instance open per proxy.
use crate::error::ProxyError;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Why a worker generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Exit {
    Idle,
    Stopped,
    Failed(ProxyError),
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    stop: bool,
    retiring: bool,
    handle: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    slot: Option<Slot>,
    /// Last generation successfully spawned.
    generation: u64,
    /// Every generation up to and including this one has closed its device.
    released: u64,
    last_exit: Option<(u64, Exit)>,
}

impl Lifecycle {
    /// Generation of the worker accepting new work, if any.
    pub(crate) fn serving(&self) -> Option<u64> {
        self.slot
            .as_ref()
            .filter(|s| !s.retiring)
            .map(|s| s.generation)
    }

    pub(crate) fn is_serving(&self, generation: u64) -> bool {
        self.serving() == Some(generation)
    }

    /// True while any worker thread still owns the slot, retiring or not.
    pub(crate) fn is_running(&self) -> bool {
        self.slot.is_some()
    }

    pub(crate) fn starts(&self) -> u64 {
        self.generation
    }

    pub(crate) fn exit_of(&self, generation: u64) -> Option<&Exit> {
        self.last_exit
            .as_ref()
            .filter(|(g, _)| *g == generation)
            .map(|(_, e)| e)
    }

    pub(crate) fn last_exit(&self) -> Option<&Exit> {
        self.last_exit.as_ref().map(|(_, e)| e)
    }

    fn stop_requested(&self, generation: u64) -> bool {
        self.slot
            .as_ref()
            .is_some_and(|s| s.generation == generation && s.stop)
    }

    fn may_open(&self, generation: u64) -> bool {
        self.released.saturating_add(1) >= generation
    }

    fn retire(&mut self, generation: u64, exit: Exit) {
        if let Some(slot) = self.slot.as_mut().filter(|s| s.generation == generation) {
            slot.retiring = true;
        }
        if self.last_exit.as_ref().is_none_or(|(g, _)| *g <= generation) {
            self.last_exit = Some((generation, exit));
        }
    }

    fn release(&mut self, generation: u64) {
        if self.slot.as_ref().is_some_and(|s| s.generation == generation) {
            self.slot = None;
        }
        self.released = self.released.max(generation);
    }
}

pub(crate) struct State<P> {
    pub(crate) life: Lifecycle,
    pub(crate) data: P,
}

pub(crate) struct Shared<P> {
    state: Mutex<State<P>>,
    cond: Condvar,
}

impl<P> Shared<P> {
    pub(crate) fn new(data: P) -> Self {
        Self {
            state: Mutex::new(State {
                life: Lifecycle::default(),
                data,
            }),
            cond: Condvar::new(),
        }
    }

    // User code (device reads, actions) never runs under this lock, so a
    // poisoned lock still guards consistent state.
    pub(crate) fn lock(&self) -> MutexGuard<'_, State<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait<'a>(&self, guard: MutexGuard<'a, State<P>>) -> MutexGuard<'a, State<P>> {
        self.cond
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, State<P>>,
        timeout: Duration,
    ) -> MutexGuard<'a, State<P>> {
        match self.cond.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }

    pub(crate) fn notify(&self) {
        self.cond.notify_all();
    }
}

/// Spawn the next worker generation running `body`.
///
/// Must be called with the state locked and no generation serving. The new
/// thread blocks on the lock until the caller releases it.
pub(crate) fn spawn<P, F>(
    shared: &Arc<Shared<P>>,
    st: &mut State<P>,
    name: &str,
    body: F,
) -> Result<u64, ProxyError>
where
    P: Send + 'static,
    F: FnOnce(Turn<P>) + Send + 'static,
{
    debug_assert!(st.life.serving().is_none());
    let generation = st.life.generation + 1;
    let worker_shared = Arc::clone(shared);
    let handle = std::thread::Builder::new()
        .name(format!("{name}-worker"))
        .spawn(move || {
            let turn = Turn {
                shared: worker_shared,
                generation,
            };
            if turn.wait_for_device() {
                body(turn);
            }
        })
        .map_err(|e| ProxyError::WorkerSpawn(e.to_string()))?;

    st.life.generation = generation;
    st.life.slot = Some(Slot {
        generation,
        stop: false,
        retiring: false,
        handle: Some(handle),
    });
    tracing::debug!(proxy = name, generation, "worker started");
    Ok(generation)
}

/// Signal the current worker to stop and wait until it has fully exited.
///
/// Returns immediately when no worker is running.
pub(crate) fn stop<P>(shared: &Shared<P>, name: &str) {
    let (generation, handle) = {
        let mut st = shared.lock();
        let Some(slot) = st.life.slot.as_mut() else {
            return;
        };
        slot.stop = true;
        (slot.generation, slot.handle.take())
    };
    shared.notify();

    match handle {
        Some(handle) => {
            if handle.join().is_err() {
                tracing::warn!(proxy = name, generation, "worker panicked before stopping");
            }
        }
        None => {
            // Another caller is joining this generation; wait for its release.
            let mut st = shared.lock();
            while st.life.released < generation {
                st = shared.wait(st);
            }
        }
    }
    tracing::debug!(proxy = name, generation, "worker stopped");
}

/// A worker generation's claim on the proxy.
///
/// Dropping the turn releases the generation: it waits for earlier
/// generations to release first, clears the slot and wakes all waiters. This
/// also runs when the worker body unwinds.
pub(crate) struct Turn<P> {
    shared: Arc<Shared<P>>,
    generation: u64,
}

impl<P> Turn<P> {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn shared(&self) -> &Shared<P> {
        &self.shared
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State<P>> {
        self.shared.lock()
    }

    pub(crate) fn stop_requested(&self, st: &State<P>) -> bool {
        st.life.stop_requested(self.generation)
    }

    /// Record the exit reason and stop accepting work. The caller closes its
    /// device afterwards.
    pub(crate) fn retire(&self, st: &mut State<P>, exit: Exit) {
        st.life.retire(self.generation, exit);
        self.shared.notify();
    }

    /// Wait until the previous generation has closed its device.
    /// Returns false when a stop arrived first.
    fn wait_for_device(&self) -> bool {
        let mut st = self.lock();
        while !st.life.may_open(self.generation) && !st.life.stop_requested(self.generation) {
            st = self.shared.wait(st);
        }
        if st.life.stop_requested(self.generation) {
            self.retire(&mut st, Exit::Stopped);
            return false;
        }
        true
    }
}

impl<P> Drop for Turn<P> {
    fn drop(&mut self) {
        let mut st = self.shared.lock();
        if st.life.is_serving(self.generation) {
            if std::thread::panicking() {
                tracing::error!(generation = self.generation, "worker panicked");
            }
            st.life
                .retire(self.generation, Exit::Failed(ProxyError::DeviceUnavailable));
        }
        while !st.life.may_open(self.generation) {
            st = self.shared.wait(st);
        }
        st.life.release(self.generation);
        self.shared.notify();
    }
}
