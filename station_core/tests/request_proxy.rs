//! `RequestProxy`: one result per action, overwrite semantics, failures, and
//! the shared idle/stop lifecycle.

use rstest::rstest;
use station_core::mocks::{ActionDevice, Probe, action_factory, failing_factory};
use station_core::{Actionable, ProxyCfg, ProxyError, RequestProxy};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn proxy(probe: &Probe, cfg: ProxyCfg) -> RequestProxy<ActionDevice, u64> {
    RequestProxy::new("camera:test", cfg, action_factory(probe))
}

#[test]
fn action_runs_once_and_result_is_claimed_once() {
    let probe = Probe::new();
    let proxy = proxy(&probe, ProxyCfg::persistent());
    let runs = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&runs);
    proxy
        .request_action(move |dev: &mut ActionDevice| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(dev.touch() * 10)
        })
        .unwrap();
    assert_eq!(proxy.get_result(None), Ok(10));

    // Nothing left to claim: the worker is alive, so a bounded wait keeps
    // waiting until the worker goes away.
    proxy.stop();
    assert_eq!(
        proxy.get_result(Some(Duration::from_millis(10))),
        Err(ProxyError::WorkerTerminated)
    );
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn second_request_overwrites_unclaimed_first() {
    let probe = Probe::new();
    let proxy = proxy(&probe, ProxyCfg::persistent());

    // Hold the worker inside the first action so the next two queue up.
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    proxy
        .request_action(move |_dev: &mut ActionDevice| {
            entered_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            Ok(1)
        })
        .unwrap();
    entered_rx.recv().unwrap();

    let ran_second = Arc::new(AtomicU32::new(0));
    let flag = Arc::clone(&ran_second);
    proxy
        .request_action(move |_dev: &mut ActionDevice| {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(2)
        })
        .unwrap();
    proxy.request_action(|_dev: &mut ActionDevice| Ok(3)).unwrap();
    release_tx.send(()).unwrap();

    assert_eq!(proxy.get_result(None), Ok(3));
    // The replaced action never ran; the in-flight one ran but its result
    // was dropped.
    assert_eq!(ran_second.load(Ordering::SeqCst), 0);
}

#[test]
fn replaced_perform_returns_superseded() {
    let probe = Probe::new();
    let proxy = Arc::new(proxy(&probe, ProxyCfg::persistent()));

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel();

    let first = {
        let proxy = Arc::clone(&proxy);
        let done_tx = done_tx.clone();
        thread::spawn(move || {
            let out = proxy.perform(move |_dev: &mut ActionDevice| {
                entered_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(1)
            });
            done_tx.send(("first", out)).unwrap();
        })
    };
    entered_rx.recv().unwrap();

    let second = {
        let proxy = Arc::clone(&proxy);
        thread::spawn(move || {
            let out = proxy.perform(|_dev: &mut ActionDevice| Ok(2));
            done_tx.send(("second", out)).unwrap();
        })
    };

    // The first caller learns about the replacement while its action is
    // still running.
    let (who, out) = done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!((who, out), ("first", Err(ProxyError::Superseded)));
    release_tx.send(()).unwrap();

    let (who, out) = done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!((who, out), ("second", Ok(2)));
    first.join().unwrap();
    second.join().unwrap();
}

#[test]
fn overlapping_performs_both_return() {
    let probe = Probe::new();
    let proxy = Arc::new(proxy(&probe, ProxyCfg::persistent()));
    let (tx, rx) = mpsc::channel();

    for i in 0..2u64 {
        let proxy = Arc::clone(&proxy);
        let tx = tx.clone();
        thread::spawn(move || {
            let out = proxy.perform(move |_dev: &mut ActionDevice| {
                thread::sleep(Duration::from_millis(50));
                Ok(i + 1)
            });
            tx.send(out).unwrap();
        });
        thread::sleep(Duration::from_millis(5));
    }

    let mut outcomes = vec![
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
    ];
    outcomes.sort_by_key(|o| o.is_err());
    assert!(outcomes[0].is_ok());
    assert!(matches!(outcomes[1], Ok(_) | Err(ProxyError::Superseded)));
}

#[test]
fn failed_action_keeps_worker_serving() {
    let probe = Probe::new();
    let proxy = proxy(&probe, ProxyCfg::persistent());

    let err = proxy
        .perform(|_dev: &mut ActionDevice| Err("lens cap on".into()))
        .unwrap_err();
    assert_eq!(err, ProxyError::ActionFailed("lens cap on".to_string()));
    assert!(!err.is_worker_fatal());

    assert_eq!(proxy.perform(|dev: &mut ActionDevice| Ok(dev.touch())), Ok(1));
    assert_eq!(probe.opens(), 1);
}

#[test]
fn idle_time_counts_from_last_completed_action() {
    let probe = Probe::new();
    let proxy = proxy(&probe, ProxyCfg::with_idle_timeout(Duration::from_millis(150)));

    // The action itself outlasts the idle timeout; the worker must not
    // retire right after finishing it.
    let slow = proxy.perform(|dev: &mut ActionDevice| {
        thread::sleep(Duration::from_millis(250));
        Ok(dev.touch())
    });
    assert_eq!(slow, Ok(1));
    assert!(proxy.is_running());
    assert_eq!(proxy.perform(|dev: &mut ActionDevice| Ok(dev.touch())), Ok(2));
    assert_eq!(probe.opens(), 1);

    thread::sleep(Duration::from_millis(400));
    assert!(!proxy.is_running());
    assert_eq!(probe.closes(), 1);

    // A fresh device instance after teardown.
    assert_eq!(proxy.perform(|dev: &mut ActionDevice| Ok(dev.touch())), Ok(1));
    assert_eq!(probe.opens(), 2);
}

#[rstest]
#[case(None)]
#[case(Some(Duration::from_millis(5)))]
fn open_failure_surfaces_to_get_result(#[case] grace: Option<Duration>) {
    let probe = Probe::new();
    let proxy: RequestProxy<ActionDevice, u64> = RequestProxy::new(
        "camera:missing",
        ProxyCfg::default(),
        failing_factory(&probe, "camera not found"),
    );
    proxy.request_action(|dev: &mut ActionDevice| Ok(dev.touch())).unwrap();
    match proxy.get_result(grace) {
        Err(ProxyError::DeviceOpen(msg)) => assert!(msg.contains("camera not found")),
        other => panic!("expected DeviceOpen, got {other:?}"),
    }
}

#[test]
fn stop_with_pending_action_terminates_waiter() {
    let probe = Probe::new();
    let proxy = Arc::new(proxy(&probe, ProxyCfg::persistent()));

    let (entered_tx, entered_rx) = mpsc::channel();
    proxy
        .request_action(move |_dev: &mut ActionDevice| {
            entered_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(100));
            Ok(1)
        })
        .unwrap();
    entered_rx.recv().unwrap();
    // Queued behind the running action; the stop lands first.
    proxy.request_action(|_dev: &mut ActionDevice| Ok(2)).unwrap();

    let waiter = {
        let proxy = Arc::clone(&proxy);
        thread::spawn(move || proxy.get_result(Some(Duration::from_millis(20))))
    };
    proxy.stop();
    assert_eq!(waiter.join().unwrap(), Err(ProxyError::WorkerTerminated));

    // The dropped action does not leak into the next worker.
    assert_eq!(proxy.perform(|dev: &mut ActionDevice| Ok(dev.touch() + 100)), Ok(101));
}

#[test]
fn panicking_action_terminates_waiter() {
    let probe = Probe::new();
    let proxy = proxy(&probe, ProxyCfg::persistent());
    proxy
        .request_action(|_dev: &mut ActionDevice| panic!("driver bug"))
        .unwrap();
    assert_eq!(proxy.get_result(None), Err(ProxyError::WorkerTerminated));
    // The device the panic interrupted is still closed.
    proxy.stop();
    assert_eq!((probe.opens(), probe.closes()), (1, 1));
    // The next action gets a fresh worker.
    assert_eq!(proxy.perform(|dev: &mut ActionDevice| Ok(dev.touch())), Ok(1));
    assert_eq!(probe.opens(), 2);
}

#[test]
fn concurrent_submitters_never_open_two_devices() {
    let probe = Probe::new();
    let proxy = Arc::new(proxy(&probe, ProxyCfg::with_idle_timeout(Duration::ZERO)));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let proxy = Arc::clone(&proxy);
            thread::spawn(move || {
                for _ in 0..20 {
                    proxy
                        .request_action(|dev: &mut ActionDevice| Ok(dev.touch()))
                        .unwrap();
                    // Overwrites from other threads may leave nothing to claim.
                    let _ = proxy.get_result(Some(Duration::from_millis(5)));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    proxy.stop();

    assert_eq!(probe.max_live(), 1);
    assert_eq!(probe.opens(), probe.closes());
}

fn touch_twice<A: Actionable<ActionDevice, u64>>(target: &A) -> Result<u64, ProxyError> {
    target.perform(|dev: &mut ActionDevice| Ok(dev.touch()))?;
    target.perform(|dev: &mut ActionDevice| Ok(dev.touch()))
}

#[test]
fn usable_through_actionable() {
    let probe = Probe::new();
    let p = proxy(&probe, ProxyCfg::persistent());
    assert_eq!(touch_twice(&p), Ok(2));
    assert_eq!(probe.opens(), 1);
}
