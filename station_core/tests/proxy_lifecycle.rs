//! Worker lifecycle of `ThreadedProxy`: lazy start, idle teardown, restart,
//! stop, and failure reporting.

use station_core::mocks::{
    FixedDevice, Probe, failing_factory, fixed_factory, panicking_factory, sequence_factory,
    sequence_factory_failing,
};
use station_core::{ProxyCfg, ProxyError, ThreadedProxy};
use station_traits::{BoxError, Device, Readable};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn nothing_opens_before_first_read() {
    let probe = Probe::new();
    let proxy = ThreadedProxy::new("scale", ProxyCfg::default(), sequence_factory(&probe, Duration::ZERO));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(probe.opens(), 0);
    assert!(!proxy.is_running());
    assert_eq!(proxy.starts(), 0);
}

#[test]
fn eager_proxy_opens_on_construction() {
    let probe = Probe::new();
    let cfg = ProxyCfg {
        eager: true,
        ..ProxyCfg::persistent()
    };
    let proxy = ThreadedProxy::new("scale", cfg, sequence_factory(&probe, Duration::from_millis(1)));
    assert!(wait_until(Duration::from_secs(1), || probe.opens() == 1));
    assert!(proxy.read().unwrap() >= 1);
    assert_eq!(proxy.starts(), 1);
}

#[test]
fn idle_timeout_scenario() {
    let probe = Probe::new();
    let proxy = ThreadedProxy::new(
        "sensor",
        ProxyCfg::with_idle_timeout(Duration::from_millis(200)),
        sequence_factory(&probe, Duration::from_millis(10)),
    );

    let started = Instant::now();
    let first = proxy.read().unwrap();
    assert!(first >= 1);
    assert!(started.elapsed() < Duration::from_secs(1));

    thread::sleep(Duration::from_millis(500));
    assert!(!proxy.is_running(), "worker should have idled out");
    assert_eq!(probe.closes(), 1);
    assert_eq!(probe.live(), 0);

    let second = proxy.read().unwrap();
    assert!(second >= 1);
    assert!(second > first);
    assert_eq!(probe.opens(), 2);
    assert_eq!(proxy.starts(), 2);
}

#[test]
fn concurrent_readers_share_one_worker() {
    let probe = Probe::new();
    let proxy = Arc::new(ThreadedProxy::new(
        "scale",
        ProxyCfg::persistent(),
        sequence_factory(&probe, Duration::from_millis(2)),
    ));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let proxy = Arc::clone(&proxy);
            thread::spawn(move || {
                for _ in 0..20 {
                    proxy.read().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(probe.opens(), 1);
    assert_eq!(probe.max_live(), 1);
    assert_eq!(proxy.starts(), 1);
}

#[test]
fn restarts_never_overlap_device_instances() {
    let probe = Probe::new();
    // Idle timeout shorter than a read: the worker retires after every read
    // and callers keep arriving during the close.
    let proxy = Arc::new(ThreadedProxy::new(
        "sensor",
        ProxyCfg::with_idle_timeout(Duration::ZERO),
        sequence_factory(&probe, Duration::from_millis(3)),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let proxy = Arc::clone(&proxy);
            thread::spawn(move || {
                for _ in 0..25 {
                    proxy.read().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    proxy.stop();

    assert!(probe.opens() > 1, "expected restarts, got {}", probe.opens());
    assert_eq!(probe.max_live(), 1);
    assert_eq!(probe.opens(), proxy.starts());
    assert_eq!(probe.opens(), probe.closes());
}

#[test]
fn stop_is_idempotent_and_allows_restart() {
    let probe = Probe::new();
    let proxy = ThreadedProxy::new("scale", ProxyCfg::persistent(), sequence_factory(&probe, Duration::ZERO));

    proxy.stop();
    proxy.stop();
    assert_eq!(probe.opens(), 0);

    proxy.read().unwrap();
    proxy.stop();
    assert!(!proxy.is_running());
    assert_eq!(probe.closes(), 1);
    proxy.stop();

    proxy.read().unwrap();
    assert_eq!(probe.opens(), 2);
}

#[test]
fn drop_closes_the_device() {
    let probe = Probe::new();
    let proxy = ThreadedProxy::new("scale", ProxyCfg::persistent(), sequence_factory(&probe, Duration::ZERO));
    proxy.read().unwrap();
    drop(proxy);
    assert_eq!(probe.closes(), 1);
    assert_eq!(probe.live(), 0);
}

#[test]
fn open_failure_reaches_the_waiting_caller() {
    let probe = Probe::new();
    let proxy = ThreadedProxy::<u64>::new(
        "scale",
        ProxyCfg::default(),
        failing_factory::<FixedDevice<u64>>(&probe, "no such port"),
    );

    match proxy.read() {
        Err(ProxyError::DeviceOpen(msg)) => assert!(msg.contains("no such port")),
        other => panic!("expected DeviceOpen, got {other:?}"),
    }
    assert!(wait_until(Duration::from_secs(1), || !proxy.is_running()));

    // Every read retries the factory.
    assert!(matches!(proxy.read(), Err(ProxyError::DeviceOpen(_))));
    assert_eq!(probe.opens(), 2);
}

#[test]
fn read_errors_do_not_stop_the_worker() {
    let probe = Probe::new();
    let proxy = ThreadedProxy::new(
        "scale",
        ProxyCfg::persistent(),
        sequence_factory_failing(&probe, Duration::from_millis(2), Some(2)),
    );

    let mut saw_error = false;
    let mut saw_value = false;
    let deadline = Instant::now() + Duration::from_secs(2);
    while !(saw_error && saw_value) && Instant::now() < deadline {
        match proxy.read() {
            Ok(_) => saw_value = true,
            Err(ProxyError::DeviceRead(_)) => saw_error = true,
            Err(other) => panic!("unexpected {other:?}"),
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert!(saw_error && saw_value);
    assert_eq!(probe.opens(), 1);
    assert!(proxy.is_running());
}

#[test]
fn stop_while_waiting_for_first_value_reports_unavailable() {
    struct Slow;
    impl Device for Slow {}
    impl Readable<u64> for Slow {
        fn read(&mut self) -> Result<u64, BoxError> {
            Err("not ready".into())
        }
    }
    // Open takes a while so the stop lands before anything is published.
    let proxy = Arc::new(ThreadedProxy::new("slow", ProxyCfg::persistent(), || {
        thread::sleep(Duration::from_millis(100));
        Ok(Slow)
    }));

    let reader = {
        let proxy = Arc::clone(&proxy);
        thread::spawn(move || proxy.read())
    };
    thread::sleep(Duration::from_millis(20));
    proxy.stop();

    assert_eq!(reader.join().unwrap(), Err(ProxyError::DeviceUnavailable));
}

#[test]
fn panicking_device_is_reported_not_hung() {
    let probe = Probe::new();
    let proxy = ThreadedProxy::new("bomb", ProxyCfg::persistent(), panicking_factory(&probe));
    assert_eq!(proxy.read(), Err(ProxyError::DeviceUnavailable));
    assert!(wait_until(Duration::from_secs(1), || !proxy.is_running()));
    // The panic does not skip close().
    assert_eq!(probe.opens(), 1);
    assert_eq!(probe.closes(), 1);
    assert_eq!(probe.live(), 0);
}

#[test]
fn refine_stage_survives_restarts() {
    let probe = Probe::new();
    let proxy = ThreadedProxy::refined(
        "sensor",
        ProxyCfg::persistent(),
        fixed_factory(&probe, 10.0_f32),
        station_core::MedianWindow::new(3),
    );
    assert_eq!(proxy.read().unwrap(), 10.0);
    proxy.stop();
    assert_eq!(proxy.read().unwrap(), 10.0);
    assert_eq!(probe.opens(), 2);
}
