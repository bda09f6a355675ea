use criterion::{Criterion, black_box, criterion_group, criterion_main};
use station_core::mocks::{Probe, fixed_factory, sequence_factory};
use station_core::{Calibratable, CalibratedView, MedianWindow, ProxyCfg, RequestProxy, ThreadedProxy};
use std::time::Duration;

fn sample_size_from_env(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // Quick runs without CLI flags:
    //   BENCH_SAMPLE_SIZE=10 cargo bench -p station_core --bench proxy_read
    match std::env::var("BENCH_SAMPLE_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    {
        Some(n) => g.sample_size(n.max(10)),
        None => g.sample_size(50),
    };
}

pub fn bench_warm_read(c: &mut Criterion) {
    let mut g = c.benchmark_group("warm_read");
    sample_size_from_env(&mut g);

    let probe = Probe::new();
    let proxy = ThreadedProxy::new("bench", ProxyCfg::persistent(), sequence_factory(&probe, Duration::ZERO));
    proxy.read().unwrap();
    g.bench_function("threaded_read", |b| b.iter(|| black_box(proxy.read().unwrap())));

    let view = CalibratedView::tare(ThreadedProxy::refined(
        "bench-median",
        ProxyCfg::persistent(),
        fixed_factory(&probe, 12.5_f32),
        MedianWindow::new(5),
    ));
    view.obtain(0.0).unwrap();
    g.bench_function("calibrated_obtain_median5", |b| {
        b.iter(|| black_box(view.obtain(black_box(2.0)).unwrap()))
    });

    g.finish();
}

pub fn bench_perform(c: &mut Criterion) {
    let mut g = c.benchmark_group("request_perform");
    sample_size_from_env(&mut g);

    let probe = Probe::new();
    let proxy: RequestProxy<_, u64> = RequestProxy::new(
        "bench",
        ProxyCfg::persistent(),
        station_core::mocks::action_factory(&probe),
    );
    g.bench_function("perform_roundtrip", |b| {
        b.iter(|| black_box(proxy.perform(|dev| Ok(dev.touch())).unwrap()))
    });
    g.finish();
}

criterion_group!(benches, bench_warm_read, bench_perform);
criterion_main!(benches);
