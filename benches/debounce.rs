use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use diagqual::debounce::{apply_pre_event, DebounceState};
use diagqual::{notifier, DebounceConfig, DebounceEngine, EngineConfig};

fn bench_policy_counter(c: &mut Criterion) {
    let config = DebounceConfig::counter(50, 50, 1, 1);
    c.bench_function("debounce/policy_counter_alternating", |b| {
        let mut state = DebounceState::new();
        let now = Instant::now();
        let mut pre_failed = false;
        b.iter(|| {
            pre_failed = !pre_failed;
            black_box(apply_pre_event(&mut state, &config, black_box(pre_failed), now))
        });
    });
}

fn bench_engine_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_report");
    group.throughput(Throughput::Elements(1));

    group.bench_function("counter_monitor_with_notifier", |b| {
        b.iter_custom(|iters| {
            // Fresh engine per sample; registration is excluded from timing.
            let engine = DebounceEngine::default();
            let n = notifier::notifier(|id, state| {
                black_box((id, state));
            });
            engine
                .register_monitor("bench", DebounceConfig::counter(3, 3, 1, 1), Some(n))
                .unwrap();

            let start = Instant::now();
            for i in 0..iters {
                // Period of 8 crosses both thresholds, so notifications are included.
                engine.report_pre_event("bench", i % 8 < 4).unwrap();
            }
            start.elapsed()
        });
    });

    group.bench_function("among_1024_monitors", |b| {
        b.iter_custom(|iters| {
            let engine = DebounceEngine::default();
            for i in 0..1024 {
                engine
                    .register_monitor(format!("m{i}"), DebounceConfig::default(), None)
                    .unwrap();
            }
            let ids: Vec<String> = (0..1024).map(|i| format!("m{i}")).collect();

            let start = Instant::now();
            for i in 0..iters {
                let idx = usize::try_from(i % 1024).unwrap();
                engine.report_pre_event(&ids[idx], i % 2 == 0).unwrap();
            }
            start.elapsed()
        });
    });

    group.finish();
}

fn bench_ticker_scan(c: &mut Criterion) {
    c.bench_function("engine/time_monitor_report", |b| {
        b.iter_custom(|iters| {
            let engine = DebounceEngine::new(EngineConfig {
                tick_interval_ms: 1,
                ..EngineConfig::default()
            })
            .unwrap();
            for i in 0..256 {
                engine
                    .register_monitor(format!("t{i}"), DebounceConfig::time(60_000), None)
                    .unwrap();
            }

            // Reports contend with a ticker scanning every millisecond.
            let start = Instant::now();
            for i in 0..iters {
                let idx = i % 256;
                engine.report_pre_event(format!("t{idx}"), i % 3 == 0).unwrap();
            }
            let elapsed = start.elapsed();
            engine.shutdown();
            elapsed
        });
    });
}

criterion_group!(debounce, bench_policy_counter, bench_engine_report, bench_ticker_scan);
criterion_main!(debounce);
