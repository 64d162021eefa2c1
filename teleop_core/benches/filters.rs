use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use teleop_core::filter::{Blpma, Lpf, SignalFilter};
use teleop_core::guard::{LimitGuard, SensorRange};

// Sine plus white noise, kept inside the guard range.
fn synth_trace(n: usize, noise_amp: f64, seed: u32) -> Vec<f64> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    };
    (0..n)
        .map(|i| {
            let t = i as f64 / 250.0;
            10.0 * (t * std::f64::consts::TAU * 0.5).sin() + (next() * 2.0 - 1.0) * noise_amp
        })
        .collect()
}

fn guard() -> LimitGuard {
    let range = SensorRange::new(-22.5, 22.5).expect("range");
    LimitGuard::with_seed(range, 0.01, 7)
}

fn sample_size(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    //   BENCH_SAMPLE_SIZE=10 cargo bench -p teleop_core --bench filters
    match std::env::var("BENCH_SAMPLE_SIZE").ok().and_then(|s| s.parse::<usize>().ok()) {
        Some(n) => g.sample_size(n.max(10)),
        None => g.sample_size(50),
    };
}

/// Cost of one tick once the history is full: the LPF re-filters its whole
/// window on every sample.
pub fn bench_full_history(c: &mut Criterion) {
    let mut g = c.benchmark_group("full_history");
    sample_size(&mut g);
    let trace = synth_trace(2_000, 0.5, 0xC0FFEE);

    for &window in &[25usize, 100, 250] {
        g.bench_function(format!("lpf_order3_window_{window}"), |b| {
            b.iter_batched(
                || {
                    let mut f = Lpf::new(window, 3, 2.5, 250.0, guard()).expect("lpf");
                    for &v in &trace[..window] {
                        f.compute(v);
                    }
                    f
                },
                |mut f| {
                    for &v in &trace[window..window + 100] {
                        black_box(f.compute(black_box(v)));
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }

    g.bench_function("blpma_20_100_order3", |b| {
        b.iter_batched(
            || Blpma::new(20, 100, 3, 1.95, 250.0, guard()).expect("blpma"),
            |mut f| {
                for &v in &trace[..500] {
                    black_box(f.compute(black_box(v)));
                }
            },
            BatchSize::SmallInput,
        )
    });
    g.finish();
}

criterion_group!(filters, bench_full_history);
criterion_main!(filters);
