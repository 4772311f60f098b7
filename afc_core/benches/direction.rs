use afc_core::config::{DirectionCfg, PowerCfg};
use afc_core::direction::DirectionEngine;
use afc_core::history::Sample;
use afc_core::sampling::to_db;
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// Samples sweeping across a resonance dip with a little noise.
fn synth_sweep(n: usize, seed: u32) -> Vec<Sample> {
    let mut state = seed.max(1);
    let mut jitter = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x % 41) as i32 - 20
    };
    let cfg = PowerCfg::default();
    (0..n)
        .map(|i| {
            let position = 14_000 + ((i * 32) % 7_000) as u16;
            let d = f32::from(position) - 17_500.0;
            let dip = 9.0e6 / (9.0e6 + d * d);
            let reading = (5_625.0 + 15_000.0 * dip) as i32 + jitter();
            Sample {
                position,
                reverse_db: to_db(reading.clamp(0, 65_535) as u16, &cfg),
                forward_db: 0,
            }
        })
        .collect()
}

pub fn bench_decide(c: &mut Criterion) {
    let mut g = c.benchmark_group("direction");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p afc_core --bench direction
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let samples = synth_sweep(10_000, 0xAFC0);
    g.bench_function("decide_10k", |b| {
        b.iter_batched(
            || DirectionEngine::new(DirectionCfg::default()),
            |mut engine| {
                for (i, s) in samples.iter().enumerate() {
                    let d = engine.decide(*s, s.position, black_box(i as u32));
                    black_box(d);
                }
            },
            BatchSize::SmallInput,
        )
    });
    g.finish();
}

criterion_group!(direction, bench_decide);
criterion_main!(direction);
