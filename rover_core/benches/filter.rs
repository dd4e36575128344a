use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rover_core::filter::DistanceFilter;

// Noisy ranges around 300 mm with occasional dropouts, like a sensor facing a wall.
fn synth_ranges(n: usize, seed: u32) -> Vec<u16> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    (0..n)
        .map(|_| {
            let r = next();
            if r % 17 == 0 { 0 } else { 250 + (r % 100) as u16 }
        })
        .collect()
}

fn bench_filter(c: &mut Criterion) {
    let ranges = synth_ranges(10_000, 0x5eed);

    c.bench_function("accumulate_and_best_guess", |b| {
        b.iter(|| {
            let mut f = DistanceFilter::new();
            let mut acc = 0u32;
            for &r in &ranges {
                f.accumulate(black_box(r));
                acc = acc.wrapping_add(u32::from(f.best_guess()));
            }
            black_box(acc)
        });
    });

    c.bench_function("is_far", |b| {
        let mut f = DistanceFilter::new();
        for &r in ranges.iter().take(3) {
            f.accumulate(r);
        }
        b.iter(|| black_box(&f).is_far());
    });
}

criterion_group!(benches, bench_filter);
criterion_main!(benches);
