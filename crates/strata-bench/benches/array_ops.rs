//! Criterion micro-benchmarks for the core container operations:
//! fill across memory spaces, amortized push growth, resize, and
//! multi-dimensional indexing.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_array::{Array1, Array2};
use strata_bench::{GRID_SIDE, LARGE_LEN, SMALL_LEN};
use strata_core::MemorySpace;

fn bench_fill_host(c: &mut Criterion) {
    let mut a = Array1::<f64>::with_extents(&[LARGE_LEN]).unwrap();
    c.bench_function("fill_host_1m_f64", |b| {
        b.iter(|| {
            a.fill(black_box(&1.5));
            black_box(a.data());
        });
    });
}

fn bench_fill_device(c: &mut Criterion) {
    let mut a = Array1::<f64>::with_extents_in(&[LARGE_LEN], MemorySpace::Device).unwrap();
    c.bench_function("fill_device_1m_f64", |b| {
        b.iter(|| {
            a.fill(black_box(&1.5));
            black_box(a.data());
        });
    });
}

fn bench_push_growth(c: &mut Criterion) {
    c.bench_function("push_growth_1k", |b| {
        b.iter(|| {
            let mut a = Array1::<u64>::new();
            for v in 0..SMALL_LEN as u64 {
                a.push(black_box(v)).unwrap();
            }
            black_box(a.size())
        });
    });
}

fn bench_resize_cycle(c: &mut Criterion) {
    let mut a = Array1::<u32>::with_extents(&[SMALL_LEN]).unwrap();
    c.bench_function("resize_shrink_grow_1k", |b| {
        b.iter(|| {
            a.resize(&[SMALL_LEN / 2]).unwrap();
            a.resize(&[SMALL_LEN]).unwrap();
            black_box(a.size())
        });
    });
}

fn bench_grid_indexing(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let a = Array2::<f32>::with_extents(&[GRID_SIDE, GRID_SIDE]).unwrap();
    let coords: Vec<[usize; 2]> = (0..SMALL_LEN)
        .map(|_| [rng.random_range(0..GRID_SIDE), rng.random_range(0..GRID_SIDE)])
        .collect();
    c.bench_function("grid_at_1k_random", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for coord in &coords {
                acc += *a.at(black_box(coord));
            }
            black_box(acc)
        });
    });
}

criterion_group!(
    benches,
    bench_fill_host,
    bench_fill_device,
    bench_push_growth,
    bench_resize_cycle,
    bench_grid_indexing,
);
criterion_main!(benches);
