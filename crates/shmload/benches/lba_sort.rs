//! Benchmark for the LBA sort primitive across its three size regimes:
//! insertion sort (small batches), merge sort with stack scratch, and merge
//! sort with heap scratch.
//!
//! Run with: cargo bench --bench lba_sort

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shmload_rs::sort::{sort, Sortable};

/// Deterministic pseudo-random keys (splitmix-style) so every run sorts the
/// same sequence.
fn keys(n: usize) -> Vec<u64> {
    let mut state = 0x9e37_79b9_7f4a_7c15_u64;
    (0..n)
        .map(|_| {
            state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^ (z >> 31)
        })
        .collect()
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("lba_sort");

    // 8: insertion path. 1024/8192: merge with stack scratch.
    // 16384: merge with heap scratch.
    for &n in &[8usize, 1024, 8192, 16384] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("handles", n), &n, |b, &n| {
            let base = keys(n);
            let mut handles: Vec<Sortable> = base
                .iter()
                .map(|&key| Sortable {
                    key,
                    payload: std::ptr::null_mut(),
                })
                .collect();

            b.iter(|| {
                // Rebuild the permutation each iteration; the rebuild is a
                // linear pass and is dwarfed by the sort at these sizes.
                let mut ptrs: Vec<*mut Sortable> =
                    handles.iter_mut().map(std::ptr::from_mut).collect();
                unsafe {
                    sort(black_box(&mut ptrs));
                }
                black_box(ptrs.len())
            });
        });

        group.bench_with_input(BenchmarkId::new("std_baseline", n), &n, |b, &n| {
            let base = keys(n);
            b.iter(|| {
                let mut copy = base.clone();
                copy.sort_unstable();
                black_box(copy.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sort);
criterion_main!(benches);
