use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use handle_map::HandleMap;
use rustc_hash::FxHashMap;
use std::hint::black_box;

// ========== 与 FxHashMap 的对比测试 ==========

/// 测试插入操作性能
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_vs_hashmap");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("HandleMap", size), size, |b, &size| {
            b.iter(|| {
                let mut map = HandleMap::new(0);
                for i in 0..size {
                    map.insert(black_box(i));
                }
                map
            });
        });

        group.bench_with_input(BenchmarkId::new("FxHashMap", size), size, |b, &size| {
            b.iter(|| {
                let mut map = FxHashMap::default();
                for i in 0..size {
                    map.insert(i as u64, black_box(i));
                }
                map
            });
        });
    }

    group.finish();
}

/// 测试查询操作性能
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_vs_hashmap");

    for size in [100, 1000, 10000].iter() {
        let mut handle_map = HandleMap::new(0);
        let handles: Vec<_> = (0..*size).map(|i| handle_map.insert(i)).collect();

        group.bench_with_input(BenchmarkId::new("HandleMap", size), size, |b, _| {
            b.iter(|| {
                for &handle in &handles {
                    black_box(handle_map.get(handle));
                }
            });
        });

        let mut hash_map = FxHashMap::default();
        for i in 0..*size {
            hash_map.insert(i as u64, i);
        }

        group.bench_with_input(BenchmarkId::new("FxHashMap", size), size, |b, _| {
            b.iter(|| {
                for key in 0..*size as u64 {
                    black_box(hash_map.get(&key));
                }
            });
        });
    }

    group.finish();
}

/// 测试删除操作性能
fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_vs_hashmap");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("HandleMap", size), size, |b, &size| {
            b.iter_batched(
                || {
                    let mut map = HandleMap::new(0);
                    let handles: Vec<_> = (0..size).map(|i| map.insert(i)).collect();
                    (map, handles)
                },
                |(mut map, handles)| {
                    for &handle in &handles {
                        black_box(map.remove(handle));
                    }
                    map
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("FxHashMap", size), size, |b, &size| {
            b.iter_batched(
                || {
                    let mut map = FxHashMap::default();
                    for i in 0..size {
                        map.insert(i as u64, i);
                    }
                    map
                },
                |mut map| {
                    for key in 0..size as u64 {
                        black_box(map.remove(&key));
                    }
                    map
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// 测试遍历性能：密集存储对哈希桶
fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate_vs_hashmap");

    for size in [1000, 10000].iter() {
        let mut handle_map = HandleMap::new(0);
        for i in 0..*size {
            handle_map.insert(i as u64);
        }

        group.bench_with_input(BenchmarkId::new("HandleMap", size), size, |b, _| {
            b.iter(|| {
                let mut sum = 0u64;
                for value in handle_map.items() {
                    sum = sum.wrapping_add(*value);
                }
                black_box(sum)
            });
        });

        let mut hash_map = FxHashMap::default();
        for i in 0..*size {
            hash_map.insert(i as u64, i as u64);
        }

        group.bench_with_input(BenchmarkId::new("FxHashMap", size), size, |b, _| {
            b.iter(|| {
                let mut sum = 0u64;
                for value in hash_map.values() {
                    sum = sum.wrapping_add(*value);
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_get,
    bench_remove,
    bench_iterate
);
criterion_main!(benches);
