//! Benchmark: Cache hit performance

use archetype_preload::{AssetCache, Resource};
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::executor::block_on;

fn cache_hit_perf_benchmark(c: &mut Criterion) {
    let cache = AssetCache::new(100 * 1024 * 1024);
    for i in 0..1024 {
        let key = format!("sprite-{i}");
        block_on(cache.get_or_load(&key, "bench://", || async {
            Ok(Resource::Bytes(Bytes::from_static(&[0u8; 256])))
        }))
        .unwrap();
    }

    c.bench_function("cache_get_or_load_hit", |b| {
        b.iter(|| {
            let handle = block_on(cache.get_or_load(black_box("sprite-512"), "bench://", || async {
                Ok(Resource::Bytes(Bytes::new()))
            }))
            .unwrap();
            cache.release("sprite-512");
            black_box(handle)
        })
    });

    c.bench_function("cache_get_sync", |b| {
        b.iter(|| black_box(cache.get_sync(black_box("sprite-100"))))
    });

    c.bench_function("cache_get_frame_case_fallback", |b| {
        b.iter(|| black_box(cache.get_frame(black_box("atlas"), black_box("Missing"))))
    });

    c.bench_function("cache_stats", |b| b.iter(|| black_box(cache.stats())));
}

criterion_group!(benches, cache_hit_perf_benchmark);
criterion_main!(benches);
