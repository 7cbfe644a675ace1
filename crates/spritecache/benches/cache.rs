use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use spritecache::{fetcher_fn, AssetCache, AssetKey, Error};
use tokio::runtime::Runtime;

fn bench_cached_fetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_fetch");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("fetch_hit_callback", |b| {
        let rt = Runtime::new().unwrap();
        let fetcher = fetcher_fn(|key: AssetKey| async move {
            Ok::<_, Error>(vec![0u8; key.as_str().len()])
        });
        let cache = AssetCache::new(fetcher, rt.handle().clone());

        // Warm the cache
        let keys: Vec<AssetKey> = (0..100)
            .map(|i| AssetKey::new(format!("https://example.com/img/{}.png", i)).unwrap())
            .collect();
        rt.block_on(async {
            for key in &keys {
                cache.get(key.clone()).await.unwrap();
            }
        });

        let mut counter = 0;
        b.iter(|| {
            cache.fetch(keys[counter % 100].clone(), counter, |ctx, result| {
                black_box((ctx, result.unwrap().len()));
            });
            counter += 1;
        });
    });

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    group.sample_size(50);
    group.throughput(Throughput::Elements(64));

    group.bench_function("64_waiters_one_fetch", |b| {
        let rt = Runtime::new().unwrap();

        let mut round = 0u64;
        b.iter(|| {
            // Fresh cache per round so every iteration is a cold fetch
            let fetcher = fetcher_fn(|_key: AssetKey| async move {
                tokio::task::yield_now().await;
                Ok::<_, Error>(Arc::new([0u8; 1024]))
            });
            let cache = AssetCache::new(fetcher, rt.handle().clone());
            let key = AssetKey::new(format!("img/{}", round)).unwrap();
            round += 1;

            rt.block_on(async {
                let gets = (0..64).map(|_| cache.get(key.clone()));
                black_box(futures::future::join_all(gets).await);
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cached_fetch, bench_fan_out);
criterion_main!(benches);
