use std::hint::black_box;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use strata::conf::{PayloadCodec, UpdateConfig};
use strata::partition::UpdateInput;
use strata::table::{BUCKET_COLUMN, hash_bucket, pack_payload};
use strata::testutil::{RNG_SEED, memory_updater, random_region_batch};

const NUM_BUCKETS: u64 = 64;
const MAX_VALUE: i64 = 1_000_000;

fn bench_hash_bucket(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_bucket");
    for num_rows in [10_000, 1_000_000] {
        let batch = random_region_batch(num_rows, MAX_VALUE, RNG_SEED);
        group.throughput(Throughput::Elements(num_rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", num_rows), &batch, |b, batch| {
            b.iter(|| hash_bucket(black_box(batch), None, NUM_BUCKETS).unwrap())
        });
    }
    group.finish();
}

fn bench_pack_payload(c: &mut Criterion) {
    let batch = random_region_batch(1_000_000, MAX_VALUE, RNG_SEED);
    let batch = hash_bucket(&batch, Some(&["value".to_string()][..]), NUM_BUCKETS).unwrap();
    let key = vec!["region".to_string(), BUCKET_COLUMN.to_string()];

    let mut group = c.benchmark_group("pack_payload");
    group.sample_size(10);
    group.throughput(Throughput::Elements(batch.num_rows() as u64));
    group.bench_function("ipc", |b| {
        b.iter(|| pack_payload(black_box(&batch), &key, PayloadCodec::Ipc).unwrap())
    });
    group.finish();
}

fn bench_shuffle_update(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut config = UpdateConfig::new("bench");
    config.partition_on = vec!["region".into()];
    config.num_buckets = Some(8);
    config.bucket_by = Some(vec!["value".into()]);

    let chunks: Vec<_> = (0..8)
        .map(|i| random_region_batch(100_000, MAX_VALUE, RNG_SEED + i))
        .collect();

    let mut group = c.benchmark_group("shuffle_update");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));
    group.throughput(Throughput::Elements(800_000));
    group.bench_function("chunks_8x100k", |b| {
        b.to_async(&rt).iter(|| async {
            let (updater, _store) = memory_updater(&config);
            let inputs = chunks.iter().cloned().map(UpdateInput::from).collect();
            updater.update(inputs).await.unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_hash_bucket, bench_pack_payload, bench_shuffle_update);
criterion_main!(benches);
