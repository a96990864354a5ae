//! Throughput benchmarks for the txm ledger

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use txm_ledger::config::{StorageConfig, TreeConfig};
use txm_ledger::{Ledger, LedgerConfig};

fn filled(n: u64) -> Ledger {
    let ledger = Ledger::in_memory(TreeConfig::default());
    let mut rng = StdRng::seed_from_u64(n);
    for _ in 0..n {
        ledger.generate(&mut rng).expect("generate failed");
    }
    ledger
}

fn bench_append_then_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_then_root");

    for size in [100u64, 1000, 10000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter_batched(
                || filled(size),
                |ledger| {
                    // One append forces a full rebuild on the next read
                    ledger.generate(&mut rng).expect("generate failed");
                    ledger.root().expect("root failed")
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_receipts(c: &mut Criterion) {
    let mut group = c.benchmark_group("receipts");

    for size in [100u64, 1000, 10000] {
        let ledger = filled(size);
        ledger.root().expect("root failed");

        group.bench_with_input(BenchmarkId::new("issue", size), &size, |b, &size| {
            b.iter(|| ledger.prove(size / 2).expect("prove failed"));
        });

        let receipt = ledger.prove(size / 2).expect("prove failed");
        group.bench_with_input(BenchmarkId::new("verify", size), &receipt, |b, receipt| {
            b.iter(|| receipt.verify().expect("verify failed"));
        });
    }
    group.finish();
}

fn bench_persisted_appends(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let ledger = Ledger::open(&LedgerConfig {
        storage: StorageConfig {
            path: dir.path().to_path_buf(),
        },
        ..LedgerConfig::default()
    })
    .expect("open failed");
    let mut rng = StdRng::seed_from_u64(1);

    c.bench_function("persisted_append", |b| {
        b.iter(|| ledger.generate(&mut rng).expect("generate failed"));
    });
}

criterion_group!(
    benches,
    bench_append_then_root,
    bench_receipts,
    bench_persisted_appends
);
criterion_main!(benches);
