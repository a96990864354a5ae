//! Benchmarks for core txm operations: tree construction, proof generation,
//! verification, hashing and record encoding.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::Serialize;
use txm_core::{
    Blake3Hash, CanonicalJson, Digest, HashFunction, OddNodePolicy, Proof, Record, RecordCodec,
    Sha256Hash, TreeBuilder, Verifier,
};

#[derive(Debug, Clone, Serialize)]
struct Transfer {
    id: u64,
    from: String,
    to: String,
    amount: u64,
}

impl Record for Transfer {
    type Key = u64;

    fn key(&self) -> u64 {
        self.id
    }
}

fn make_records(n: usize) -> Vec<Transfer> {
    (0..n as u64)
        .map(|id| Transfer {
            id,
            from: format!("User{}", id),
            to: format!("User{}", id + 1),
            amount: id % 10 + 1,
        })
        .collect()
}

fn bench_tree_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_construction");

    for size in [1, 10, 100, 1000, 10000] {
        let records = make_records(size);
        for policy in [OddNodePolicy::Promote, OddNodePolicy::Duplicate] {
            let builder = TreeBuilder::new(Blake3Hash, CanonicalJson).with_policy(policy);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", policy), size),
                &records,
                |b, records| b.iter(|| builder.build(records).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_proof_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("proof_generation");

    for size in [10, 100, 1000, 10000] {
        let records = make_records(size);
        let tree = TreeBuilder::new(Blake3Hash, CanonicalJson)
            .build(&records)
            .unwrap();
        let key = (size / 2) as u64;

        group.bench_with_input(BenchmarkId::new("leaves", size), &key, |b, key| {
            b.iter(|| tree.prove(key).unwrap());
        });
    }
    group.finish();
}

fn bench_verification(c: &mut Criterion) {
    let records = make_records(1024);
    let builder = TreeBuilder::new(Blake3Hash, CanonicalJson);
    let tree = builder.build(&records).unwrap();
    let root = *tree.root().unwrap();
    let proof = tree.prove(&512).unwrap();
    let context = tree.as_built().unwrap().context();
    let verifier = Verifier::from(&builder);

    c.bench_function("verify_1024_leaves", |b| {
        b.iter(|| verifier.verify(&records[512], &proof, &root).unwrap());
    });

    c.bench_function("verify_in_context_1024_leaves", |b| {
        b.iter(|| {
            verifier
                .verify_in_context(&records[512], &proof, &root, &context)
                .unwrap()
        });
    });
}

fn bench_hash_operations(c: &mut Criterion) {
    let d1 = Digest::new([1u8; 32]);
    let d2 = Digest::new([2u8; 32]);

    c.bench_function("blake3_hash_pair", |b| {
        b.iter(|| Blake3Hash.hash_pair(&d1, &d2));
    });

    c.bench_function("sha256_hash_pair", |b| {
        b.iter(|| Sha256Hash.hash_pair(&d1, &d2));
    });
}

fn bench_serialization(c: &mut Criterion) {
    let record = make_records(1).remove(0);
    c.bench_function("canonical_json_encode", |b| {
        b.iter(|| CanonicalJson.encode(&record).unwrap());
    });

    let records = make_records(1000);
    let tree = TreeBuilder::new(Blake3Hash, CanonicalJson)
        .build(&records)
        .unwrap();
    let proof = tree.prove(&500).unwrap();
    let json = proof.to_json().unwrap();

    c.bench_function("proof_serialize_json", |b| {
        b.iter(|| proof.to_json().unwrap());
    });

    c.bench_function("proof_deserialize_json", |b| {
        b.iter(|| Proof::from_json(&json).unwrap());
    });
}

criterion_group!(
    benches,
    bench_tree_construction,
    bench_proof_generation,
    bench_verification,
    bench_hash_operations,
    bench_serialization,
);
criterion_main!(benches);
