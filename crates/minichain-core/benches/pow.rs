use criterion::{criterion_group, criterion_main, Criterion};
use minichain_core::{pow, Block, Record};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn bench_pow(c: &mut Criterion) {
    c.bench_function("mine_difficulty_3", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        let record = Record::new(
            format!("alice-{}", rng.gen_range(0..1000)),
            "bob",
            rng.gen_range(1..100),
        );
        let block = Block::new(record, 42, "0".to_string());

        b.iter(|| {
            let mut candidate = block.clone();
            pow::mine(&mut candidate, 3)
        });
    });

    c.bench_function("hash_block", |b| {
        let block = Block::new(Record::new("alice", "bob", 10), 42, "0".to_string());
        b.iter(|| block.hash());
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
