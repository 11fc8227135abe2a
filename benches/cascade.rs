use cascade_mph::{Builder, Mphf};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

fn keys(n: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(n as u64);
    let mut keys: Vec<u64> = (0..n).map(|_| rng.next_u64()).collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

fn build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);
    for &n in &[10_000usize, 1_000_000] {
        let ks = keys(n);
        for gamma in [1.5, 2.0, 5.0] {
            group.bench_with_input(
                BenchmarkId::new(format!("gamma={gamma}"), n),
                &ks,
                |b, ks| {
                    b.iter(|| {
                        Builder::new()
                            .with_gamma(gamma)
                            .build(ks.iter().copied())
                            .unwrap()
                    })
                },
            );
        }
        group.bench_with_input(BenchmarkId::new("parallel", n), &ks, |b, ks| {
            b.iter(|| Builder::new().with_threads(0).build(ks.iter().copied()).unwrap())
        });
    }
    group.finish();
}

fn lookup(c: &mut Criterion) {
    let ks = keys(1_000_000);
    for gamma in [1.5, 2.0, 5.0] {
        let mph: Mphf<u64> = Builder::new()
            .with_gamma(gamma)
            .build(ks.iter().copied())
            .unwrap();
        c.bench_function(&format!("lookup/gamma={gamma}"), |b| {
            b.iter(|| {
                let mut acc = 0u64;
                for &k in &ks {
                    acc ^= mph.index(black_box(k));
                }
                acc
            })
        });
    }
}

criterion_group!(benches, build, lookup);
criterion_main!(benches);
