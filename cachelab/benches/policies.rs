use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use cachelab::cache::CacheSim;
use cachelab::config::{Associativity, CacheConfig, ReplacementPolicyConfig};
use cachelab::transaction::AccessType;

const POLICIES: [ReplacementPolicyConfig; 5] = [
    ReplacementPolicyConfig::Random,
    ReplacementPolicyConfig::LeastRecentlyUsed,
    ReplacementPolicyConfig::LruInsertion,
    ReplacementPolicyConfig::PseudoLeastRecentlyUsed,
    ReplacementPolicyConfig::DynamicInsertion,
];

/// A loop over a working set slightly larger than the cache, with random accesses mixed in
fn stream(length: usize) -> Vec<(u32, AccessType)> {
    let mut rng = StdRng::seed_from_u64(4202);
    (0..length)
        .map(|i| {
            let address = if rng.random_bool(0.8) {
                (i as u32 % 320) * 16
            } else {
                rng.random_range(0..1 << 16)
            };
            let access = if rng.random_bool(0.3) { AccessType::Write } else { AccessType::Read };
            (address, access)
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let accesses = stream(100_000);
    for associativity in [Associativity::NonSkewed, Associativity::Skewed] {
        let mut group = c.benchmark_group(format!("{associativity:?}"));
        for policy in POLICIES {
            let config = CacheConfig {
                blocks: 4,
                sets: 64,
                ways: 4,
                replacement_policy: policy,
                associativity,
                ..CacheConfig::default()
            };
            group.bench_with_input(BenchmarkId::new("Policy", format!("{policy:?}")), &config, |bench, config| {
                bench.iter(|| {
                    let mut cache = CacheSim::new(config.clone()).unwrap();
                    for (address, access) in &accesses {
                        cache.access(*address, *access);
                    }
                    cache.get_hits()
                });
            });
        }
        group.finish();
    }

    let config = CacheConfig { blocks: 4, sets: 64, ways: 4, ..CacheConfig::default() };
    c.bench_function("Undo", |bench| {
        bench.iter(|| {
            let mut cache = CacheSim::new(config.clone()).unwrap();
            cache.set_undo_depth(accesses.len());
            for (address, access) in &accesses {
                cache.access(*address, *access);
            }
            while cache.undo().is_some() {}
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = criterion_benchmark
);
criterion_main!(benches);
