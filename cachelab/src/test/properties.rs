use proptest::prelude::*;
use crate::cache::CacheSim;
use crate::config::{
    Associativity, CacheConfig, ReplacementPolicyConfig, WriteAllocatePolicy, WritePolicy,
};
use crate::skew::SkewedIndexer;
use crate::transaction::AccessType;
use super::{duel_state, snapshot};

fn policy() -> impl Strategy<Value = ReplacementPolicyConfig> {
    prop_oneof![
        Just(ReplacementPolicyConfig::Random),
        Just(ReplacementPolicyConfig::LeastRecentlyUsed),
        Just(ReplacementPolicyConfig::LruInsertion),
        Just(ReplacementPolicyConfig::PseudoLeastRecentlyUsed),
        Just(ReplacementPolicyConfig::DynamicInsertion),
        Just(ReplacementPolicyConfig::NoCache),
    ]
}

fn cache_config() -> impl Strategy<Value = CacheConfig> {
    (
        0u32..3,
        0u32..4,
        0u32..3,
        policy(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<u64>(),
    )
        .prop_map(|(blocks, sets, ways, replacement_policy, write_through, no_allocate, skewed, seed)| {
            CacheConfig {
                blocks: 1 << blocks,
                sets: 1 << sets,
                ways: 1 << ways,
                replacement_policy,
                write_policy: if write_through { WritePolicy::WriteThrough } else { WritePolicy::WriteBack },
                write_allocate: if no_allocate { WriteAllocatePolicy::NoAllocate } else { WriteAllocatePolicy::Allocate },
                associativity: if skewed { Associativity::Skewed } else { Associativity::NonSkewed },
                seed,
                ..CacheConfig::default()
            }
        })
}

/// Accesses within a small address range, so lines get reused and evicted
fn accesses(max: usize) -> impl Strategy<Value = Vec<(u32, AccessType)>> {
    prop::collection::vec(
        (0u32..0x200, prop_oneof![Just(AccessType::Read), Just(AccessType::Write)]),
        0..max,
    )
}

proptest! {
    #[test]
    fn undo_restores_the_exact_state(
        config in cache_config(),
        prefix in accesses(64),
        suffix in accesses(64),
    ) {
        let mut cache = CacheSim::new(config).unwrap();
        cache.set_undo_depth(1000);
        for (address, access) in &prefix {
            cache.access(*address, *access);
        }
        let contents = snapshot(&cache);
        let stats = cache.get_stats();
        let trace = cache.get_access_trace().clone();
        let duel = duel_state(&cache);

        for (address, access) in &suffix {
            cache.access(*address, *access);
        }
        let recorded = if cache.get_policy().is_no_cache() { 0 } else { suffix.len() };
        for _ in 0..recorded {
            prop_assert!(cache.undo().is_some());
        }

        prop_assert_eq!(snapshot(&cache), contents);
        prop_assert_eq!(cache.get_stats(), stats);
        prop_assert_eq!(cache.get_access_trace(), &trace);
        prop_assert_eq!(duel_state(&cache), duel);
    }

    #[test]
    fn lru_ranks_stay_dense(
        sets in 0u32..3,
        ways in 0u32..4,
        stream in accesses(200),
    ) {
        let mut cache = CacheSim::new(CacheConfig {
            blocks: 1,
            sets: 1 << sets,
            ways: 1 << ways,
            ..CacheConfig::default()
        })
        .unwrap();
        for (address, access) in stream {
            cache.access(address, access);
            for set in cache.get_sets().values() {
                let mut ranks: Vec<u32> = set.iter().filter(|(_, way)| way.valid).map(|(_, way)| way.counter).collect();
                ranks.sort();
                let expected: Vec<u32> = (0..set.valid_count()).collect();
                prop_assert_eq!(ranks, expected);
            }
        }
    }

    #[test]
    fn plru_never_flags_every_way(
        ways in 1u32..4,
        stream in accesses(200),
    ) {
        let ways = 1 << ways;
        let mut cache = CacheSim::new(CacheConfig {
            blocks: 1,
            sets: 2,
            ways,
            replacement_policy: ReplacementPolicyConfig::PseudoLeastRecentlyUsed,
            ..CacheConfig::default()
        })
        .unwrap();
        for (address, access) in stream {
            cache.access(address, access);
            for set in cache.get_sets().values() {
                prop_assert!(!(0..ways).all(|way| set.is_mru(way)));
            }
        }
    }

    #[test]
    fn skewed_candidates_are_distinct(
        set_bits in 0u32..8,
        way_bits in 0u32..4,
        address in any::<u32>(),
    ) {
        prop_assume!(way_bits <= set_bits);
        let indexer = SkewedIndexer::new(&CacheConfig {
            sets: 1 << set_bits,
            ways: 1 << way_bits,
            associativity: Associativity::Skewed,
            ..CacheConfig::default()
        });
        let mut candidates = indexer.candidates(address);
        prop_assert!(candidates.iter().all(|&set| set < 1 << set_bits));
        candidates.sort();
        candidates.dedup();
        prop_assert_eq!(candidates.len(), 1usize << way_bits);
    }
}
