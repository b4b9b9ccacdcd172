mod policies;
mod properties;

use crate::cache::{CacheSet, CacheSim};
use crate::config::{CacheConfig, ReplacementPolicyConfig};
use crate::replacement_policies::{DuelWindow, GenericPolicy};
use crate::transaction::{AccessOutcome, AccessType};

/// A write-back, write-allocate cache with one word per line
fn config(sets: u32, ways: u32, replacement_policy: ReplacementPolicyConfig) -> CacheConfig {
    CacheConfig {
        blocks: 1,
        sets,
        ways,
        replacement_policy,
        ..CacheConfig::default()
    }
}

fn cache(sets: u32, ways: u32, replacement_policy: ReplacementPolicyConfig) -> CacheSim {
    CacheSim::new(config(sets, ways, replacement_policy)).unwrap()
}

fn read(cache: &mut CacheSim, address: u32) -> AccessOutcome {
    cache.access(address, AccessType::Read)
}

fn write(cache: &mut CacheSim, address: u32) -> AccessOutcome {
    cache.access(address, AccessType::Write)
}

/// The way an access ended up in
fn way_of(outcome: &AccessOutcome) -> u32 {
    outcome.transaction.as_ref().unwrap().index.way
}

/// Every non-empty set, for comparing cache contents
fn snapshot(cache: &CacheSim) -> Vec<(u32, CacheSet)> {
    cache
        .get_sets()
        .iter()
        .filter(|(_, set)| !set.is_pristine())
        .map(|(index, set)| (*index, set.clone()))
        .collect()
}

/// The dueling state of a DIP cache
fn duel_state(cache: &CacheSim) -> Option<(DuelWindow, bool)> {
    match cache.get_policy() {
        GenericPolicy::DynamicInsertion(policy) => Some((*policy.window(), policy.selects_lru())),
        _ => None,
    }
}
