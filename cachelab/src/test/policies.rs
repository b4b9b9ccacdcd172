use crate::cache::CacheSim;
use crate::config::{CacheConfig, ReplacementPolicyConfig};
use crate::replacement_policies::{GenericPolicy, DUEL_WINDOW};
use super::{cache, config, duel_state, read, snapshot, way_of};

/// Counters of ways 0..ways of set 0
fn ranks(cache: &CacheSim, ways: u32) -> Vec<u32> {
    let set = cache.get_set(0).unwrap();
    (0..ways).map(|way| set.counter(way)).collect()
}

fn mru_flags(cache: &CacheSim, ways: u32) -> Vec<bool> {
    let set = cache.get_set(0).unwrap();
    (0..ways).map(|way| set.is_mru(way)).collect()
}

/// Word addresses 0, 1, 2... all map to set 0 of a single set cache
const A: u32 = 0x0;
const B: u32 = 0x4;
const C: u32 = 0x8;
const D: u32 = 0xC;
const E: u32 = 0x10;
const F: u32 = 0x14;

#[test]
fn lru_evicts_the_least_recent_line() {
    let mut cache = cache(1, 4, ReplacementPolicyConfig::LeastRecentlyUsed);
    for address in [A, B, C, D] {
        read(&mut cache, address);
    }
    assert_eq!(ranks(&cache, 4), vec![3, 2, 1, 0]);
    assert!(read(&mut cache, A).hit);
    assert_eq!(ranks(&cache, 4), vec![0, 3, 2, 1]);

    let outcome = read(&mut cache, E);
    assert_eq!(way_of(&outcome), 1);
    assert_eq!(ranks(&cache, 4), vec![1, 0, 3, 2]);

    cache.undo();
    assert_eq!(ranks(&cache, 4), vec![0, 3, 2, 1]);
    assert!(cache.get_set(0).unwrap().holds(1, B >> 2));
}

#[test]
fn lip_inserts_at_the_least_recent_rank() {
    let mut cache = cache(1, 4, ReplacementPolicyConfig::LruInsertion);
    for address in [A, B, C, D] {
        read(&mut cache, address);
    }
    assert_eq!(ranks(&cache, 4), vec![0, 1, 2, 3]);
    assert!(read(&mut cache, A).hit);

    let e = read(&mut cache, E);
    assert_eq!(way_of(&e), 3);
    assert_eq!(cache.get_set(0).unwrap().counter(3), 3);

    // E was never reused, so it goes first
    let f = read(&mut cache, F);
    assert_eq!(way_of(&f), 3);
    assert!(!read(&mut cache, E).hit);
    let set = cache.get_set(0).unwrap();
    assert!(set.holds(0, A >> 2));
    assert!(set.holds(1, B >> 2));
    assert!(set.holds(2, C >> 2));
}

#[test]
fn lip_hit_promotes_like_lru() {
    let mut cache = cache(1, 4, ReplacementPolicyConfig::LruInsertion);
    for address in [A, B, C, D] {
        read(&mut cache, address);
    }
    read(&mut cache, C);
    assert_eq!(ranks(&cache, 4), vec![1, 2, 0, 3]);
    cache.undo();
    assert_eq!(ranks(&cache, 4), vec![0, 1, 2, 3]);
}

#[test]
fn plru_clears_flags_when_all_would_be_set() {
    let mut cache = cache(1, 4, ReplacementPolicyConfig::PseudoLeastRecentlyUsed);
    for address in [A, B, C] {
        read(&mut cache, address);
    }
    assert_eq!(mru_flags(&cache, 4), vec![true, true, true, false]);
    read(&mut cache, D);
    assert_eq!(mru_flags(&cache, 4), vec![false, false, false, true]);

    let e = read(&mut cache, E);
    assert_eq!(way_of(&e), 0);
    assert_eq!(mru_flags(&cache, 4), vec![true, false, false, true]);

    cache.undo();
    cache.undo();
    assert_eq!(mru_flags(&cache, 4), vec![true, true, true, false]);
}

#[test]
fn random_replacement_is_reproducible() {
    let victims = |seed: u64| {
        let mut cache = CacheSim::new(CacheConfig {
            seed,
            ..config(1, 8, ReplacementPolicyConfig::Random)
        })
        .unwrap();
        (0..64).map(|line| way_of(&read(&mut cache, line * 4))).collect::<Vec<_>>()
    };
    let first = victims(7);
    assert_eq!(first, victims(7));
    assert!(first.iter().all(|&way| way < 8));
}

#[test]
fn dip_leader_sets_are_pinned() {
    let cache = cache(4, 2, ReplacementPolicyConfig::DynamicInsertion);
    let GenericPolicy::DynamicInsertion(policy) = cache.get_policy() else {
        panic!("expected a DIP cache");
    };
    assert!(policy.inserts_as_lru(0));
    assert!(!policy.inserts_as_lru(1));
    assert!(policy.selects_lru());
    assert!(policy.inserts_as_lru(2));
}

/// Alternates between the two leader sets of a 2-way, 4-set cache, cycling three lines through
/// each. LRU insertion thrashes on that, LIP keeps one line and hits every third access
fn duel(cache: &mut CacheSim, updates: u32) {
    for update in 0..updates {
        let turn = update / 2;
        let line = turn % 3;
        let set = update % 2;
        read(cache, line * 16 + set * 4);
    }
}

#[test]
fn dip_switches_at_the_end_of_a_window() {
    let mut cache = cache(4, 2, ReplacementPolicyConfig::DynamicInsertion);
    duel(&mut cache, DUEL_WINDOW - 1);
    let (window, selects_lru) = duel_state(&cache).unwrap();
    assert!(selects_lru);
    assert_eq!(window.updates, DUEL_WINDOW - 1);
    assert_eq!(window.lru_hits, 0);
    assert!(window.lip_hits > 0);
    let before = snapshot(&cache);

    // The final update lands in the LIP leader set
    read(&mut cache, ((DUEL_WINDOW - 1) / 2 % 3) * 16 + 4);
    let (window, selects_lru) = duel_state(&cache).unwrap();
    assert!(!selects_lru);
    assert_eq!(window.updates, 0);

    cache.undo();
    let (window, selects_lru) = duel_state(&cache).unwrap();
    assert!(selects_lru);
    assert_eq!(window.updates, DUEL_WINDOW - 1);
    assert_eq!(snapshot(&cache), before);
}

#[test]
fn dip_followers_use_the_selected_insertion() {
    let mut cache = cache(4, 2, ReplacementPolicyConfig::DynamicInsertion);
    duel(&mut cache, DUEL_WINDOW);
    assert_eq!(duel_state(&cache).map(|(_, lru)| lru), Some(false));

    // Set 2 now inserts like LIP: the second line lands at the least recent rank
    read(&mut cache, 0x8);
    read(&mut cache, 0x18);
    let set = cache.get_set(2).unwrap();
    assert_eq!(set.counter(0), 0);
    assert_eq!(set.counter(1), 1);
}
