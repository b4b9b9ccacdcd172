use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use crate::cache::{CacheSet, CacheWay};
use crate::config::{CacheConfig, ReplacementPolicyConfig};
use crate::transaction::CacheTransaction;

/// Number of metadata updates after which DIP compares its two leader sets
pub const DUEL_WINDOW: u32 = 100_000;

/// The DIP leader set which always inserts at the most recently used position
pub const LRU_LEADER_SET: u32 = 0;

/// The DIP leader set which always inserts at the least recently used position
pub const LIP_LEADER_SET: u32 = 1;

/// State a policy changed during an update which can't be recovered from the target way's
/// snapshot alone. It is stored alongside the snapshot and handed back on revert
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum MetadataUndo {
    #[default]
    Nothing,
    /// PLRU found every flag set and cleared all but the touched one
    FlagsCleared,
    /// DIP closed a dueling window. Holds the window as it was just before it was reset, and the
    /// scheme that was selected before the comparison
    WindowClosed { window: DuelWindow, selected_lru: bool },
}

/// A generic trait for implementing replacement policies
///
/// Policies keep their per-line state in the ways themselves (`counter`, `mru`), so every
/// operation is handed the set it works on. Absent ways of a set are invalid
pub trait ReplacementPolicy {
    /// Chooses the way of `set` to replace on a miss. Must always return a way index below the
    /// configured associativity
    ///
    /// # Arguments
    ///
    /// * `set`: The set the missing line maps to
    /// * `set_index`: The index of that set
    ///
    /// returns: u32
    fn locate_eviction_way(&mut self, set: &CacheSet, set_index: u32) -> u32;

    /// Updates the replacement fields after an access. Called once the target way already holds
    /// the accessed line, for hits and misses alike
    ///
    /// Not applicable for some policies, a default which does nothing is provided
    fn update_metadata(
        &mut self,
        _set: &mut CacheSet,
        _set_index: u32,
        _way: u32,
        _is_hit: bool,
    ) -> MetadataUndo {
        MetadataUndo::Nothing
    }

    /// Reverts the replacement fields touched by the update for `transaction`
    ///
    /// The way contents have already been restored when this is called: an invalid way for an
    /// invalid to valid transition, the evicted line for any other miss, and unchanged (apart
    /// from dirty bits) for a hit
    ///
    /// # Arguments
    ///
    /// * `set`: The set the transaction targeted
    /// * `transaction`: The transaction being undone
    /// * `old_way`: The target way as it was before the access
    /// * `undo`: Whatever the update returned
    fn revert_metadata(
        &mut self,
        _set: &mut CacheSet,
        _transaction: &CacheTransaction,
        _old_way: &CacheWay,
        _undo: MetadataUndo,
    ) {
    }
}

fn first_invalid_way(set: &CacheSet, ways: u32) -> Option<u32> {
    (0..ways).find(|&way| !set.is_valid(way))
}

/// Victim selection shared by the rank based policies: an invalid way if there is one, otherwise
/// the way holding the least recent rank
fn ranked_victim(set: &CacheSet, ways: u32) -> u32 {
    if ways == 1 {
        return 0;
    }
    first_invalid_way(set, ways)
        .or_else(|| (0..ways).find(|&way| set.counter(way) == ways - 1))
        .unwrap_or_else(|| panic!("no way holds the least recent rank {}", ways - 1))
}

/// Moves `way` to rank 0, ageing every valid way that was more recent than it
fn promote(set: &mut CacheSet, way: u32) {
    let previous = set.counter(way);
    for (index, entry) in set.iter_mut() {
        if index != way && entry.valid && entry.counter < previous {
            entry.counter += 1;
        }
    }
    set.way_mut(way).counter = 0;
}

/// Inverse of `promote`. A miss always promotes from the reset counter, a hit from the rank the
/// way had before the access
fn demote(set: &mut CacheSet, way: u32, old_way: &CacheWay, is_hit: bool) {
    let previous = if is_hit { old_way.counter } else { CacheWay::default().counter };
    for (index, entry) in set.iter_mut() {
        if index != way && entry.valid && entry.counter > 0 && entry.counter <= previous {
            entry.counter -= 1;
        }
    }
    set.way_mut(way).counter = old_way.counter;
}

/// Places a freshly loaded line just behind the least recent valid way. With dense ranks this is
/// `valid ways - 1`, and the other ranks are left alone
fn insert_least_recent(set: &mut CacheSet, way: u32) {
    let rank = set
        .iter()
        .filter(|(index, entry)| *index != way && entry.valid)
        .map(|(_, entry)| entry.counter.saturating_add(1))
        .max()
        .unwrap_or(0);
    set.way_mut(way).counter = rank;
}

#[derive(Debug, Default)]
/// NoPolicy is used when caching is disabled. Accesses never reach it, it only exists so every
/// configuration has a policy object
pub struct NoPolicy;

impl ReplacementPolicy for NoPolicy {
    fn locate_eviction_way(&mut self, _set: &CacheSet, _set_index: u32) -> u32 {
        0
    }
}

/// Random replacement. Any way may be chosen, valid or not, and no metadata is kept
#[derive(Debug)]
pub struct RandomReplacement {
    ways: u32,
    rng: StdRng,
}

impl RandomReplacement {
    pub fn new(ways: u32, seed: u64) -> Self {
        Self {
            ways,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ReplacementPolicy for RandomReplacement {
    fn locate_eviction_way(&mut self, _set: &CacheSet, _set_index: u32) -> u32 {
        self.rng.random_range(0..self.ways)
    }
}

/// Least Recently Used replacement policy
///
/// Each valid way's counter is its rank in a dense recency order, 0 being the most recent and
/// `ways - 1` the least. Invalid ways keep the maximum counter value so they always look oldest
#[derive(Debug)]
pub struct LeastRecentlyUsed {
    ways: u32,
}

impl LeastRecentlyUsed {
    pub fn new(ways: u32) -> Self {
        Self { ways }
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn locate_eviction_way(&mut self, set: &CacheSet, _set_index: u32) -> u32 {
        ranked_victim(set, self.ways)
    }

    fn update_metadata(&mut self, set: &mut CacheSet, _set_index: u32, way: u32, _is_hit: bool) -> MetadataUndo {
        promote(set, way);
        MetadataUndo::Nothing
    }

    fn revert_metadata(
        &mut self,
        set: &mut CacheSet,
        transaction: &CacheTransaction,
        old_way: &CacheWay,
        _undo: MetadataUndo,
    ) {
        demote(set, transaction.index.way, old_way, transaction.is_hit);
    }
}

/// LRU with the LRU Insertion Policy (LIP)
///
/// Hits promote exactly as LRU does, but newly loaded lines are inserted at the least recent rank.
/// A line which is never reused is then the next one to go, so a streaming pass can't flush the
/// lines which are actually being reused
#[derive(Debug)]
pub struct LruInsertion {
    ways: u32,
}

impl LruInsertion {
    pub fn new(ways: u32) -> Self {
        Self { ways }
    }
}

impl ReplacementPolicy for LruInsertion {
    fn locate_eviction_way(&mut self, set: &CacheSet, _set_index: u32) -> u32 {
        ranked_victim(set, self.ways)
    }

    fn update_metadata(&mut self, set: &mut CacheSet, _set_index: u32, way: u32, is_hit: bool) -> MetadataUndo {
        if is_hit {
            promote(set, way);
        } else {
            insert_least_recent(set, way);
        }
        MetadataUndo::Nothing
    }

    fn revert_metadata(
        &mut self,
        set: &mut CacheSet,
        transaction: &CacheTransaction,
        old_way: &CacheWay,
        _undo: MetadataUndo,
    ) {
        let way = transaction.index.way;
        if transaction.is_hit {
            demote(set, way, old_way, true);
        } else {
            // An insertion leaves every other rank alone
            set.way_mut(way).counter = old_way.counter;
        }
    }
}

/// Bit based pseudo-LRU
///
/// Every way has an MRU flag which is set when the way is touched. When that would leave every
/// flag set, all flags but the touched one are cleared. The victim is the first way without the
/// flag
#[derive(Debug)]
pub struct PseudoLeastRecentlyUsed {
    ways: u32,
}

impl PseudoLeastRecentlyUsed {
    pub fn new(ways: u32) -> Self {
        Self { ways }
    }
}

impl ReplacementPolicy for PseudoLeastRecentlyUsed {
    fn locate_eviction_way(&mut self, set: &CacheSet, _set_index: u32) -> u32 {
        if self.ways == 1 {
            return 0;
        }
        first_invalid_way(set, self.ways)
            .or_else(|| (0..self.ways).find(|&way| !set.is_mru(way)))
            .unwrap_or_else(|| panic!("every way of the set is flagged as most recently used"))
    }

    fn update_metadata(&mut self, set: &mut CacheSet, _set_index: u32, way: u32, _is_hit: bool) -> MetadataUndo {
        set.way_mut(way).mru = true;
        if !(0..self.ways).all(|index| set.is_mru(index)) {
            return MetadataUndo::Nothing;
        }
        for (index, entry) in set.iter_mut() {
            if index != way {
                entry.mru = false;
            }
        }
        MetadataUndo::FlagsCleared
    }

    fn revert_metadata(
        &mut self,
        set: &mut CacheSet,
        transaction: &CacheTransaction,
        old_way: &CacheWay,
        undo: MetadataUndo,
    ) {
        let way = transaction.index.way;
        if undo == MetadataUndo::FlagsCleared {
            // The flags were only cleared because every other way had its flag set
            for index in (0..self.ways).filter(|&index| index != way) {
                set.way_mut(index).mru = true;
            }
        }
        set.way_mut(way).mru = old_way.mru;
    }
}

/// Hit and access tallies of the two DIP leader sets over the current window
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DuelWindow {
    /// Metadata updates seen in this window, over all sets
    pub updates: u32,
    pub lru_hits: u32,
    pub lru_accesses: u32,
    pub lip_hits: u32,
    pub lip_accesses: u32,
}

impl DuelWindow {
    pub fn lru_hit_rate(&self) -> f64 {
        hit_rate(self.lru_hits, self.lru_accesses)
    }

    pub fn lip_hit_rate(&self) -> f64 {
        hit_rate(self.lip_hits, self.lip_accesses)
    }

    fn record(&mut self, set_index: u32, is_hit: bool) {
        self.updates += 1;
        let hit = is_hit as u32;
        match set_index {
            LRU_LEADER_SET => {
                self.lru_accesses += 1;
                self.lru_hits += hit;
            }
            LIP_LEADER_SET => {
                self.lip_accesses += 1;
                self.lip_hits += hit;
            }
            _ => {}
        }
    }

    fn forget(&mut self, set_index: u32, is_hit: bool) {
        self.updates -= 1;
        let hit = is_hit as u32;
        match set_index {
            LRU_LEADER_SET => {
                self.lru_accesses -= 1;
                self.lru_hits -= hit;
            }
            LIP_LEADER_SET => {
                self.lip_accesses -= 1;
                self.lip_hits -= hit;
            }
            _ => {}
        }
    }
}

fn hit_rate(hits: u32, accesses: u32) -> f64 {
    if accesses == 0 {
        0.0
    } else {
        hits as f64 / accesses as f64
    }
}

/// Dynamic Insertion Policy: set dueling between LRU and LIP insertion
///
/// Set 0 always inserts like LRU and set 1 always like LIP. Their hit rates are tallied, and every
/// `DUEL_WINDOW` updates the scheme with the higher hit rate is selected for every other set.
/// Ties go to LIP. Hits always promote, as both schemes agree on them
#[derive(Debug)]
pub struct DynamicInsertion {
    ways: u32,
    window: DuelWindow,
    selects_lru: bool,
}

impl DynamicInsertion {
    pub fn new(ways: u32) -> Self {
        Self {
            ways,
            window: DuelWindow::default(),
            selects_lru: true,
        }
    }

    /// The scheme currently used by the follower sets
    pub fn selects_lru(&self) -> bool {
        self.selects_lru
    }

    pub fn window(&self) -> &DuelWindow {
        &self.window
    }

    /// Whether a miss in the given set inserts at the most recent rank
    pub fn inserts_as_lru(&self, set_index: u32) -> bool {
        match set_index {
            LRU_LEADER_SET => true,
            LIP_LEADER_SET => false,
            _ => self.selects_lru,
        }
    }
}

impl ReplacementPolicy for DynamicInsertion {
    fn locate_eviction_way(&mut self, set: &CacheSet, _set_index: u32) -> u32 {
        ranked_victim(set, self.ways)
    }

    fn update_metadata(&mut self, set: &mut CacheSet, set_index: u32, way: u32, is_hit: bool) -> MetadataUndo {
        self.window.record(set_index, is_hit);
        let mut undo = MetadataUndo::Nothing;
        if self.window.updates == DUEL_WINDOW {
            undo = MetadataUndo::WindowClosed {
                window: self.window,
                selected_lru: self.selects_lru,
            };
            let lru_rate = self.window.lru_hit_rate();
            let lip_rate = self.window.lip_hit_rate();
            self.selects_lru = lru_rate > lip_rate;
            debug!(lru_rate, lip_rate, selects_lru = self.selects_lru, "dueling window closed");
            self.window = DuelWindow::default();
        }

        if is_hit || self.inserts_as_lru(set_index) {
            promote(set, way);
        } else {
            insert_least_recent(set, way);
        }
        undo
    }

    fn revert_metadata(
        &mut self,
        set: &mut CacheSet,
        transaction: &CacheTransaction,
        old_way: &CacheWay,
        undo: MetadataUndo,
    ) {
        let set_index = transaction.index.set;
        let way = transaction.index.way;
        // The update chose its insertion after closing any window, so the current selection is
        // the one it used
        if transaction.is_hit || self.inserts_as_lru(set_index) {
            demote(set, way, old_way, transaction.is_hit);
        } else {
            set.way_mut(way).counter = old_way.counter;
        }

        if let MetadataUndo::WindowClosed { window, selected_lru } = undo {
            self.window = window;
            self.selects_lru = selected_lru;
        }
        self.window.forget(set_index, transaction.is_hit);
    }
}

/// Enum over every provided replacement policy
///
/// The set of policies is closed, so rather than boxing a trait object each call branches on the
/// variant and the compiler can see the concrete type, inline, etc
#[derive(Debug)]
pub enum GenericPolicy {
    Random(RandomReplacement),
    LeastRecentlyUsed(LeastRecentlyUsed),
    LruInsertion(LruInsertion),
    PseudoLeastRecentlyUsed(PseudoLeastRecentlyUsed),
    DynamicInsertion(DynamicInsertion),
    NoCache(NoPolicy),
}

impl GenericPolicy {
    /// Creates the policy selected by a cache configuration
    pub fn new(config: &CacheConfig) -> Self {
        match config.replacement_policy {
            ReplacementPolicyConfig::Random => RandomReplacement::new(config.ways, config.seed).into(),
            ReplacementPolicyConfig::LeastRecentlyUsed => LeastRecentlyUsed::new(config.ways).into(),
            ReplacementPolicyConfig::LruInsertion => LruInsertion::new(config.ways).into(),
            ReplacementPolicyConfig::PseudoLeastRecentlyUsed => PseudoLeastRecentlyUsed::new(config.ways).into(),
            ReplacementPolicyConfig::DynamicInsertion => DynamicInsertion::new(config.ways).into(),
            ReplacementPolicyConfig::NoCache => NoPolicy.into(),
        }
    }

    pub fn is_no_cache(&self) -> bool {
        matches!(self, GenericPolicy::NoCache(_))
    }
}

impl From<RandomReplacement> for GenericPolicy {
    fn from(value: RandomReplacement) -> Self {
        Self::Random(value)
    }
}

impl From<LeastRecentlyUsed> for GenericPolicy {
    fn from(value: LeastRecentlyUsed) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<LruInsertion> for GenericPolicy {
    fn from(value: LruInsertion) -> Self {
        Self::LruInsertion(value)
    }
}

impl From<PseudoLeastRecentlyUsed> for GenericPolicy {
    fn from(value: PseudoLeastRecentlyUsed) -> Self {
        Self::PseudoLeastRecentlyUsed(value)
    }
}

impl From<DynamicInsertion> for GenericPolicy {
    fn from(value: DynamicInsertion) -> Self {
        Self::DynamicInsertion(value)
    }
}

impl From<NoPolicy> for GenericPolicy {
    fn from(value: NoPolicy) -> Self {
        Self::NoCache(value)
    }
}

impl ReplacementPolicy for GenericPolicy {
    fn locate_eviction_way(&mut self, set: &CacheSet, set_index: u32) -> u32 {
        match self {
            GenericPolicy::Random(p) => p.locate_eviction_way(set, set_index),
            GenericPolicy::LeastRecentlyUsed(p) => p.locate_eviction_way(set, set_index),
            GenericPolicy::LruInsertion(p) => p.locate_eviction_way(set, set_index),
            GenericPolicy::PseudoLeastRecentlyUsed(p) => p.locate_eviction_way(set, set_index),
            GenericPolicy::DynamicInsertion(p) => p.locate_eviction_way(set, set_index),
            GenericPolicy::NoCache(p) => p.locate_eviction_way(set, set_index),
        }
    }

    fn update_metadata(&mut self, set: &mut CacheSet, set_index: u32, way: u32, is_hit: bool) -> MetadataUndo {
        match self {
            GenericPolicy::Random(p) => p.update_metadata(set, set_index, way, is_hit),
            GenericPolicy::LeastRecentlyUsed(p) => p.update_metadata(set, set_index, way, is_hit),
            GenericPolicy::LruInsertion(p) => p.update_metadata(set, set_index, way, is_hit),
            GenericPolicy::PseudoLeastRecentlyUsed(p) => p.update_metadata(set, set_index, way, is_hit),
            GenericPolicy::DynamicInsertion(p) => p.update_metadata(set, set_index, way, is_hit),
            GenericPolicy::NoCache(p) => p.update_metadata(set, set_index, way, is_hit),
        }
    }

    fn revert_metadata(
        &mut self,
        set: &mut CacheSet,
        transaction: &CacheTransaction,
        old_way: &CacheWay,
        undo: MetadataUndo,
    ) {
        match self {
            GenericPolicy::Random(p) => p.revert_metadata(set, transaction, old_way, undo),
            GenericPolicy::LeastRecentlyUsed(p) => p.revert_metadata(set, transaction, old_way, undo),
            GenericPolicy::LruInsertion(p) => p.revert_metadata(set, transaction, old_way, undo),
            GenericPolicy::PseudoLeastRecentlyUsed(p) => p.revert_metadata(set, transaction, old_way, undo),
            GenericPolicy::DynamicInsertion(p) => p.revert_metadata(set, transaction, old_way, undo),
            GenericPolicy::NoCache(p) => p.revert_metadata(set, transaction, old_way, undo),
        }
    }
}
