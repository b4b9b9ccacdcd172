use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, trace, warn};
use crate::address::AddressLayout;
use crate::config::{CacheConfig, WriteAllocatePolicy, WritePolicy};
use crate::error::ConfigError;
use crate::history::{AccessStats, CacheTrace, HistoryLog};
use crate::replacement_policies::{GenericPolicy, MetadataUndo, ReplacementPolicy};
use crate::skew::SkewedIndexer;
use crate::transaction::{AccessOutcome, AccessType, CacheTransaction, Undone};

/// One line of a cache set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheWay {
    pub tag: u32,
    pub valid: bool,
    pub dirty: bool,
    /// The blocks written since the line was loaded, write-back caches only
    pub dirty_blocks: BTreeSet<u32>,
    /// Recency rank for the LRU family of policies
    pub counter: u32,
    /// Most recently used flag for PLRU
    pub mru: bool,
}

impl Default for CacheWay {
    fn default() -> Self {
        Self {
            tag: u32::MAX,
            valid: false,
            dirty: false,
            dirty_blocks: BTreeSet::new(),
            // An empty way must always look like the least recently used one
            counter: u32::MAX,
            mru: false,
        }
    }
}

impl CacheWay {
    fn is_default(&self) -> bool {
        *self == CacheWay::default()
    }
}

/// The ways of one set, populated lazily
///
/// A way which was never touched is not stored, and behaves exactly like a default, invalid way.
/// Reading never inserts, ways are only created when they are written to
#[derive(Debug, Clone, Default)]
pub struct CacheSet {
    ways: BTreeMap<u32, CacheWay>,
}

/// Used for lookups in sets which were never touched
static EMPTY_SET: CacheSet = CacheSet::new();

fn set_or_empty(sets: &BTreeMap<u32, CacheSet>, index: u32) -> &CacheSet {
    sets.get(&index).unwrap_or(&EMPTY_SET)
}

impl CacheSet {
    pub const fn new() -> Self {
        Self { ways: BTreeMap::new() }
    }

    pub fn get(&self, way: u32) -> Option<&CacheWay> {
        self.ways.get(&way)
    }

    /// The stored ways, in way order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &CacheWay)> {
        self.ways.iter().map(|(index, way)| (*index, way))
    }

    pub fn is_valid(&self, way: u32) -> bool {
        self.get(way).map_or(false, |entry| entry.valid)
    }

    pub fn is_mru(&self, way: u32) -> bool {
        self.get(way).map_or(false, |entry| entry.mru)
    }

    pub fn counter(&self, way: u32) -> u32 {
        self.get(way).map_or(CacheWay::default().counter, |entry| entry.counter)
    }

    pub fn valid_count(&self) -> u32 {
        self.ways.values().filter(|entry| entry.valid).count() as u32
    }

    /// Whether the way is valid and holds `tag`
    pub fn holds(&self, way: u32, tag: u32) -> bool {
        self.get(way).map_or(false, |entry| entry.valid && entry.tag == tag)
    }

    /// Whether the set is indistinguishable from one that was never touched
    pub fn is_pristine(&self) -> bool {
        self.ways.values().all(CacheWay::is_default)
    }

    pub(crate) fn way_mut(&mut self, way: u32) -> &mut CacheWay {
        self.ways.entry(way).or_default()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut CacheWay)> {
        self.ways.iter_mut().map(|(index, way)| (*index, way))
    }
}

/// Stored default ways are the same as absent ones
impl PartialEq for CacheSet {
    fn eq(&self, other: &Self) -> bool {
        let stored = |set: &'_ CacheSet| {
            set.ways
                .iter()
                .filter(|(_, way)| !way.is_default())
                .map(|(index, way)| (*index, way.clone()))
                .collect::<Vec<_>>()
        };
        stored(self) == stored(other)
    }
}

impl Eq for CacheSet {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SizeComponentKind {
    Valid,
    Dirty,
    Counter,
    Tag,
    Data,
}

impl fmt::Display for SizeComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SizeComponentKind::Valid => "Valid bits",
            SizeComponentKind::Dirty => "Dirty bits",
            SizeComponentKind::Counter => "Counter bits",
            SizeComponentKind::Tag => "Tag bits",
            SizeComponentKind::Data => "Data bits",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SizeComponent {
    pub kind: SizeComponentKind,
    pub bits: u64,
}

/// The storage a cache configuration needs, by component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSize {
    pub bits: u64,
    pub components: Vec<SizeComponent>,
}

impl CacheSize {
    fn push(&mut self, kind: SizeComponentKind, bits: u64) {
        self.components.push(SizeComponent { kind, bits });
        self.bits += bits;
    }
}

/// A set-associative cache which can undo its most recent accesses
///
/// Every access goes through `access`, which resolves the line, applies the write and replacement
/// policies and records a trace of what changed. `undo` rolls the newest trace back, restoring
/// the ways, the replacement metadata and the statistics exactly
///
/// The cache is single threaded. Anything handed out (sets, transactions) is a view of the
/// current state and must not be held across later accesses
#[derive(Debug)]
pub struct CacheSim {
    config: CacheConfig,
    layout: AddressLayout,
    indexer: SkewedIndexer,
    policy: GenericPolicy,
    sets: BTreeMap<u32, CacheSet>,
    history: HistoryLog,
}

impl CacheSim {
    /// Creates an empty cache with the default undo depth
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = Self {
            layout: AddressLayout::new(&config),
            indexer: SkewedIndexer::new(&config),
            policy: GenericPolicy::new(&config),
            sets: BTreeMap::new(),
            history: HistoryLog::default(),
            config,
        };
        cache.log_configuration();
        Ok(cache)
    }

    /// Replaces the configuration, resetting all contents, history and statistics. An invalid
    /// configuration is rejected and leaves the cache as it was
    pub fn configure(&mut self, config: CacheConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.layout = AddressLayout::new(&config);
        self.indexer = SkewedIndexer::new(&config);
        self.policy = GenericPolicy::new(&config);
        self.config = config;
        self.reset();
        self.log_configuration();
        Ok(())
    }

    /// Clears the contents, history and statistics, keeping the configuration. This is also how
    /// the cache reacts to a processor reset
    pub fn reset(&mut self) {
        self.sets.clear();
        self.history.clear();
        self.policy = GenericPolicy::new(&self.config);
    }

    /// Accesses `address` at the step after the newest recorded one
    pub fn access(&mut self, address: u32, access_type: AccessType) -> AccessOutcome {
        let step = self.history.latest_step().map_or(0, |step| step + 1);
        self.access_at(step, address, access_type)
    }

    /// Accesses `address`, recording the access under the host's `step` counter
    ///
    /// Steps must strictly increase. A step at or below the newest one is moved just past it
    pub fn access_at(&mut self, step: u64, address: u32, access_type: AccessType) -> AccessOutcome {
        // Unaligned accesses are treated as accesses to their word
        let address = address & !0b11;
        if self.policy.is_no_cache() {
            return AccessOutcome { hit: false, transaction: None };
        }

        let step = match self.history.latest_step() {
            Some(latest) if step <= latest => {
                warn!(step, latest, "cache access steps must increase, recording after the newest step");
                latest + 1
            }
            _ => step,
        };

        let mut transaction = CacheTransaction::new(address, access_type);
        if self.config.uses_skewed_indexing() {
            self.resolve_skewed(&mut transaction);
        } else {
            self.resolve(&mut transaction);
        }

        let is_write = access_type == AccessType::Write;
        let write_through = self.config.write_policy == WritePolicy::WriteThrough;
        let allocates = !is_write || self.config.write_allocate == WriteAllocatePolicy::Allocate;
        let hit = transaction.is_hit && !(is_write && write_through);

        let old_way = if transaction.is_hit {
            self.way(transaction.index.set, transaction.index.way)
        } else if allocates {
            self.evict_and_update(&mut transaction)
        } else {
            CacheWay::default()
        };

        let mut undo = MetadataUndo::Nothing;
        if !transaction.is_hit && !allocates {
            // Written straight to the backing store without entering the cache
            transaction.bypassed = true;
            transaction.is_writeback = true;
        } else {
            let index = transaction.index;
            let set = self.sets.entry(index.set).or_default();
            if is_write && !write_through {
                let way = set.way_mut(index.way);
                way.dirty = true;
                way.dirty_blocks.insert(index.block);
            }
            undo = self.policy.update_metadata(set, index.set, index.way, transaction.is_hit);
        }
        if is_write && write_through {
            transaction.is_writeback = true;
        }

        transaction.index.assert_within(self.config.sets, self.config.ways, self.config.blocks);

        trace!(
            step,
            address = transaction.address,
            set = transaction.index.set,
            way = transaction.index.way,
            hit = transaction.is_hit,
            writeback = transaction.is_writeback,
            "cache access"
        );
        self.history.push(step, CacheTrace { transaction: transaction.clone(), old_way, undo });
        AccessOutcome { hit, transaction: Some(transaction) }
    }

    /// Reverses the most recent access which is still in the history. Returns `None`, changing
    /// nothing, when there is nothing left to undo
    pub fn undo(&mut self) -> Option<Undone> {
        let CacheTrace { transaction, old_way, undo } = self.history.pop()?;
        if !transaction.bypassed {
            let index = transaction.index;
            let set = self.sets.entry(index.set).or_default();
            let way = set.way_mut(index.way);
            if transaction.trans_to_valid {
                *way = CacheWay::default();
            } else if !transaction.is_hit {
                *way = old_way.clone();
            } else {
                way.dirty = old_way.dirty;
                way.dirty_blocks = old_way.dirty_blocks.clone();
            }
            self.policy.revert_metadata(set, &transaction, &old_way, undo);
        }
        debug!(address = transaction.address, set = transaction.index.set, way = transaction.index.way, "undid cache access");
        Some(Undone {
            reverted: transaction,
            current: self.history.latest_transaction().cloned(),
        })
    }

    /// The host reversed `step`. If the newest recorded access happened in that step it is undone
    pub fn reverse_step(&mut self, step: u64) -> Option<Undone> {
        if self.history.latest_step() != Some(step) {
            return None;
        }
        self.undo()
    }

    /// Finds the line in its set, or the way a miss would replace
    fn resolve(&mut self, transaction: &mut CacheTransaction) {
        let address = transaction.address;
        let set_index = self.layout.set_index(address);
        let tag = self.layout.tag(address);
        transaction.index.set = set_index;
        transaction.index.block = self.layout.block_index(address);

        let set = set_or_empty(&self.sets, set_index);
        if let Some((way, _)) = set.iter().find(|(_, way)| way.valid && way.tag == tag) {
            transaction.index.way = way;
            transaction.is_hit = true;
            return;
        }
        transaction.index.way = self.policy.locate_eviction_way(set, set_index);
    }

    /// Skewed lookup. Way `k` of the line can only be in the `k`th candidate set
    ///
    /// On a miss the first candidate with an invalid slot is used, otherwise the slot with the
    /// highest recency counter over all candidates (the later way on ties)
    fn resolve_skewed(&self, transaction: &mut CacheTransaction) {
        let address = transaction.address;
        let tag = self.layout.tag(address);
        transaction.index.block = self.layout.block_index(address);
        let candidates = self.indexer.candidates(address);
        let slots = || (0u32..).zip(candidates.iter().copied());

        if let Some((way, set)) = slots().find(|&(way, set)| set_or_empty(&self.sets, set).holds(way, tag)) {
            transaction.index.set = set;
            transaction.index.way = way;
            transaction.is_hit = true;
            return;
        }

        let (way, set) = slots()
            .find(|&(way, set)| !set_or_empty(&self.sets, set).is_valid(way))
            .or_else(|| slots().max_by_key(|&(way, set)| set_or_empty(&self.sets, set).counter(way)))
            .unwrap_or_else(|| panic!("a skewed cache has no candidate ways"));
        transaction.index.set = set;
        transaction.index.way = way;
    }

    /// Replaces the target way with the accessed line, returning what was there before
    fn evict_and_update(&mut self, transaction: &mut CacheTransaction) -> CacheWay {
        let tag = self.layout.tag(transaction.address);
        let index = transaction.index;
        let way = self.sets.entry(index.set).or_default().way_mut(index.way);
        let evicted = std::mem::take(way);
        if !evicted.valid {
            transaction.trans_to_valid = true;
        } else if evicted.dirty {
            transaction.is_writeback = true;
        }
        way.valid = true;
        way.tag = tag;
        transaction.tag_changed = true;
        evicted
    }

    /// A copy of a way, default if it was never touched
    fn way(&self, set: u32, way: u32) -> CacheWay {
        self.sets
            .get(&set)
            .and_then(|entries| entries.get(way))
            .cloned()
            .unwrap_or_default()
    }

    fn log_configuration(&self) {
        debug!(
            name = %self.config.name,
            blocks = self.config.blocks,
            sets = self.config.sets,
            ways = self.config.ways,
            policy = ?self.config.replacement_policy,
            write = ?self.config.write_policy,
            allocate = ?self.config.write_allocate,
            skewed = self.config.uses_skewed_indexing(),
            "configured cache"
        );
    }

    /// Sets how many accesses can be undone. Older history is dropped straight away
    pub fn set_undo_depth(&mut self, depth: usize) {
        self.history.set_depth(depth);
    }

    /// Keeps only the newest `depth` entries of the access trace, `None` keeps all of them
    pub fn set_statistics_depth(&mut self, depth: Option<usize>) {
        self.history.set_statistics_depth(depth);
    }

    pub fn get_set(&self, index: u32) -> Option<&CacheSet> {
        self.sets.get(&index)
    }

    pub fn get_sets(&self) -> &BTreeMap<u32, CacheSet> {
        &self.sets
    }

    pub fn get_config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get_layout(&self) -> &AddressLayout {
        &self.layout
    }

    pub fn get_indexer(&self) -> &SkewedIndexer {
        &self.indexer
    }

    pub fn get_policy(&self) -> &GenericPolicy {
        &self.policy
    }

    pub fn get_history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn get_access_trace(&self) -> &BTreeMap<u64, AccessStats> {
        self.history.access_trace()
    }

    pub fn get_stats(&self) -> AccessStats {
        self.history.latest_stats()
    }

    pub fn get_hit_rate(&self) -> f64 {
        self.get_stats().hit_rate()
    }

    pub fn get_hits(&self) -> u64 {
        self.get_stats().hits
    }

    pub fn get_misses(&self) -> u64 {
        self.get_stats().misses
    }

    pub fn get_writebacks(&self) -> u64 {
        self.get_stats().writebacks
    }

    pub fn get_reads(&self) -> u64 {
        self.get_stats().reads
    }

    pub fn get_writes(&self) -> u64 {
        self.get_stats().writes
    }

    /// The bits of storage this configuration needs
    ///
    /// Valid bits, dirty bits for write-back caches, rank counters, tag bits (skewed caches store
    /// the whole address) and the data itself
    ///
    /// Counter bits are counted for LIP and DIP as well as LRU, since all three keep a
    /// `log2(ways)` wide rank in every way. PLRU flags and random replacement add nothing
    pub fn get_cache_size(&self) -> CacheSize {
        let config = &self.config;
        let entries = config.sets as u64 * config.ways as u64;
        let mut size = CacheSize::default();

        size.push(SizeComponentKind::Valid, entries);
        if config.write_policy == WritePolicy::WriteBack {
            size.push(SizeComponentKind::Dirty, entries);
        }
        if config.replacement_policy.uses_counters() {
            size.push(SizeComponentKind::Counter, config.way_bits() as u64 * entries);
        }
        let tag_bits = if self.layout.is_skewed() { 32 } else { config.tag_bits() as u64 };
        size.push(SizeComponentKind::Tag, tag_bits * entries);
        size.push(SizeComponentKind::Data, 32 * entries * config.blocks as u64);
        size
    }
}
