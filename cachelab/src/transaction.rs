use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    #[serde(alias = "R", alias = "r")]
    Read,
    #[serde(alias = "W", alias = "w")]
    Write,
}

/// Where an access landed in the cache
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CacheIndex {
    pub set: u32,
    pub way: u32,
    pub block: u32,
}

impl CacheIndex {
    /// Panics if the index lies outside the cache geometry. Reaching this means a replacement
    /// policy or the skewed indexer produced a bogus location
    pub fn assert_within(&self, sets: u32, ways: u32, blocks: u32) {
        assert!(self.set < sets, "cache set index {} is out of range (sets: {sets})", self.set);
        assert!(self.way < ways, "cache way index {} is out of range (ways: {ways})", self.way);
        assert!(
            self.block < blocks,
            "cache block index {} is out of range (blocks: {blocks})",
            self.block
        );
    }
}

/// Everything one access did to the cache. Once the access has completed this never changes, it
/// is handed to observers and kept as the unit of undo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTransaction {
    /// The word-aligned address
    pub address: u32,
    pub access_type: AccessType,
    pub index: CacheIndex,
    /// Whether the tag was actually found, regardless of how the hit was reported
    pub is_hit: bool,
    /// A dirty line was evicted, or the data went straight through to the backing store
    pub is_writeback: bool,
    /// The target way went from invalid to valid
    pub trans_to_valid: bool,
    /// The target way now holds a different line, either newly loaded or replacing an evicted one
    pub tag_changed: bool,
    /// A write miss under no-write-allocate, nothing entered the cache
    pub bypassed: bool,
}

impl CacheTransaction {
    pub fn new(address: u32, access_type: AccessType) -> Self {
        Self {
            address,
            access_type,
            index: CacheIndex::default(),
            is_hit: false,
            is_writeback: false,
            trans_to_valid: false,
            tag_changed: false,
            bypassed: false,
        }
    }
}

/// The result of an access, as seen by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    /// The hit signal for the host. Write-through writes always report a miss, even when the
    /// transaction itself found the tag
    pub hit: bool,
    /// `None` when caching is disabled and nothing happened
    pub transaction: Option<CacheTransaction>,
}

/// The result of an undo: the transaction that was rolled back, and the transaction now on top of
/// the history which a view would highlight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undone {
    pub reverted: CacheTransaction,
    pub current: Option<CacheTransaction>,
}
