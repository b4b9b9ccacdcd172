use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

/// The undo depth used when the host doesn't supply one
pub const DEFAULT_UNDO_DEPTH: usize = 100;

/// Configuration for a trace-driven simulation: a set of independent caches fed from the same
/// trace, and how many steps can be undone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub caches: Vec<CacheConfig>,
    #[serde(default = "default_undo_depth")]
    pub undo_depth: usize,
}

fn default_undo_depth() -> usize {
    DEFAULT_UNDO_DEPTH
}

impl SimulationConfig {
    /// Checks every cache, and that there is at least one
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.caches.is_empty() {
            return Err(ConfigError::NoCaches);
        }
        self.caches.iter().try_for_each(CacheConfig::validate)
    }
}

/// A configuration for a single cache
///
/// `blocks`, `sets` and `ways` are counts and must be powers of two. Every other field has a
/// default, so the smallest valid JSON configuration is `{"blocks": 1, "sets": 8, "ways": 4}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub kind: CacheKind,
    /// Words per cache line
    pub blocks: u32,
    pub sets: u32,
    pub ways: u32,
    #[serde(default)]
    pub write_policy: WritePolicy,
    #[serde(default)]
    pub write_allocate: WriteAllocatePolicy,
    #[serde(default)]
    pub replacement_policy: ReplacementPolicyConfig,
    #[serde(default)]
    pub associativity: Associativity,
    /// Seed for the random replacement policy
    #[serde(default)]
    pub seed: u64,
}

fn default_name() -> String {
    "cache".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            kind: CacheKind::default(),
            blocks: 1,
            sets: 8,
            ways: 4,
            write_policy: WritePolicy::default(),
            write_allocate: WriteAllocatePolicy::default(),
            replacement_policy: ReplacementPolicyConfig::default(),
            associativity: Associativity::default(),
            seed: 0,
        }
    }
}

impl CacheConfig {
    /// Checks the geometry. Sizes must be non-zero powers of two, and a 32-bit address minus the
    /// 2-bit byte offset must still have room for the block and set indices
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("blocks", self.blocks), ("sets", self.sets), ("ways", self.ways)] {
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo { field, value });
            }
        }
        let index_bits = self.block_bits() + self.set_bits();
        if index_bits > 30 {
            return Err(ConfigError::TagWidthExhausted { index_bits });
        }
        Ok(())
    }

    pub fn block_bits(&self) -> u32 {
        self.blocks.trailing_zeros()
    }

    pub fn set_bits(&self) -> u32 {
        self.sets.trailing_zeros()
    }

    pub fn way_bits(&self) -> u32 {
        self.ways.trailing_zeros()
    }

    /// Tag width in bits for a non-skewed cache
    pub fn tag_bits(&self) -> u32 {
        32 - 2 - self.block_bits() - self.set_bits()
    }

    /// Skewed indexing only applies to data caches, instruction caches always index normally
    pub fn uses_skewed_indexing(&self) -> bool {
        self.associativity == Associativity::Skewed && self.kind == CacheKind::Data
    }
}

/// Which stream of the trace a cache is attached to
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    #[default]
    #[serde(alias = "d", alias = "dcache")]
    Data,
    #[serde(alias = "i", alias = "icache")]
    Instruction,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    #[serde(alias = "wt")]
    WriteThrough,
    #[default]
    #[serde(alias = "wb")]
    WriteBack,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAllocatePolicy {
    #[default]
    #[serde(alias = "write_allocate")]
    Allocate,
    #[serde(alias = "no_write_allocate")]
    NoAllocate,
}

/// The replacement policy. Defaults to LRU.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementPolicyConfig {
    Random,
    #[default]
    #[serde(alias = "lru")]
    LeastRecentlyUsed,
    #[serde(alias = "lip", alias = "lru_lip")]
    LruInsertion,
    #[serde(alias = "plru")]
    PseudoLeastRecentlyUsed,
    #[serde(alias = "dip")]
    DynamicInsertion,
    #[serde(alias = "none")]
    NoCache,
}

impl ReplacementPolicyConfig {
    /// Whether the policy keeps a recency rank in each way's counter
    pub fn uses_counters(&self) -> bool {
        matches!(
            self,
            Self::LeastRecentlyUsed | Self::LruInsertion | Self::DynamicInsertion
        )
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Associativity {
    #[default]
    #[serde(alias = "direct")]
    NonSkewed,
    Skewed,
}
