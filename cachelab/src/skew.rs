use crate::address::{bitmask, BYTE_OFFSET_BITS};
use crate::config::CacheConfig;

/// Widest set index the folding hash is used for. Wider indices fall back to a modular hash
pub const MAX_FOLDED_SET_BITS: u32 = 16;

/// Maps an address to one candidate set per way for skewed-associative caches
///
/// Way `k` of an address lives in set `h(address, k)`, where each `h` is a different hash. Two
/// lines colliding in one way are then unlikely to collide in the others, which gives more
/// effective associativity without a larger tag array. Way `k` of a candidate set may only hold
/// lines which hashed to that set for way `k`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SkewedIndexer {
    block_bits: u32,
    set_bits: u32,
    ways: u32,
}

impl SkewedIndexer {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            block_bits: config.block_bits(),
            set_bits: config.set_bits(),
            ways: config.ways,
        }
    }

    /// One step of the per-way fold: rotates right by one, with the new top bit being the XOR of
    /// the old top and bottom bits. For `set_bits >= 2` this permutes the `set_bits` wide values
    pub fn fold(&self, part: u32) -> u32 {
        let top = self.set_bits - 1;
        let head = part >> top;
        let tail = part & 1;
        (part >> 1) ^ ((head ^ tail) << top)
    }

    /// The raw hash of `address` for `way`
    ///
    /// The word address above the block index is split into two `set_bits` wide halves, the upper
    /// half is folded `way` times and the halves are XORed
    pub fn hash(&self, address: u32, way: u32) -> u32 {
        if self.set_bits == 0 {
            return 0;
        }
        let address = address >> (BYTE_OFFSET_BITS + self.block_bits);
        if self.set_bits > MAX_FOLDED_SET_BITS {
            return address.wrapping_add(way) % self.sets();
        }
        let mask = bitmask(self.set_bits);
        let low = address & mask;
        let mut high = (address >> self.set_bits) & mask;
        for _ in 0..way {
            high = self.fold(high);
        }
        low ^ high
    }

    /// The candidate set of every way, in way order
    ///
    /// The fold has fixed points (an all zero upper half, for instance), so a raw hash may repeat
    /// an earlier way's set. Repeats move on to the next set not yet taken, which keeps the
    /// candidates distinct as long as there are at least as many sets as ways
    pub fn candidates(&self, address: u32) -> Vec<u32> {
        let sets = self.sets() as usize;
        let mask = self.sets() - 1;
        let mut candidates: Vec<u32> = Vec::with_capacity(self.ways as usize);
        for way in 0..self.ways {
            let mut set = self.hash(address, way);
            while candidates.len() < sets && candidates.contains(&set) {
                set = (set + 1) & mask;
            }
            candidates.push(set);
        }
        candidates
    }

    fn sets(&self) -> u32 {
        1 << self.set_bits
    }
}
