use crate::config::{Associativity, CacheConfig};

/// Every cached word is 4 bytes, so the low two address bits never take part in indexing
pub const BYTE_OFFSET_BITS: u32 = 2;

/// Generates a mask of the lowest `bits` bits
pub fn bitmask(bits: u32) -> u32 {
    1u32.checked_shl(bits).map_or(u32::MAX, |bit| bit - 1)
}

/// Splits 32-bit addresses into tag, set index, block index and byte offset for one cache geometry
///
/// The layout is, from the least significant bit: 2 byte-offset bits, `block_bits` block index
/// bits, `set_bits` set index bits, and whatever is left over as the tag. In skewed mode the set
/// is chosen by the indexer rather than taken from the address, so the whole word-aligned address
/// is used as the tag
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AddressLayout {
    block_bits: u32,
    set_bits: u32,
    skewed: bool,
    block_mask: u32,
    set_mask: u32,
    tag_mask: u32,
}

impl AddressLayout {
    /// The configuration must have been validated, otherwise the tag width may be negative
    pub fn new(config: &CacheConfig) -> Self {
        let block_bits = config.block_bits();
        let set_bits = config.set_bits();
        let mut offset = BYTE_OFFSET_BITS;
        let block_mask = bitmask(block_bits) << offset;
        offset += block_bits;
        let set_mask = bitmask(set_bits).checked_shl(offset).unwrap_or(0);
        offset += set_bits;
        let tag_mask = bitmask(32 - offset).checked_shl(offset).unwrap_or(0);
        Self {
            block_bits,
            set_bits,
            skewed: config.associativity == Associativity::Skewed,
            block_mask,
            set_mask,
            tag_mask,
        }
    }

    pub fn block_index(&self, address: u32) -> u32 {
        (address & self.block_mask) >> BYTE_OFFSET_BITS
    }

    pub fn set_index(&self, address: u32) -> u32 {
        (address & self.set_mask)
            .checked_shr(BYTE_OFFSET_BITS + self.block_bits)
            .unwrap_or(0)
    }

    pub fn tag(&self, address: u32) -> u32 {
        if self.skewed {
            return address;
        }
        (address & self.tag_mask)
            .checked_shr(self.tag_shift())
            .unwrap_or(0)
    }

    /// Rebuilds the address of a line from its tag, set and block. A skewed tag already is the
    /// address, and is returned as is
    pub fn build_address(&self, tag: u32, set: u32, block: u32) -> u32 {
        if self.skewed {
            return tag;
        }
        tag.checked_shl(self.tag_shift()).unwrap_or(0)
            | set.checked_shl(BYTE_OFFSET_BITS + self.block_bits).unwrap_or(0)
            | block << BYTE_OFFSET_BITS
    }

    /// The address of one particular block of a line, in either mode
    pub fn block_address(&self, tag: u32, set: u32, block: u32) -> u32 {
        if self.skewed {
            (tag & !(self.block_mask | bitmask(BYTE_OFFSET_BITS))) | block << BYTE_OFFSET_BITS
        } else {
            self.build_address(tag, set, block)
        }
    }

    pub fn block_bits(&self) -> u32 {
        self.block_bits
    }

    pub fn set_bits(&self) -> u32 {
        self.set_bits
    }

    pub fn is_skewed(&self) -> bool {
        self.skewed
    }

    pub fn block_mask(&self) -> u32 {
        self.block_mask
    }

    pub fn set_mask(&self) -> u32 {
        self.set_mask
    }

    pub fn tag_mask(&self) -> u32 {
        self.tag_mask
    }

    fn tag_shift(&self) -> u32 {
        BYTE_OFFSET_BITS + self.block_bits + self.set_bits
    }
}
