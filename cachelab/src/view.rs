use crate::cache::CacheSim;

/// Read access to the memory behind a cache, used to show what a line holds
///
/// The simulator never stores data itself, so whoever renders a line fetches the words from the
/// backing store through this. Any `Fn(u32) -> u32` is a reader
pub trait MemoryReader {
    /// Reads the 32-bit word at a word-aligned address
    fn read_word(&self, address: u32) -> u32;
}

impl<F> MemoryReader for F
where
    F: Fn(u32) -> u32,
{
    fn read_word(&self, address: u32) -> u32 {
        self(address)
    }
}

/// One block of a valid line, as a view would show it
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockView {
    pub block: u32,
    pub address: u32,
    pub value: u32,
    pub dirty: bool,
}

impl CacheSim {
    /// The blocks of a line with their addresses and current memory contents
    ///
    /// # Arguments
    ///
    /// * `set`: The set index
    /// * `way`: The way within the set
    /// * `reader`: Fetches the words from the backing store
    ///
    /// returns: Option<Vec<BlockView>>, `None` if the way is not valid
    pub fn line_blocks(&self, set: u32, way: u32, reader: &impl MemoryReader) -> Option<Vec<BlockView>> {
        let line = self.get_set(set)?.get(way).filter(|line| line.valid)?;
        let layout = self.get_layout();
        let blocks = (0..self.get_config().blocks)
            .map(|block| {
                let address = layout.block_address(line.tag, set, block);
                BlockView {
                    block,
                    address,
                    value: reader.read_word(address),
                    dirty: line.dirty_blocks.contains(&block),
                }
            })
            .collect();
        Some(blocks)
    }
}
