use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use crate::error::TraceError;

/// The contents of a trace file, memory mapped where that is supported
pub enum TraceBytes {
    #[cfg(unix)]
    Mapped(memmap2::Mmap),
    Buffered(Vec<u8>),
}

impl Deref for TraceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(unix)]
            TraceBytes::Mapped(map) => map,
            TraceBytes::Buffered(bytes) => bytes,
        }
    }
}

/// Opens a trace for sequential parsing
pub fn read_trace(path: impl AsRef<Path>) -> Result<TraceBytes, TraceError> {
    let file = File::open(path)?;
    // Mapping an empty file fails on some systems
    if file.metadata()?.len() == 0 {
        return Ok(TraceBytes::Buffered(Vec::new()));
    }
    get_bytes(file)
}

fn get_bytes(file: File) -> Result<TraceBytes, TraceError> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::Read;
        let mut bytes = Vec::new();
        std::io::BufReader::new(file).read_to_end(&mut bytes)?;
        Ok(TraceBytes::Buffered(bytes))
    }
    // Memory map the file on unix, the parser only ever reads it front to back
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        // SAFETY: the map is read only, and traces aren't modified while a simulation runs
        let map = unsafe { Mmap::map(&file)? };
        map.advise(Advice::Sequential)?;
        Ok(TraceBytes::Mapped(map))
    }
}
