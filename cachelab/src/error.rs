use thiserror::Error;

/// Rejected cache configurations. A cache which fails to configure keeps its previous
/// configuration and contents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be a non-zero power of two, got {value}")]
    NotPowerOfTwo { field: &'static str, value: u32 },

    /// The block and set index bits leave no room for a tag inside a 32-bit word address
    #[error("block and set indices need {index_bits} bits, but a 32-bit word address only has 30")]
    TagWidthExhausted { index_bits: u32 },

    #[error("the simulation configuration does not contain any caches")]
    NoCaches,
}

/// Failures while reading or parsing a trace file
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("couldn't read the trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed trace record on line {line}: {content:?}")]
    Malformed { line: usize, content: String },

    #[error("trace line {line} is not valid UTF-8")]
    Encoding { line: usize },
}
