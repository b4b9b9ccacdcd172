use lazy_static::lazy_static;
use regex::Regex;
use crate::error::TraceError;
use crate::transaction::AccessType;

lazy_static! {
    /// `PC ADDRESS MODE [SIZE]`, with a hexadecimal PC and address and a decimal size
    static ref RECORD: Regex = Regex::new(
        r"^\s*(?:0[xX])?(?P<pc>[0-9a-fA-F]{1,16})\s+(?:0[xX])?(?P<address>[0-9a-fA-F]{1,16})\s+(?P<mode>[RWrw])(?:\s+(?P<size>[0-9]{1,5}))?\s*$"
    )
    .unwrap();
}

/// One memory access of a program trace
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// The instruction which made the access, fetched by instruction caches
    pub pc: u32,
    pub address: u32,
    pub access: AccessType,
    /// Access width in bytes, if the trace gives one
    pub size: Option<u16>,
}

impl TraceRecord {
    /// Parses one line. Blank lines and `#` comments give `Ok(None)`
    ///
    /// # Arguments
    ///
    /// * `line`: The line, without its terminator
    /// * `number`: The 1-based line number, for error reporting
    ///
    /// returns: Result<Option<TraceRecord>, TraceError>
    pub fn parse(line: &str, number: usize) -> Result<Option<Self>, TraceError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let malformed = || TraceError::Malformed { line: number, content: trimmed.to_string() };
        let captures = RECORD.captures(trimmed).ok_or_else(malformed)?;
        // Addresses wider than 32 bits keep their low word
        let hex = |name: &str| u64::from_str_radix(&captures[name], 16).map(|value| value as u32);
        let pc = hex("pc").map_err(|_| malformed())?;
        let address = hex("address").map_err(|_| malformed())?;
        let access = match &captures["mode"] {
            "R" | "r" => AccessType::Read,
            _ => AccessType::Write,
        };
        let size = captures
            .name("size")
            .map(|size| size.as_str().parse::<u16>())
            .transpose()
            .map_err(|_| malformed())?;
        Ok(Some(Self { pc, address, access, size }))
    }
}

/// Iterates over the records of a whole trace. Bad lines are yielded as errors in place
pub fn records(bytes: &[u8]) -> impl Iterator<Item = Result<TraceRecord, TraceError>> + '_ {
    bytes
        .split(|&byte| byte == b'\n')
        .enumerate()
        .filter_map(|(index, line)| {
            let number = index + 1;
            let line = match std::str::from_utf8(line) {
                Ok(line) => line,
                Err(_) => return Some(Err(TraceError::Encoding { line: number })),
            };
            TraceRecord::parse(line, number).transpose()
        })
}

/// Parses a whole trace, failing on the first bad line
pub fn parse_trace(bytes: &[u8]) -> Result<Vec<TraceRecord>, TraceError> {
    records(bytes).collect()
}
