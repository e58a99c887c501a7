//! Bounds-checked access to the host's physical memory.
//!
//! The host exposes byte-level access through [`MemoryAccess`]; region
//! helpers here implement the range checks and partial-write reporting that
//! `PEEK`, `POKE` and `DEBUG` rely on, plus the address and hex-string
//! grammar of those verbs.

use thiserror::Error;

use crate::config::combine_segment_offset;

/// Host capability for physical memory access.
///
/// Reads and writes are byte-granular and may fail per byte (unmapped pages,
/// ROM shadows); the region helpers translate that into protocol errors.
pub trait MemoryAccess: Send + Sync {
    /// Total addressable bytes.
    fn total_bytes(&self) -> u64;
    /// Reads one byte; `None` when the host cannot service the read.
    fn read_byte(&self, address: u32) -> Option<u8>;
    /// Writes one byte; false when the host cannot service the write.
    fn write_byte(&self, address: u32, value: u8) -> bool;
}

/// Failures surfaced by the region helpers. `Display` forms are the wire
/// error reasons.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The range does not fit the addressable space (or is empty).
    #[error("memory range out of bounds")]
    OutOfBounds,
    /// A byte read failed inside a valid range.
    #[error("memory read failed")]
    ReadFailed,
    /// A byte write failed inside a valid range; carries the count written
    /// before the failure.
    #[error("memory write failed")]
    WriteFailed {
        /// Bytes successfully written before the failure.
        bytes_written: usize,
    },
    /// `POKE` was given no data bytes.
    #[error("no data provided")]
    NoData,
}

fn range_in_bounds(mem: &dyn MemoryAccess, offset: u32, length: u32) -> bool {
    if length == 0 {
        return false;
    }
    let max_bytes = mem.total_bytes();
    if u64::from(offset) >= max_bytes {
        return false;
    }
    u64::from(offset) + u64::from(length) <= max_bytes
}

/// Reads `length` bytes starting at `offset`.
pub fn peek_region(
    mem: &dyn MemoryAccess,
    offset: u32,
    length: u32,
) -> Result<Vec<u8>, MemoryError> {
    if !range_in_bounds(mem, offset, length) {
        return Err(MemoryError::OutOfBounds);
    }

    let mut bytes = Vec::with_capacity(length as usize);
    for i in 0..length {
        match mem.read_byte(offset + i) {
            Some(value) => bytes.push(value),
            None => return Err(MemoryError::ReadFailed),
        }
    }
    Ok(bytes)
}

/// Writes `data` starting at `offset`; returns the byte count written.
pub fn poke_region(mem: &dyn MemoryAccess, offset: u32, data: &[u8]) -> Result<usize, MemoryError> {
    if data.is_empty() {
        return Err(MemoryError::NoData);
    }
    let length = u32::try_from(data.len()).map_err(|_| MemoryError::OutOfBounds)?;
    if !range_in_bounds(mem, offset, length) {
        return Err(MemoryError::OutOfBounds);
    }

    for (i, &value) in data.iter().enumerate() {
        if !mem.write_byte(offset + i as u32, value) {
            return Err(MemoryError::WriteFailed { bytes_written: i });
        }
    }
    Ok(data.len())
}

/// Parses a `PEEK`/`POKE` address: `0xNNNN`, bare hex, or `SEG:0xOFFSET`
/// (`(seg << 4) + off`, saturating).
pub fn parse_address(token: &str) -> Option<u32> {
    if let Some((segment, offset)) = token.split_once(':') {
        let segment = parse_hex(segment)?;
        let offset = parse_hex(offset)?;
        return Some(combine_segment_offset(segment, offset));
    }
    parse_hex(token)
}

fn parse_hex(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Parses the hex-byte payload of `POKE`: pairs of hex digits, whitespace
/// between pairs allowed.
pub fn parse_hex_bytes(text: &str) -> Option<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

/// Formats bytes as the wire hex line: lowercase pairs, space-separated,
/// trailing newline.
pub fn format_hex_bytes(bytes: &[u8]) -> String {
    let mut line = String::with_capacity(bytes.len() * 3 + 1);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&format!("{byte:02x}"));
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    struct FakeMemory {
        bytes: Mutex<Vec<u8>>,
        fail_at: Option<u32>,
    }

    impl FakeMemory {
        fn new(size: usize) -> Self {
            Self {
                bytes: Mutex::new(vec![0; size]),
                fail_at: None,
            }
        }
    }

    impl MemoryAccess for FakeMemory {
        fn total_bytes(&self) -> u64 {
            self.bytes.lock().len() as u64
        }
        fn read_byte(&self, address: u32) -> Option<u8> {
            if self.fail_at == Some(address) {
                return None;
            }
            self.bytes.lock().get(address as usize).copied()
        }
        fn write_byte(&self, address: u32, value: u8) -> bool {
            if self.fail_at == Some(address) {
                return false;
            }
            let mut bytes = self.bytes.lock();
            match bytes.get_mut(address as usize) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            }
        }
    }

    #[test]
    fn peek_respects_bounds() {
        let mem = FakeMemory::new(16);
        assert_eq!(peek_region(&mem, 0, 4), Ok(vec![0, 0, 0, 0]));
        assert_eq!(peek_region(&mem, 12, 4), Ok(vec![0, 0, 0, 0]));
        assert_eq!(peek_region(&mem, 13, 4), Err(MemoryError::OutOfBounds));
        assert_eq!(peek_region(&mem, 16, 1), Err(MemoryError::OutOfBounds));
        assert_eq!(peek_region(&mem, 0, 0), Err(MemoryError::OutOfBounds));
    }

    #[test]
    fn poke_writes_and_reports_partial_failures() {
        let mem = FakeMemory::new(8);
        assert_eq!(poke_region(&mem, 2, &[0xAA, 0xBB]), Ok(2));
        assert_eq!(peek_region(&mem, 2, 2), Ok(vec![0xAA, 0xBB]));
        assert_eq!(poke_region(&mem, 0, &[]), Err(MemoryError::NoData));
        assert_eq!(
            poke_region(&mem, 7, &[1, 2]),
            Err(MemoryError::OutOfBounds)
        );

        let mem = FakeMemory {
            bytes: Mutex::new(vec![0; 8]),
            fail_at: Some(3),
        };
        assert_eq!(
            poke_region(&mem, 2, &[1, 2, 3]),
            Err(MemoryError::WriteFailed { bytes_written: 1 })
        );
    }

    #[test]
    fn address_grammar() {
        assert_eq!(parse_address("0x1234"), Some(0x1234));
        assert_eq!(parse_address("c000"), Some(0xC000));
        assert_eq!(parse_address("C000:0x1234"), Some(0xC1234));
        assert_eq!(parse_address("0xB800:0"), Some(0xB8000));
        assert_eq!(parse_address(""), None);
        assert_eq!(parse_address("zz"), None);
        assert_eq!(parse_address("1:2:3"), None);
    }

    #[test]
    fn hex_byte_grammar() {
        assert_eq!(parse_hex_bytes("deadBEEF"), Some(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(parse_hex_bytes("de ad"), Some(vec![0xDE, 0xAD]));
        assert_eq!(parse_hex_bytes("dea"), None);
        assert_eq!(parse_hex_bytes(""), None);
        assert_eq!(parse_hex_bytes("zz"), None);
        assert_eq!(format_hex_bytes(&[0xDE, 0xAD]), "de ad\n");
        assert_eq!(format_hex_bytes(&[]), "\n");
    }
}
