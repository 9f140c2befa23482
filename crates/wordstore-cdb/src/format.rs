//! Constant-database layout shared by the writer and the reader.
//!
//! ```text
//! [2048 bytes: 256 x (table position u32 LE, slot count u32 LE)]
//! [records:    klen u32 LE, vlen u32 LE, key bytes, value bytes]...
//! [256 hash tables: slot count x (hash u32 LE, record position u32 LE)]
//! ```
//!
//! The position of table 0 doubles as the end-of-data marker for sequential
//! record scans. A slot with record position 0 is empty.

use crate::error::{CdbError, CdbResult};

/// Number of hash tables (and header entries).
pub const TABLE_COUNT: usize = 256;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = TABLE_COUNT * 8;

/// Size of a record's length prefix (klen + vlen).
pub const RECORD_HEADER_SIZE: usize = 8;

const HASH_START: u32 = 5381;

/// The constant-database hash: `h = ((h << 5) + h) ^ byte`, starting at 5381.
pub fn hash(key: &[u8]) -> u32 {
    key.iter().fold(HASH_START, |h, &byte| {
        (h << 5).wrapping_add(h) ^ u32::from(byte)
    })
}

/// Read a little-endian u32 at `pos`, bounds-checked.
pub(crate) fn read_u32(data: &[u8], pos: usize) -> CdbResult<u32> {
    let bytes = pos
        .checked_add(4)
        .and_then(|end| data.get(pos..end))
        .ok_or_else(|| CdbError::corrupt(pos, "u32 extends beyond end of index"))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Borrow `len` bytes at `pos`, bounds-checked.
pub(crate) fn slice(data: &[u8], pos: usize, len: usize) -> CdbResult<&[u8]> {
    pos.checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or_else(|| CdbError::corrupt(pos, format!("{len} bytes extend beyond end of index")))
}
