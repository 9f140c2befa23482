use tracing::debug;

use crate::error::{CdbError, CdbResult};
use crate::format::{hash, HEADER_SIZE, RECORD_HEADER_SIZE, TABLE_COUNT};

/// Builds a constant-database image in memory.
///
/// Records are laid out in the order they are added; [`crate::CdbReader::iter`]
/// yields them back in the same order. Duplicate keys are stored as given and
/// lookups return the first one, so callers that want map semantics should
/// deduplicate before adding.
pub struct CdbWriter {
    data: Vec<u8>,
    slots: Vec<(u32, u32)>,
}

impl CdbWriter {
    pub fn new() -> Self {
        Self {
            data: vec![0; HEADER_SIZE],
            slots: Vec::new(),
        }
    }

    /// Append one record.
    ///
    /// Fails with [`CdbError::TooLarge`] if the record would push the image
    /// past the 32-bit offsets the format uses.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> CdbResult<()> {
        let pos = self.data.len();
        let end = pos as u64 + (RECORD_HEADER_SIZE + key.len() + value.len()) as u64;
        if end > u64::from(u32::MAX) {
            return Err(CdbError::TooLarge { size: end });
        }

        self.data.extend_from_slice(&(key.len() as u32).to_le_bytes());
        self.data.extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.data.extend_from_slice(key);
        self.data.extend_from_slice(value);
        self.slots.push((hash(key), pos as u32));
        Ok(())
    }

    /// Number of records added so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write the hash tables and header, returning the complete image.
    pub fn finish_to_bytes(self) -> CdbResult<Vec<u8>> {
        let Self { mut data, slots } = self;

        let table_bytes = slots.len() as u64 * 16;
        let size = data.len() as u64 + table_bytes;
        if size > u64::from(u32::MAX) {
            return Err(CdbError::TooLarge { size });
        }

        let mut buckets: Vec<Vec<(u32, u32)>> = vec![Vec::new(); TABLE_COUNT];
        for &(h, pos) in &slots {
            buckets[(h & 0xff) as usize].push((h, pos));
        }

        let mut header = Vec::with_capacity(HEADER_SIZE);
        for bucket in &buckets {
            let table_pos = data.len() as u32;
            let nslots = bucket.len() * 2;
            header.extend_from_slice(&table_pos.to_le_bytes());
            header.extend_from_slice(&(nslots as u32).to_le_bytes());
            if nslots == 0 {
                continue;
            }

            let mut table = vec![(0u32, 0u32); nslots];
            for &(h, pos) in bucket {
                let mut slot = (h >> 8) as usize % nslots;
                while table[slot].1 != 0 {
                    slot = (slot + 1) % nslots;
                }
                table[slot] = (h, pos);
            }
            for (h, pos) in table {
                data.extend_from_slice(&h.to_le_bytes());
                data.extend_from_slice(&pos.to_le_bytes());
            }
        }
        data[..HEADER_SIZE].copy_from_slice(&header);

        debug!(records = slots.len(), bytes = data.len(), "built constant database");
        Ok(data)
    }
}

impl Default for CdbWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an image from `(key, value)` pairs in iteration order.
pub fn build<I, K, V>(entries: I) -> CdbResult<Vec<u8>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut writer = CdbWriter::new();
    for (key, value) in entries {
        writer.add(key.as_ref(), value.as_ref())?;
    }
    writer.finish_to_bytes()
}
