use std::fmt;
use std::path::Path;

use tracing::debug;
use wordstore_store::{Entries, ReadableStore, StoreResult};

use crate::error::{CdbError, CdbResult};
use crate::format::{hash, read_u32, slice, HEADER_SIZE, RECORD_HEADER_SIZE, TABLE_COUNT};

/// Read-only view of a constant-database image.
///
/// The header and every hash table are bounds-checked on construction;
/// individual records are checked as they are read.
pub struct CdbReader {
    data: Vec<u8>,
    eod: usize,
    len: usize,
}

impl CdbReader {
    /// Validate and wrap an image produced by [`crate::CdbWriter`].
    pub fn from_bytes(data: Vec<u8>) -> CdbResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(CdbError::corrupt(
                data.len(),
                format!("image is {} bytes, header needs {HEADER_SIZE}", data.len()),
            ));
        }

        let eod = read_u32(&data, 0)? as usize;
        if eod < HEADER_SIZE || eod > data.len() {
            return Err(CdbError::corrupt(0, format!("end of data {eod} out of range")));
        }

        let mut slots = 0usize;
        for table in 0..TABLE_COUNT {
            let pos = read_u32(&data, table * 8)? as usize;
            let nslots = read_u32(&data, table * 8 + 4)? as usize;
            if nslots == 0 {
                continue;
            }
            if pos < eod {
                return Err(CdbError::corrupt(
                    table * 8,
                    format!("table {table} starts inside the record area"),
                ));
            }
            slice(&data, pos, nslots * 8)?;
            slots += nslots;
        }

        Ok(Self {
            data,
            eod,
            len: slots / 2,
        })
    }

    /// Read and validate an image from disk.
    pub fn open(path: &Path) -> CdbResult<Self> {
        let data = std::fs::read(path)?;
        let reader = Self::from_bytes(data)?;
        debug!(path = %path.display(), records = reader.len, "opened constant database");
        Ok(reader)
    }

    /// Look up the first record stored under `key`.
    pub fn get(&self, key: &[u8]) -> CdbResult<Option<&[u8]>> {
        let h = hash(key);
        let table = (h & 0xff) as usize;
        let table_pos = read_u32(&self.data, table * 8)? as usize;
        let nslots = read_u32(&self.data, table * 8 + 4)? as usize;
        if nslots == 0 {
            return Ok(None);
        }

        let start = (h >> 8) as usize % nslots;
        for probe in 0..nslots {
            let slot_pos = table_pos + ((start + probe) % nslots) * 8;
            let slot_hash = read_u32(&self.data, slot_pos)?;
            let record_pos = read_u32(&self.data, slot_pos + 4)? as usize;
            if record_pos == 0 {
                return Ok(None);
            }
            if slot_hash != h {
                continue;
            }
            let (record_key, value) = self.record(record_pos)?;
            if record_key == key {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Records in the order they were written.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            reader: self,
            pos: HEADER_SIZE,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the image in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn record(&self, pos: usize) -> CdbResult<(&[u8], &[u8])> {
        if pos < HEADER_SIZE || pos >= self.eod {
            return Err(CdbError::corrupt(pos, "record position outside the record area"));
        }
        let klen = read_u32(&self.data, pos)? as usize;
        let vlen = read_u32(&self.data, pos + 4)? as usize;
        let key_pos = pos + RECORD_HEADER_SIZE;
        let key = slice(&self.data[..self.eod], key_pos, klen)?;
        let value = slice(&self.data[..self.eod], key_pos + klen, vlen)?;
        Ok((key, value))
    }
}

impl fmt::Debug for CdbReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdbReader")
            .field("records", &self.len)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Sequential scan over the record area.
///
/// Stops after the first corrupt record.
pub struct Iter<'a> {
    reader: &'a CdbReader,
    pos: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = CdbResult<(&'a [u8], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.reader.eod {
            return None;
        }
        match self.reader.record(self.pos) {
            Ok((key, value)) => {
                self.pos += RECORD_HEADER_SIZE + key.len() + value.len();
                Some(Ok((key, value)))
            }
            Err(e) => {
                self.pos = self.reader.eod;
                Some(Err(e))
            }
        }
    }
}

impl ReadableStore for CdbReader {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(CdbReader::get(self, key)?.map(<[u8]>::to_vec))
    }

    fn iter(&self) -> StoreResult<Entries<'_>> {
        Ok(Box::new(CdbReader::iter(self).map(|entry| {
            entry
                .map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(Into::into)
        })))
    }
}
