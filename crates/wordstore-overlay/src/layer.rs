//! Backing layers an overlay can sit on.
//!
//! A layer is readable like any store and knows how to make a set of pending
//! mutations durable. [`MutableLayer`] writes them into a mutable store in
//! place; [`CompiledLayer`] rebuilds a constant-database index from the merged
//! view and swaps it in through the atomic persister.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use wordstore_cdb::{dump_to_vec, CdbReader, CdbResult, CdbWriter};
use wordstore_persist::{sibling, AtomicPersister};
use wordstore_store::{Entries, MutableStore, ReadableStore, StoreError, StoreResult};

use crate::config::OverlayConfig;
use crate::merge::merged;
use crate::pending::Pending;

/// Suffix of the textual dump written next to a rebuilt index.
pub const DUMP_SUFFIX: &str = ".txt";

/// A readable backing layer that can absorb an overlay's pending state.
pub trait Layer: ReadableStore {
    /// Durably apply `pending` on top of the current contents.
    ///
    /// On error the previously persisted contents must be intact, so the
    /// caller can keep `pending` and retry.
    fn write_back(&mut self, pending: &Pending) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// Mutable stores
// ---------------------------------------------------------------------------

/// In-place write-back into a [`MutableStore`].
#[derive(Debug)]
pub struct MutableLayer<S> {
    store: S,
}

impl<S: MutableStore> MutableLayer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: MutableStore> ReadableStore for MutableLayer<S> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.store.get(key)
    }

    fn iter(&self) -> StoreResult<Entries<'_>> {
        self.store.iter()
    }
}

impl<S: MutableStore> Layer for MutableLayer<S> {
    fn write_back(&mut self, pending: &Pending) -> StoreResult<()> {
        let ops = pending.ops();
        self.store.apply_batch(&ops)?;
        self.store.sync()?;
        debug!(ops = ops.len(), "pending writes applied to backing store");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Compiled indexes
// ---------------------------------------------------------------------------

/// Rebuild-on-flush layer over a constant-database file.
///
/// A missing file reads as an empty index.
pub struct CompiledLayer {
    path: PathBuf,
    reader: Option<CdbReader>,
    persister: AtomicPersister,
    config: OverlayConfig,
}

impl CompiledLayer {
    /// Load the index at `path` under the persister's lock.
    pub fn open(path: &Path, persister: AtomicPersister, config: OverlayConfig) -> StoreResult<Self> {
        let reader = match persister.load_optional(path)? {
            Some(bytes) => Some(CdbReader::from_bytes(bytes)?),
            None => None,
        };
        debug!(
            path = %path.display(),
            records = reader.as_ref().map_or(0, CdbReader::len),
            "compiled index opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            persister,
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The loaded index, or `None` if no file existed.
    pub fn reader(&self) -> Option<&CdbReader> {
        self.reader.as_ref()
    }

    fn rebuild(&self, pending: &Pending) -> StoreResult<CdbReader> {
        let mut writer = CdbWriter::new();
        for entry in merged(pending, self.iter()?) {
            let (key, value) = entry?;
            writer.add(&key, &value)?;
        }
        Ok(CdbReader::from_bytes(writer.finish_to_bytes()?)?)
    }
}

impl fmt::Debug for CompiledLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledLayer")
            .field("path", &self.path)
            .field("records", &self.reader.as_ref().map_or(0, CdbReader::len))
            .field("config", &self.config)
            .finish()
    }
}

impl ReadableStore for CompiledLayer {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match &self.reader {
            Some(reader) => ReadableStore::get(reader, key),
            None => Ok(None),
        }
    }

    fn iter(&self) -> StoreResult<Entries<'_>> {
        match &self.reader {
            Some(reader) => ReadableStore::iter(reader),
            None => Ok(Box::new(std::iter::empty())),
        }
    }
}

impl Layer for CompiledLayer {
    fn write_back(&mut self, pending: &Pending) -> StoreResult<()> {
        let reader = self.rebuild(pending)?;
        self.persister.save(&self.path, reader.as_bytes())?;

        // The index is installed at this point; a dump failure only warns.
        if self.config.backup_dump {
            let dump_path = sibling(&self.path, DUMP_SUFFIX);
            let saved = reader
                .iter()
                .collect::<CdbResult<Vec<_>>>()
                .map_err(StoreError::from)
                .and_then(|records| {
                    Ok(self.persister.save(&dump_path, &dump_to_vec(records))?)
                });
            if let Err(e) = saved {
                warn!(dump = %dump_path.display(), error = %e, "backup dump not written");
            }
        }

        info!(
            path = %self.path.display(),
            records = reader.len(),
            bytes = reader.size_bytes(),
            "compiled index rebuilt"
        );
        self.reader = Some(reader);
        Ok(())
    }
}
