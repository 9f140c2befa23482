use crate::error::{display_key, StoreError, StoreResult};

/// An owned key/value pair as yielded by store iteration.
pub type Entry = (Vec<u8>, Vec<u8>);

/// Lazy, single-pass iteration over a store's entries.
///
/// Each call to [`ReadableStore::iter`] starts a fresh pass.
pub type Entries<'a> = Box<dyn Iterator<Item = StoreResult<Entry>> + 'a>;

/// Read capability of a key-value layer.
///
/// Both mutable backing stores and compiled immutable indexes provide this.
/// Keys and values are opaque byte strings; the store never interprets them.
pub trait ReadableStore {
    /// Look up a key.
    ///
    /// Returns `Ok(None)` if the key is absent.
    /// Returns `Err` on backing-layer failure.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Iterate over every entry in the store's native order.
    fn iter(&self) -> StoreResult<Entries<'_>>;

    /// Look up a key, failing with [`StoreError::NotFound`] if it is absent.
    fn fetch(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.get(key)?
            .ok_or_else(|| StoreError::NotFound(display_key(key)))
    }

    /// Check whether a key resolves to a value.
    fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Collect every key in iteration order.
    fn keys(&self) -> StoreResult<Vec<Vec<u8>>> {
        self.iter()?.map(|entry| entry.map(|(k, _)| k)).collect()
    }
}

/// A single write in a batch passed to [`MutableStore::apply_batch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOp<'a> {
    /// Insert or replace `key` with `value`.
    Set { key: &'a [u8], value: &'a [u8] },
    /// Remove `key` if present.
    Delete { key: &'a [u8] },
}

/// Mutable backing store: the dbm-like get/set/delete/iterate contract.
///
/// Implementations may buffer writes; only [`MutableStore::sync`] is a
/// durability barrier. Deleting an absent key is not an error.
pub trait MutableStore: ReadableStore {
    /// Insert or replace a value.
    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove a key. Absent keys are ignored.
    fn delete(&mut self, key: &[u8]) -> StoreResult<()>;

    /// Make every prior write durable.
    fn sync(&mut self) -> StoreResult<()>;

    /// Apply a sequence of writes in order.
    ///
    /// Default implementation calls `set()`/`delete()` for each op. Backends
    /// may override to group the writes (e.g., a single transaction).
    fn apply_batch(&mut self, ops: &[WriteOp<'_>]) -> StoreResult<()> {
        for op in ops {
            match *op {
                WriteOp::Set { key, value } => self.set(key, value)?,
                WriteOp::Delete { key } => self.delete(key)?,
            }
        }
        Ok(())
    }
}
