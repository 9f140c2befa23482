//! Unflushed overlay state: the per-key cache and its insertion order.

use std::collections::HashMap;

use wordstore_store::WriteOp;

/// Cached state of one key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    /// The key resolves to this value.
    Present(Vec<u8>),
    /// The key is masked, whatever the backing layer holds.
    Deleted,
}

impl Slot {
    /// The value, unless the slot is a deletion.
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Slot::Present(value) => Some(value),
            Slot::Deleted => None,
        }
    }
}

/// Mutations recorded since the last flush.
///
/// Every key in `order` appears exactly once and has an entry in `cache`.
/// A key keeps its original position when it is overwritten or deleted.
#[derive(Clone, Debug, Default)]
pub struct Pending {
    cache: HashMap<Vec<u8>, Slot>,
    order: Vec<Vec<u8>>,
}

impl Pending {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with pending state (deletions included).
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Pending state of `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<&Slot> {
        self.cache.get(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.cache.contains_key(key)
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.record(key, Slot::Present(value.to_vec()));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.record(key, Slot::Deleted);
    }

    fn record(&mut self, key: &[u8], slot: Slot) {
        match self.cache.get_mut(key) {
            Some(existing) => *existing = slot,
            None => {
                self.cache.insert(key.to_vec(), slot);
                self.order.push(key.to_vec());
            }
        }
    }

    /// Every pending key with its slot, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Slot)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.cache.get(key).map(|slot| (key.as_slice(), slot)))
    }

    /// Pending keys that resolve to a value, in insertion order.
    pub fn live(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.iter()
            .filter_map(|(key, slot)| slot.value().map(|value| (key, value)))
    }

    /// The pending state as an ordered write batch.
    pub fn ops(&self) -> Vec<WriteOp<'_>> {
        self.iter()
            .map(|(key, slot)| match slot {
                Slot::Present(value) => WriteOp::Set {
                    key,
                    value: value.as_slice(),
                },
                Slot::Deleted => WriteOp::Delete { key },
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.order.clear();
    }
}
