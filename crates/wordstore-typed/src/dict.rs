use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use wordstore_store::{display_key, MutableStore, ReadableStore, StoreError, StoreResult};

use crate::record::{decode, encode, TypedValue};
use crate::wrapped::Wrapped;

/// A mapping of byte keys to [`TypedValue`]s over any backing store.
///
/// `P` is the plain value type, `W` the one designated wrapped type. Every
/// stored value carries a one-byte tag saying which of the two it is.
pub struct TypedDict<S, P, W> {
    store: S,
    _values: PhantomData<fn() -> (P, W)>,
}

impl<S, P, W> TypedDict<S, P, W> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            _values: PhantomData,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S, P, W> TypedDict<S, P, W>
where
    S: ReadableStore,
    P: DeserializeOwned,
    W: Wrapped,
{
    /// Look up and decode a key. `Ok(None)` if absent.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<TypedValue<P, W>>> {
        match self.store.get(key)? {
            Some(bytes) => decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get) but fails with [`StoreError::NotFound`].
    pub fn fetch(&self, key: &[u8]) -> StoreResult<TypedValue<P, W>> {
        self.get(key)?
            .ok_or_else(|| StoreError::NotFound(display_key(key)))
    }

    /// Look up a key expected to hold a plain value.
    ///
    /// A wrapped record under `key` is [`StoreError::CorruptRecord`].
    pub fn get_plain(&self, key: &[u8]) -> StoreResult<Option<P>> {
        match self.get(key)? {
            Some(TypedValue::Plain(p)) => Ok(Some(p)),
            Some(TypedValue::Wrapped(_)) => Err(mismatch(key, "plain", "wrapped")),
            None => Ok(None),
        }
    }

    /// Look up a key expected to hold the wrapped type.
    ///
    /// A plain record under `key` is [`StoreError::CorruptRecord`].
    pub fn get_wrapped(&self, key: &[u8]) -> StoreResult<Option<W>> {
        match self.get(key)? {
            Some(TypedValue::Wrapped(w)) => Ok(Some(w)),
            Some(TypedValue::Plain(_)) => Err(mismatch(key, "wrapped", "plain")),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        self.store.contains(key)
    }

    /// Decoded entries in the store's native order.
    ///
    /// Each entry is decoded as it is reached, so one bad record surfaces as
    /// one `Err` item rather than failing the whole pass.
    pub fn iter(
        &self,
    ) -> StoreResult<impl Iterator<Item = StoreResult<(Vec<u8>, TypedValue<P, W>)>> + '_> {
        Ok(self.store.iter()?.map(|entry| -> StoreResult<(Vec<u8>, TypedValue<P, W>)> {
            let (key, bytes) = entry?;
            let value = decode(&key, &bytes)?;
            Ok((key, value))
        }))
    }

    /// Like [`iter`](Self::iter) but never yields any of the `skip` keys.
    ///
    /// Skipped records are not decoded, so they may hold anything.
    pub fn iter_skipping<I, K>(
        &self,
        skip: I,
    ) -> StoreResult<impl Iterator<Item = StoreResult<(Vec<u8>, TypedValue<P, W>)>> + '_>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let skip: HashSet<Vec<u8>> = skip.into_iter().map(|k| k.as_ref().to_vec()).collect();
        Ok(self.store.iter()?.filter_map(move |entry| match entry {
            Ok((key, _)) if skip.contains(&key) => None,
            Ok((key, bytes)) => Some(decode::<P, W>(&key, &bytes).map(|value| (key, value))),
            Err(e) => Some(Err(e)),
        }))
    }
}

impl<S, P, W> TypedDict<S, P, W>
where
    S: MutableStore,
    P: Serialize + DeserializeOwned,
    W: Wrapped,
{
    pub fn set(&mut self, key: &[u8], value: &TypedValue<P, W>) -> StoreResult<()> {
        let bytes = encode(value)?;
        debug!(key = %display_key(key), tag = ?value.tag(), len = bytes.len(), "typed set");
        self.store.set(key, &bytes)
    }

    pub fn set_plain(&mut self, key: &[u8], value: P) -> StoreResult<()> {
        self.set(key, &TypedValue::Plain(value))
    }

    pub fn set_wrapped(&mut self, key: &[u8], value: W) -> StoreResult<()> {
        self.set(key, &TypedValue::Wrapped(value))
    }

    /// Remove a key, failing with [`StoreError::NotFound`] if it is absent.
    pub fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        if !self.store.contains(key)? {
            return Err(StoreError::NotFound(display_key(key)));
        }
        self.store.delete(key)
    }

    /// Durability barrier of the backing store.
    pub fn sync(&mut self) -> StoreResult<()> {
        self.store.sync()
    }
}

impl<S: fmt::Debug, P, W> fmt::Debug for TypedDict<S, P, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedDict").field("store", &self.store).finish()
    }
}

fn mismatch(key: &[u8], expected: &str, found: &str) -> StoreError {
    StoreError::CorruptRecord {
        key: display_key(key),
        reason: format!("expected a {expected} record, found {found}"),
    }
}
