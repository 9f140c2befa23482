//! The write-back overlay store.

use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};
use wordstore_persist::AtomicPersister;
use wordstore_store::{
    display_key, Entries, MutableStore, ReadableStore, StoreError, StoreResult,
};

use crate::config::OverlayConfig;
use crate::layer::{CompiledLayer, Layer, MutableLayer};
use crate::merge::merged;
use crate::pending::{Pending, Slot};

/// Write-back cache in front of a backing layer.
///
/// Reads consult the pending state first and fall through to the layer;
/// writes touch only the pending state until [`flush`](Self::flush). Once
/// [`close`](Self::close) succeeds every further call fails with
/// [`StoreError::Closed`].
///
/// Dropping a store with unflushed changes discards them. Call `close()`.
pub struct OverlayStore<L: Layer> {
    layer: L,
    pending: Pending,
    closed: bool,
}

impl<S: MutableStore> OverlayStore<MutableLayer<S>> {
    /// Overlay a mutable store; flush writes pending changes into it in place.
    pub fn over(store: S) -> Self {
        Self::new(MutableLayer::new(store))
    }
}

impl OverlayStore<CompiledLayer> {
    /// Overlay the compiled index at `path`; flush rebuilds the whole file.
    ///
    /// A missing file is an empty index.
    pub fn open_compiled(
        path: impl AsRef<Path>,
        persister: AtomicPersister,
        config: OverlayConfig,
    ) -> StoreResult<Self> {
        let layer = CompiledLayer::open(path.as_ref(), persister, config)?;
        Ok(Self::new(layer))
    }
}

impl<L: Layer> OverlayStore<L> {
    pub fn new(layer: L) -> Self {
        Self {
            layer,
            pending: Pending::new(),
            closed: false,
        }
    }

    /// The backing layer.
    pub fn layer(&self) -> &L {
        &self.layer
    }

    /// Whether there are mutations not yet flushed.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of keys with unflushed state.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Make every pending mutation durable in the backing layer.
    ///
    /// Does nothing when there is nothing pending. On failure the pending
    /// state is kept, so calling `flush` again retries the same merge.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        if self.pending.is_empty() {
            debug!("flush skipped, nothing pending");
            return Ok(());
        }

        let count = self.pending.len();
        if let Err(e) = self.layer.write_back(&self.pending) {
            warn!(pending = count, error = %e, "flush failed; pending changes kept");
            return Err(e);
        }
        self.pending.clear();
        info!(keys = count, "overlay flushed");
        Ok(())
    }

    /// Flush, then retire the store.
    ///
    /// If the flush fails the store stays open and can be closed again.
    pub fn close(&mut self) -> StoreResult<()> {
        self.flush()?;
        self.closed = true;
        debug!("overlay closed");
        Ok(())
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<L: Layer> ReadableStore for OverlayStore<L> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        match self.pending.get(key) {
            Some(Slot::Present(value)) => Ok(Some(value.clone())),
            Some(Slot::Deleted) => Ok(None),
            None => self.layer.get(key).map_err(|e| {
                debug!(key = %display_key(key), error = %e, "backing lookup failed");
                unavailable(e)
            }),
        }
    }

    fn iter(&self) -> StoreResult<Entries<'_>> {
        self.ensure_open()?;
        let backing = self.layer.iter().map_err(unavailable)?;
        Ok(Box::new(
            merged(&self.pending, backing).map(|entry| entry.map_err(unavailable)),
        ))
    }
}

impl<L: Layer> MutableStore for OverlayStore<L> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        self.pending.set(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        self.pending.delete(key);
        Ok(())
    }

    fn sync(&mut self) -> StoreResult<()> {
        self.flush()
    }
}

impl<L: Layer> Drop for OverlayStore<L> {
    fn drop(&mut self) {
        if !self.closed && !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "overlay dropped without close; unflushed changes discarded"
            );
        }
    }
}

impl<L: Layer + fmt::Debug> fmt::Debug for OverlayStore<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayStore")
            .field("layer", &self.layer)
            .field("pending", &self.pending.len())
            .field("closed", &self.closed)
            .finish()
    }
}

fn unavailable(err: StoreError) -> StoreError {
    match err {
        e @ StoreError::StorageUnavailable(_) => e,
        other => StoreError::StorageUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::DUMP_SUFFIX;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::rc::Rc;
    use wordstore_persist::{sibling, PersistConfig, TMP_SUFFIX};
    use wordstore_store::InMemoryStore;

    fn entries<S: ReadableStore>(store: &S) -> Vec<(Vec<u8>, Vec<u8>)> {
        store.iter().unwrap().map(Result::unwrap).collect()
    }

    fn pair(k: &str, v: &str) -> (Vec<u8>, Vec<u8>) {
        (k.as_bytes().to_vec(), v.as_bytes().to_vec())
    }

    fn compiled(path: &Path) -> OverlayStore<CompiledLayer> {
        OverlayStore::open_compiled(path, AtomicPersister::default(), OverlayConfig::default())
            .unwrap()
    }

    /// Backing store whose reads and writes fail while `broken` is set.
    struct FlakyStore {
        inner: InMemoryStore,
        broken: Rc<Cell<bool>>,
    }

    impl FlakyStore {
        fn check(&self) -> StoreResult<()> {
            if self.broken.get() {
                Err(std::io::Error::other("disk on fire").into())
            } else {
                Ok(())
            }
        }
    }

    impl ReadableStore for FlakyStore {
        fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
            self.check()?;
            self.inner.get(key)
        }

        fn iter(&self) -> StoreResult<Entries<'_>> {
            self.check()?;
            self.inner.iter()
        }
    }

    impl MutableStore for FlakyStore {
        fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
            self.check()?;
            self.inner.set(key, value)
        }

        fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
            self.check()?;
            self.inner.delete(key)
        }

        fn sync(&mut self) -> StoreResult<()> {
            self.check()
        }
    }

    // -----------------------------------------------------------------------
    // Read/write semantics
    // -----------------------------------------------------------------------

    #[test]
    fn set_then_get() {
        let mut store = OverlayStore::over(InMemoryStore::new());
        store.set(b"word", b"0.5").unwrap();
        assert_eq!(store.get(b"word").unwrap(), Some(b"0.5".to_vec()));
        assert!(store.is_dirty());
        // Write-back: nothing reaches the backing store yet.
        assert!(store.layer().store().is_empty());
    }

    #[test]
    fn delete_masks_backing_entry() {
        let backing: InMemoryStore = [("a", "1")].into_iter().collect();
        let mut store = OverlayStore::over(backing);
        store.delete(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
        assert!(matches!(store.fetch(b"a"), Err(StoreError::NotFound(_))));
        assert!(!store.contains(b"a").unwrap());
    }

    #[test]
    fn delete_of_absent_key_is_recorded() {
        let mut store = OverlayStore::over(InMemoryStore::new());
        store.delete(b"nothing").unwrap();
        assert_eq!(store.pending_len(), 1);
        assert_eq!(store.get(b"nothing").unwrap(), None);
    }

    #[test]
    fn falls_through_to_backing() {
        let backing: InMemoryStore = [("a", "1")].into_iter().collect();
        let store = OverlayStore::over(backing);
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(!store.is_dirty());
    }

    #[test]
    fn last_write_wins() {
        let mut store = OverlayStore::over(InMemoryStore::new());
        store.set(b"k", b"1").unwrap();
        store.delete(b"k").unwrap();
        store.set(b"k", b"2").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.pending_len(), 1);
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    #[test]
    fn merge_example() {
        let backing: InMemoryStore = [("a", "1"), ("b", "2")].into_iter().collect();
        let mut store = OverlayStore::over(backing);
        store.set(b"b", b"3").unwrap();
        store.set(b"c", b"4").unwrap();
        store.delete(b"a").unwrap();

        assert_eq!(entries(&store), vec![pair("b", "3"), pair("c", "4")]);
        assert_eq!(store.keys().unwrap(), vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn each_iter_call_restarts() {
        let backing: InMemoryStore = [("x", "1")].into_iter().collect();
        let mut store = OverlayStore::over(backing);
        store.set(b"y", b"2").unwrap();

        let mut first = store.iter().unwrap();
        assert!(first.next().is_some());
        assert_eq!(entries(&store), vec![pair("y", "2"), pair("x", "1")]);
    }

    // -----------------------------------------------------------------------
    // Flush and close over a mutable store
    // -----------------------------------------------------------------------

    #[test]
    fn flush_writes_through_and_clears() {
        let backing: InMemoryStore = [("a", "1"), ("b", "2")].into_iter().collect();
        let mut store = OverlayStore::over(backing);
        store.set(b"b", b"3").unwrap();
        store.delete(b"a").unwrap();
        store.flush().unwrap();

        assert!(!store.is_dirty());
        assert_eq!(entries(store.layer().store()), vec![pair("b", "3")]);
        assert_eq!(store.get(b"b").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn sync_is_flush() {
        let mut store = OverlayStore::over(InMemoryStore::new());
        store.set(b"k", b"v").unwrap();
        MutableStore::sync(&mut store).unwrap();
        assert_eq!(store.layer().store().get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn close_flushes_then_rejects_everything() {
        let mut store = OverlayStore::over(InMemoryStore::new());
        store.set(b"k", b"v").unwrap();
        store.close().unwrap();

        assert!(store.is_closed());
        assert_eq!(store.layer().store().get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(matches!(store.set(b"k", b"w"), Err(StoreError::Closed)));
        assert!(matches!(store.delete(b"k"), Err(StoreError::Closed)));
        assert!(matches!(store.get(b"k"), Err(StoreError::Closed)));
        assert!(matches!(store.iter(), Err(StoreError::Closed)));
        assert!(matches!(store.flush(), Err(StoreError::Closed)));
        assert!(matches!(store.close(), Err(StoreError::Closed)));
    }

    #[test]
    fn drop_without_close_does_not_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.cdb");
        let mut store = compiled(&path);
        store.set(b"k", b"v").unwrap();
        drop(store);

        assert!(!path.exists());
        assert_eq!(compiled(&path).get(b"k").unwrap(), None);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn backing_read_failure_is_storage_unavailable() {
        let broken = Rc::new(Cell::new(true));
        let mut store = OverlayStore::over(FlakyStore {
            inner: InMemoryStore::new(),
            broken: broken.clone(),
        });
        assert!(matches!(store.get(b"k"), Err(StoreError::StorageUnavailable(_))));
        assert!(matches!(store.iter(), Err(StoreError::StorageUnavailable(_))));

        // Cached keys never touch the backing layer.
        store.set(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn failed_flush_keeps_pending_for_retry() {
        let broken = Rc::new(Cell::new(false));
        let mut store = OverlayStore::over(FlakyStore {
            inner: InMemoryStore::new(),
            broken: broken.clone(),
        });
        store.set(b"k", b"v").unwrap();

        broken.set(true);
        assert!(store.close().is_err());
        assert!(!store.is_closed());
        assert!(store.is_dirty());

        broken.set(false);
        store.close().unwrap();
        assert_eq!(store.layer().store().inner.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    // -----------------------------------------------------------------------
    // Compiled index
    // -----------------------------------------------------------------------

    #[test]
    fn compiled_reopen_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.cdb");

        let mut store = compiled(&path);
        store.set(b"word1", b"0.87").unwrap();
        store.set(b"word2", b"0.12").unwrap();
        store.delete(b"word1").unwrap();
        store.flush().unwrap();
        store.close().unwrap();

        let reopened = compiled(&path);
        assert_eq!(reopened.get(b"word1").unwrap(), None);
        assert_eq!(reopened.get(b"word2").unwrap(), Some(b"0.12".to_vec()));
        assert_eq!(entries(&reopened), vec![pair("word2", "0.12")]);
    }

    #[test]
    fn compiled_merge_keeps_backing_order_after_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.cdb");

        let mut store = compiled(&path);
        for (k, v) in [("z", "1"), ("a", "2"), ("m", "3")] {
            store.set(k.as_bytes(), v.as_bytes()).unwrap();
        }
        store.close().unwrap();

        let mut store = compiled(&path);
        store.set(b"a", b"20").unwrap();
        store.set(b"new", b"4").unwrap();
        store.delete(b"z").unwrap();
        store.close().unwrap();

        assert_eq!(
            entries(&compiled(&path)),
            vec![pair("a", "20"), pair("new", "4"), pair("m", "3")]
        );
    }

    #[test]
    fn clean_flush_does_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.cdb");
        let mut store = compiled(&path);
        store.flush().unwrap();
        store.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn repeated_flush_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.cdb");
        let mut store = compiled(&path);
        store.set(b"spam", b"1").unwrap();
        store.set(b"ham", b"2").unwrap();
        store.flush().unwrap();
        let first = std::fs::read(&path).unwrap();

        // Same writes again force a second real rebuild.
        store.set(b"spam", b"1").unwrap();
        store.set(b"ham", b"2").unwrap();
        assert!(store.is_dirty());
        store.flush().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);
        store.close().unwrap();

        let mut store = compiled(&path);
        store.set(b"spam", b"1").unwrap();
        store.set(b"ham", b"2").unwrap();
        store.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn failed_backup_dump_still_reports_flushed_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.cdb");
        let open = || {
            OverlayStore::open_compiled(
                &path,
                AtomicPersister::default(),
                OverlayConfig::default().with_backup_dump(true),
            )
            .unwrap()
        };

        let mut store = open();
        store.set(b"old", b"1").unwrap();
        store.close().unwrap();
        let before = std::fs::read(&path).unwrap();

        let mut store = open();
        store.set(b"new", b"2").unwrap();
        let dump_tmp = sibling(&sibling(&path, DUMP_SUFFIX), TMP_SUFFIX);
        std::fs::create_dir(&dump_tmp).unwrap();

        let flushed = store.flush();
        let changed = std::fs::read(&path).unwrap() != before;
        assert_eq!(flushed.is_ok(), changed);
        assert!(changed);
        assert_eq!(store.pending_len(), 0);
        assert_eq!(
            entries(&compiled(&path)),
            vec![pair("new", "2"), pair("old", "1")]
        );
        store.close().unwrap();
    }

    #[test]
    fn compiled_flush_failure_leaves_file_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.cdb");

        let mut store = compiled(&path);
        store.set(b"old", b"1").unwrap();
        store.close().unwrap();
        let before = std::fs::read(&path).unwrap();

        let mut store = compiled(&path);
        store.set(b"new", b"2").unwrap();

        // A directory squatting on the temp path makes the temp write fail.
        let tmp = sibling(&path, TMP_SUFFIX);
        std::fs::create_dir(&tmp).unwrap();
        assert!(store.flush().is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(store.pending_len(), 1);
        assert_eq!(store.get(b"new").unwrap(), Some(b"2".to_vec()));

        std::fs::remove_dir(&tmp).unwrap();
        store.close().unwrap();
        let reopened = compiled(&path);
        assert_eq!(
            entries(&reopened),
            vec![pair("new", "2"), pair("old", "1")]
        );
    }

    #[test]
    fn compiled_lock_timeout_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.cdb");
        let persister = AtomicPersister::new(
            PersistConfig::default().with_lock_timeout(std::time::Duration::from_millis(50)),
        );
        let mut store =
            OverlayStore::open_compiled(&path, persister, OverlayConfig::default()).unwrap();
        store.set(b"k", b"v").unwrap();

        let held = wordstore_persist::InterprocessLock::try_acquire(&path).unwrap();
        assert!(held.is_some());
        assert!(matches!(store.flush(), Err(StoreError::LockTimeout { .. })));
        assert!(store.is_dirty());
        drop(held);
        store.close().unwrap();
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    #[derive(Clone, Debug)]
    enum Op {
        Set(u8, u8),
        Delete(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..12, any::<u8>()).prop_map(|(k, v)| Op::Set(k, v)),
            (0u8..12).prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn overlay_matches_model(
            initial in prop::collection::btree_map(0u8..12, any::<u8>(), 0..8),
            ops in prop::collection::vec(op(), 0..40),
        ) {
            let backing: InMemoryStore = initial
                .iter()
                .map(|(k, v)| (vec![*k], vec![*v]))
                .collect();
            let mut model: BTreeMap<Vec<u8>, Vec<u8>> = initial
                .iter()
                .map(|(k, v)| (vec![*k], vec![*v]))
                .collect();
            let mut store = OverlayStore::over(backing);

            for op in &ops {
                match *op {
                    Op::Set(k, v) => {
                        store.set(&[k], &[v]).unwrap();
                        model.insert(vec![k], vec![v]);
                    }
                    Op::Delete(k) => {
                        store.delete(&[k]).unwrap();
                        model.remove(&vec![k]);
                    }
                }
            }

            for k in 0u8..12 {
                prop_assert_eq!(store.get(&[k]).unwrap(), model.get(&vec![k]).cloned());
            }
            let merged = entries(&store);
            prop_assert_eq!(merged.len(), model.len());
            let as_map: BTreeMap<_, _> = merged.into_iter().collect();
            prop_assert_eq!(&as_map, &model);

            store.close().unwrap();
            let flushed: BTreeMap<_, _> = entries(store.layer().store()).into_iter().collect();
            prop_assert_eq!(flushed, model);
        }
    }
}
