//! Disk-resident backing store on an embedded redb database file.
//!
//! Plays the role of a dbm hash file: opened by path and [`OpenMode`],
//! supporting byte-string get/set/delete/iterate. Writes are committed
//! without fsync; [`MutableStore::sync`] is the durability barrier.

use std::fmt;
use std::path::{Path, PathBuf};

use redb::{
    Database, Durability, ReadableTable, ReadableTableMetadata, TableDefinition, TableError,
};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{Entries, Entry, MutableStore, ReadableStore, WriteOp};

/// Single table holding every entry. Key and value are raw bytes.
const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

/// How to open a [`HashFileStore`], mirroring the dbm `c`/`n`/`w`/`r` flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the file if necessary, open for read-write.
    #[default]
    Create,
    /// Always create a new, empty file, open for read-write.
    New,
    /// Open an existing file for read-write.
    ReadWrite,
    /// Open an existing file read-only.
    ReadOnly,
}

impl OpenMode {
    /// Parse a dbm-style mode flag.
    pub fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'c' => Some(Self::Create),
            'n' => Some(Self::New),
            'w' => Some(Self::ReadWrite),
            'r' => Some(Self::ReadOnly),
            _ => None,
        }
    }

    /// Whether stores opened in this mode accept writes.
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::New => write!(f, "new"),
            Self::ReadWrite => write!(f, "read-write"),
            Self::ReadOnly => write!(f, "read-only"),
        }
    }
}

fn unavailable(err: impl fmt::Display) -> StoreError {
    StoreError::StorageUnavailable(err.to_string())
}

/// Embedded hash-file backing store.
pub struct HashFileStore {
    db: Database,
    path: PathBuf,
    mode: OpenMode,
}

impl HashFileStore {
    /// Open a store at `path` in the given mode.
    ///
    /// `ReadWrite` and `ReadOnly` fail with an I/O `NotFound` error when the
    /// file does not exist. `New` discards any existing file.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let db = match mode {
            OpenMode::Create => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                Database::create(&path).map_err(unavailable)?
            }
            OpenMode::New => {
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Database::create(&path).map_err(unavailable)?
            }
            OpenMode::ReadWrite | OpenMode::ReadOnly => {
                // Surface a plain NotFound rather than a backend-specific error.
                std::fs::metadata(&path)?;
                Database::open(&path).map_err(unavailable)?
            }
        };

        let store = Self { db, path, mode };
        if mode.is_writable() {
            store.ensure_table()?;
        }
        debug!(path = %store.path.display(), %mode, "opened hash file store");
        Ok(store)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the store was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Number of entries in the store.
    pub fn len(&self) -> StoreResult<u64> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        match txn.open_table(ENTRIES) {
            Ok(table) => table.len().map_err(unavailable),
            Err(TableError::TableDoesNotExist(_)) => Ok(0),
            Err(e) => Err(unavailable(e)),
        }
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn ensure_table(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(unavailable)?;
        {
            txn.open_table(ENTRIES).map_err(unavailable)?;
        }
        txn.commit().map_err(unavailable)
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(StoreError::ReadOnly)
        }
    }

    /// Run `ops` in one non-durable write transaction.
    fn write(&self, ops: &[WriteOp<'_>]) -> StoreResult<()> {
        self.check_writable()?;
        let mut txn = self.db.begin_write().map_err(unavailable)?;
        txn.set_durability(Durability::None);
        {
            let mut table = txn.open_table(ENTRIES).map_err(unavailable)?;
            for op in ops {
                match *op {
                    WriteOp::Set { key, value } => {
                        table.insert(key, value).map_err(unavailable)?;
                    }
                    WriteOp::Delete { key } => {
                        table.remove(key).map_err(unavailable)?;
                    }
                }
            }
        }
        txn.commit().map_err(unavailable)
    }
}

impl ReadableStore for HashFileStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let table = match txn.open_table(ENTRIES) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(unavailable(e)),
        };
        let value = table.get(key).map_err(unavailable)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    /// Entries are streamed from a single read transaction, which the
    /// iterator keeps alive, so the pass is a consistent snapshot even if the
    /// store is written meanwhile.
    fn iter(&self) -> StoreResult<Entries<'_>> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let table = match txn.open_table(ENTRIES) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Box::new(std::iter::empty())),
            Err(e) => return Err(unavailable(e)),
        };
        let range = table.range::<&[u8]>(..).map_err(unavailable)?;
        Ok(Box::new(range.map(|item| -> StoreResult<Entry> {
            let (k, v) = item.map_err(unavailable)?;
            Ok((k.value().to_vec(), v.value().to_vec()))
        })))
    }
}

impl MutableStore for HashFileStore {
    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.write(&[WriteOp::Set { key, value }])
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.write(&[WriteOp::Delete { key }])
    }

    /// Commit an empty transaction with immediate durability, which flushes
    /// every preceding non-durable commit to disk.
    fn sync(&mut self) -> StoreResult<()> {
        self.check_writable()?;
        let mut txn = self.db.begin_write().map_err(unavailable)?;
        txn.set_durability(Durability::Immediate);
        txn.commit().map_err(unavailable)?;
        debug!(path = %self.path.display(), "hash file store synced");
        Ok(())
    }

    fn apply_batch(&mut self, ops: &[WriteOp<'_>]) -> StoreResult<()> {
        self.write(ops)
    }
}

impl fmt::Debug for HashFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashFileStore")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(mode: OpenMode) -> (tempfile::TempDir, HashFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HashFileStore::open(dir.path().join("words.db"), mode).unwrap();
        (dir, store)
    }

    #[test]
    fn open_mode_flags() {
        assert_eq!(OpenMode::from_flag('c'), Some(OpenMode::Create));
        assert_eq!(OpenMode::from_flag('n'), Some(OpenMode::New));
        assert_eq!(OpenMode::from_flag('w'), Some(OpenMode::ReadWrite));
        assert_eq!(OpenMode::from_flag('r'), Some(OpenMode::ReadOnly));
        assert_eq!(OpenMode::from_flag('x'), None);
        assert!(!OpenMode::ReadOnly.is_writable());
    }

    #[test]
    fn set_get_delete() {
        let (_dir, mut store) = temp_store(OpenMode::Create);
        store.set(b"viagra", b"spam").unwrap();
        assert_eq!(store.get(b"viagra").unwrap(), Some(b"spam".to_vec()));
        store.delete(b"viagra").unwrap();
        assert!(store.get(b"viagra").unwrap().is_none());
        store.delete(b"never-there").unwrap();
    }

    #[test]
    fn reopen_after_sync_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.db");
        {
            let mut store = HashFileStore::open(&path, OpenMode::Create).unwrap();
            store.set(b"a", b"1").unwrap();
            store.set(b"b", b"2").unwrap();
            store.sync().unwrap();
        }
        let store = HashFileStore::open(&path, OpenMode::ReadWrite).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn new_mode_discards_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.db");
        {
            let mut store = HashFileStore::open(&path, OpenMode::Create).unwrap();
            store.set(b"a", b"1").unwrap();
            store.sync().unwrap();
        }
        let store = HashFileStore::open(&path, OpenMode::New).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn read_write_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = HashFileStore::open(dir.path().join("absent.db"), OpenMode::ReadWrite)
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.db");
        {
            let mut store = HashFileStore::open(&path, OpenMode::Create).unwrap();
            store.set(b"a", b"1").unwrap();
            store.sync().unwrap();
        }
        let mut store = HashFileStore::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(matches!(store.set(b"b", b"2"), Err(StoreError::ReadOnly)));
        assert!(matches!(store.delete(b"a"), Err(StoreError::ReadOnly)));
        assert!(matches!(store.sync(), Err(StoreError::ReadOnly)));
    }

    #[test]
    fn apply_batch_single_transaction() {
        let (_dir, mut store) = temp_store(OpenMode::New);
        store
            .apply_batch(&[
                WriteOp::Set { key: b"x", value: b"1" },
                WriteOp::Set { key: b"y", value: b"2" },
                WriteOp::Delete { key: b"x" },
            ])
            .unwrap();
        store.sync().unwrap();
        assert_eq!(store.keys().unwrap(), vec![b"y".to_vec()]);
    }

    #[test]
    fn iter_yields_all_entries() {
        let (_dir, mut store) = temp_store(OpenMode::Create);
        for i in 0..20u8 {
            store.set(&[b'k', i], &[i]).unwrap();
        }
        let entries: Vec<_> = store.iter().unwrap().collect::<StoreResult<_>>().unwrap();
        assert_eq!(entries.len(), 20);
        assert!(entries.iter().all(|(k, v)| k[1] == v[0]));
    }

    #[test]
    fn iter_is_lazy_and_restartable() {
        let (_dir, mut store) = temp_store(OpenMode::Create);
        for k in [b"a", b"b", b"c"] {
            store.set(k, b"1").unwrap();
        }

        let mut partial = store.iter().unwrap();
        assert_eq!(partial.next().unwrap().unwrap().0, b"a".to_vec());
        drop(partial);

        let keys: Vec<_> = store.iter().unwrap().map(|e| e.unwrap().0).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn iter_empty_store() {
        let (_dir, store) = temp_store(OpenMode::Create);
        assert_eq!(store.iter().unwrap().count(), 0);
    }
}
