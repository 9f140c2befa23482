//! Crash-safe whole-file persistence for wordstore.
//!
//! Serialized state (compiled indexes, pickled classifier totals) may be read
//! and written by several cooperating processes. [`AtomicPersister`] makes
//! every replacement of such a file atomic from an observer's point of view:
//! `path` always holds either the old complete snapshot or the new one.
//!
//! # Modules
//!
//! - [`persister`] -- temp-file + rename save, locked load, bincode helpers
//! - [`lock`] -- [`InterprocessLock`], an RAII guard over `<path>.lock`
//! - [`config`] -- [`PersistConfig`] and [`ReplaceStrategy`]
//! - [`error`] -- [`PersistError`], convertible into `StoreError`
//!
//! Locking is mandatory: if the lock file cannot be used the operation fails
//! with `LockUnavailable` instead of running unguarded.

pub mod config;
pub mod error;
pub mod lock;
pub mod persister;

pub use config::{PersistConfig, ReplaceStrategy};
pub use error::{PersistError, Result};
pub use lock::{sibling, InterprocessLock, LOCK_SUFFIX};
pub use persister::{AtomicPersister, BAK_SUFFIX, TMP_SUFFIX};
