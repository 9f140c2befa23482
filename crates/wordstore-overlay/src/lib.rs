//! Write-back overlay for wordstore backends.
//!
//! An [`OverlayStore`] buffers `set`/`delete` calls in memory and presents the
//! merged view of those pending changes and its backing layer. Nothing
//! reaches the backing layer until [`OverlayStore::flush`] or
//! [`OverlayStore::close`]:
//!
//! - over a mutable store ([`MutableLayer`]) the changes are applied in
//!   insertion order and followed by a `sync`;
//! - over a compiled index ([`CompiledLayer`]) the whole index is rebuilt
//!   from the merged view and atomically swapped in.
//!
//! A failed flush keeps every pending change, so it can be retried.

pub mod config;
pub mod layer;
pub mod merge;
pub mod pending;
pub mod store;

pub use config::OverlayConfig;
pub use layer::{CompiledLayer, Layer, MutableLayer, DUMP_SUFFIX};
pub use merge::merged;
pub use pending::{Pending, Slot};
pub use store::OverlayStore;
