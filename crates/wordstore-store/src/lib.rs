//! Backing store contracts for wordstore.
//!
//! A classifier keeps per-token statistics in a disk-resident associative
//! store. This crate defines the capability interfaces every layer speaks
//! and the error taxonomy shared by the whole workspace.
//!
//! # Capabilities
//!
//! - [`ReadableStore`] -- get and full iteration (compiled indexes and
//!   mutable stores alike)
//! - [`MutableStore`] -- adds set, delete, batch writes and a durability
//!   barrier (`sync`)
//!
//! # Backends
//!
//! - [`InMemoryStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`HashFileStore`] -- embedded on-disk hash file opened with an
//!   [`OpenMode`] (create/new/read-write/read-only)
//!
//! # Design Rules
//!
//! 1. Keys and values are opaque byte strings.
//! 2. Absent keys are `Ok(None)`, never an error, on `get`.
//! 3. Deleting an absent key is a no-op.
//! 4. Writes need not be durable until `sync` returns.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod hashfile;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{display_key, StoreError, StoreResult};
pub use hashfile::{HashFileStore, OpenMode};
pub use memory::InMemoryStore;
pub use traits::{Entries, Entry, MutableStore, ReadableStore, WriteOp};
