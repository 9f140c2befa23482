//! Compiled constant-database index for wordstore.
//!
//! A constant database is written once and then only read: lookups cost one
//! header read plus a short linear probe in a hash table, with no locking or
//! parsing step. Changes go through an overlay that rebuilds the whole image
//! on flush.
//!
//! # Architecture
//!
//! - **Format** ([`format`]): 256-table header, length-prefixed records, open-addressed hash tables
//! - **CdbWriter**: appends records in order and emits the finished image
//! - **CdbReader**: validated random access plus an in-order scan; implements `ReadableStore`
//! - **Dump** ([`dump`]): `+klen,vlen:key->value` text export

pub mod dump;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

pub use dump::{dump_to_vec, write_dump};
pub use error::{CdbError, CdbResult};
pub use format::{hash, HEADER_SIZE};
pub use reader::{CdbReader, Iter};
pub use writer::{build, CdbWriter};
