//! Typed values over wordstore backends.
//!
//! A [`TypedDict`] stores each value as `[tag][payload]`: tag `P` for a
//! generic serde value, tag `W` for the one designated [`Wrapped`] type that
//! persists through its own state snapshot. Decoding never guesses; an
//! unknown tag is a `CorruptRecord` error.
//!
//! [`WordDict`] specializes the dictionary for classifier storage with
//! [`WordInfo`] records and a [`TrainingState`] under [`STATE_KEY`].

pub mod dict;
pub mod record;
pub mod wordinfo;
pub mod wrapped;

pub use dict::TypedDict;
pub use record::{decode, encode, RecordTag, TypedValue};
pub use wordinfo::{TrainingState, WordDict, WordInfo, STATE_KEY, STATE_VERSION};
pub use wrapped::Wrapped;
