//! On-disk record encoding: `[tag byte][bincode payload]`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wordstore_store::{display_key, StoreError, StoreResult};

use crate::wrapped::Wrapped;

/// Discriminator stored as the first byte of every record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordTag {
    /// Generic serialized value.
    Plain,
    /// State of the designated [`Wrapped`] type.
    Wrapped,
}

impl RecordTag {
    pub const PLAIN_BYTE: u8 = b'P';
    pub const WRAPPED_BYTE: u8 = b'W';

    pub fn byte(self) -> u8 {
        match self {
            RecordTag::Plain => Self::PLAIN_BYTE,
            RecordTag::Wrapped => Self::WRAPPED_BYTE,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::PLAIN_BYTE => Some(RecordTag::Plain),
            Self::WRAPPED_BYTE => Some(RecordTag::Wrapped),
            _ => None,
        }
    }
}

/// A decoded record: either a plain value or an instance of the wrapped type.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue<P, W> {
    Plain(P),
    Wrapped(W),
}

impl<P, W> TypedValue<P, W> {
    pub fn tag(&self) -> RecordTag {
        match self {
            TypedValue::Plain(_) => RecordTag::Plain,
            TypedValue::Wrapped(_) => RecordTag::Wrapped,
        }
    }

    pub fn into_plain(self) -> Option<P> {
        match self {
            TypedValue::Plain(p) => Some(p),
            TypedValue::Wrapped(_) => None,
        }
    }

    pub fn into_wrapped(self) -> Option<W> {
        match self {
            TypedValue::Wrapped(w) => Some(w),
            TypedValue::Plain(_) => None,
        }
    }
}

/// Encode a value as a tagged record.
pub fn encode<P: Serialize, W: Wrapped>(value: &TypedValue<P, W>) -> StoreResult<Vec<u8>> {
    let mut out = vec![value.tag().byte()];
    let result = match value {
        TypedValue::Plain(p) => bincode::serialize_into(&mut out, p),
        TypedValue::Wrapped(w) => bincode::serialize_into(&mut out, &w.to_state()),
    };
    result.map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(out)
}

/// Decode the record stored under `key`.
///
/// An empty record or an unknown tag is [`StoreError::CorruptRecord`]; a
/// payload that fails to decode under a known tag is
/// [`StoreError::Deserialization`]. Both name `key`.
pub fn decode<P, W>(key: &[u8], bytes: &[u8]) -> StoreResult<TypedValue<P, W>>
where
    P: DeserializeOwned,
    W: Wrapped,
{
    let (&tag_byte, payload) = bytes.split_first().ok_or_else(|| StoreError::CorruptRecord {
        key: display_key(key),
        reason: "empty record has no tag byte".into(),
    })?;
    let tag = RecordTag::from_byte(tag_byte).ok_or_else(|| StoreError::CorruptRecord {
        key: display_key(key),
        reason: format!("unknown tag byte 0x{tag_byte:02x}"),
    })?;

    let undecodable = |e: bincode::Error| StoreError::Deserialization {
        key: display_key(key),
        reason: e.to_string(),
    };
    match tag {
        RecordTag::Plain => bincode::deserialize(payload)
            .map(TypedValue::Plain)
            .map_err(undecodable),
        RecordTag::Wrapped => bincode::deserialize::<W::State>(payload)
            .map(|state| TypedValue::Wrapped(W::from_state(state)))
            .map_err(undecodable),
    }
}
