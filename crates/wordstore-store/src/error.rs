use std::path::PathBuf;
use std::time::Duration;

/// Errors from store operations.
///
/// This is the taxonomy shared by every layer of wordstore; lower-level
/// crates convert their own errors into it at the crate boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is absent after merging every layer.
    #[error("key not found: {0}")]
    NotFound(String),

    /// A mutation (or read) was attempted after the store was closed.
    #[error("store is closed")]
    Closed,

    /// The backing layer failed to service a read or write.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A record carries an unknown tag or is structurally malformed.
    #[error("corrupt record {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// A record has a recognized tag but its payload failed to decode.
    #[error("cannot deserialize record {key}: {reason}")]
    Deserialization { key: String, reason: String },

    /// The interprocess lock was not obtained before the timeout expired.
    #[error("timed out after {waited:?} waiting for lock on {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// The locking primitive cannot be used for this path.
    #[error("lock unavailable for {}: {reason}", path.display())]
    LockUnavailable { path: PathBuf, reason: String },

    /// Value encoding failed before anything was written.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store was opened read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Render a byte key for error messages and logs.
pub fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}
