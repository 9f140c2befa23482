use std::io;
use std::path::PathBuf;
use std::time::Duration;

use wordstore_store::StoreError;

/// Errors produced by the persister and its lock.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// I/O error while reading, writing, or renaming snapshot files.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The lock was held by someone else for the whole timeout.
    #[error("timed out after {waited:?} waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// The lock file could not be created or locked at all.
    #[error("cannot use lock file {}: {source}", path.display())]
    LockUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A value could not be encoded before saving.
    #[error("serialization error for {}: {reason}", path.display())]
    Serialization { path: PathBuf, reason: String },

    /// A loaded snapshot could not be decoded.
    #[error("cannot deserialize {}: {reason}", path.display())]
    Deserialization { path: PathBuf, reason: String },
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this is an I/O `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl From<PersistError> for StoreError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Io { path, source } => StoreError::StorageUnavailable(format!(
                "{}: {source}",
                path.display()
            )),
            PersistError::LockTimeout { path, waited } => StoreError::LockTimeout { path, waited },
            PersistError::LockUnavailable { path, source } => StoreError::LockUnavailable {
                path,
                reason: source.to_string(),
            },
            PersistError::Serialization { path, reason } => {
                StoreError::Serialization(format!("{}: {reason}", path.display()))
            }
            PersistError::Deserialization { path, reason } => StoreError::Deserialization {
                key: path.display().to_string(),
                reason,
            },
        }
    }
}

/// Convenience alias used throughout the persist crate.
pub type Result<T> = std::result::Result<T, PersistError>;
