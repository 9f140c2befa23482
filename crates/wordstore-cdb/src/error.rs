use thiserror::Error;
use wordstore_store::StoreError;

#[derive(Debug, Error)]
pub enum CdbError {
    #[error("corrupt index at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("index would be {size} bytes, beyond the 4 GiB format limit")]
    TooLarge { size: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CdbError {
    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            offset: offset as u64,
            reason: reason.into(),
        }
    }
}

impl From<CdbError> for StoreError {
    fn from(err: CdbError) -> Self {
        match err {
            CdbError::Corrupt { offset, reason } => StoreError::CorruptRecord {
                key: format!("@{offset}"),
                reason,
            },
            CdbError::TooLarge { size } => StoreError::StorageUnavailable(format!(
                "index would be {size} bytes, beyond the 4 GiB format limit"
            )),
            CdbError::Io(e) => StoreError::Io(e),
        }
    }
}

pub type CdbResult<T> = Result<T, CdbError>;
